use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 경매 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionStatus {
    Active,
    Sold,
    Expired,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Active => "active",
            AuctionStatus::Sold => "sold",
            AuctionStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<AuctionStatus> {
        match s {
            "active" => Some(AuctionStatus::Active),
            "sold" => Some(AuctionStatus::Sold),
            "expired" => Some(AuctionStatus::Expired),
            _ => None,
        }
    }
}

// 경매 모델
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Auction {
    pub id: i64,
    pub seller_id: i64,
    pub title: String,
    pub start_price: i64,
    pub step_price: i64,
    pub buy_now_price: Option<i64>,
    pub current_price: i64,
    pub end_date: DateTime<Utc>,
    pub status: String,
    pub is_auto_extend: bool,
    pub is_instant_purchase: bool,
    pub winner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Auction {
    /// 입찰 가능 여부: 상태와 종료 시각을 모두 확인한다.
    pub fn is_open_for_bids(&self, now: DateTime<Utc>) -> bool {
        self.status == AuctionStatus::Active.as_str() && now < self.end_date
    }
}

// 입찰 모델 (추가 전용, 수정/삭제 없음)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub max_bid: i64,
    pub created_at: DateTime<Utc>,
}

// 입찰자 차단 모델
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct BidBan {
    pub auction_id: i64,
    pub bidder_id: i64,
    pub created_at: DateTime<Utc>,
}
