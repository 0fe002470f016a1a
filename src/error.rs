/// 도메인 오류 정의
/// 모든 검증은 트랜잭션 안에서, 쓰기 전에 수행되며 위반 시 트랜잭션 전체가 롤백된다.
/// UI가 구체적인 메시지를 렌더링할 수 있도록 위반 종류별로 안정적인 코드를 내려준다.
// region:    --- Imports
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

// endregion: --- Imports

// region:    --- Domain Error
#[derive(Debug, Error)]
pub enum DomainError {
    /// 형식이 잘못된 입력
    #[error("{0}")]
    Validation(String),

    /// 종료되었거나 입찰을 받을 수 없는 경매
    #[error("경매가 이미 종료되었습니다.")]
    AuctionClosed,

    #[error("입찰 금액이 최소 입찰가보다 낮습니다. (현재가: {current_price}, 최소 입찰가: {min_bid})")]
    BidTooLow { current_price: i64, min_bid: i64 },

    #[error("판매자는 자신의 경매에 입찰할 수 없습니다.")]
    SelfBid,

    #[error("차단된 입찰자는 이 경매에 입찰할 수 없습니다.")]
    Banned,

    #[error("평판 기준을 충족하지 못해 입찰할 수 없습니다.")]
    IneligibleReputation,

    #[error("즉시 구매가 불가능한 경매입니다.")]
    BuyNowUnavailable,

    #[error("해당 작업을 수행할 권한이 없습니다.")]
    WrongRole,

    #[error("현재 거래 상태({status})에서는 허용되지 않는 작업입니다.")]
    WrongState { status: String },

    #[error("{0} 정보를 찾을 수 없습니다.")]
    NotFound(&'static str),

    #[error("이미 등록된 평가입니다.")]
    DuplicateRating,

    #[error("이미 취소된 거래입니다.")]
    AlreadyCancelled,

    #[error("설정 정보를 불러오지 못했습니다: {0}")]
    Settings(String),

    #[error("데이터베이스 오류: {0}")]
    Database(#[from] sqlx::Error),
}

impl DomainError {
    /// UI 분기용 오류 코드
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "VALIDATION",
            DomainError::AuctionClosed => "AUCTION_CLOSED",
            DomainError::BidTooLow { .. } => "BID_TOO_LOW",
            DomainError::SelfBid => "SELF_BID",
            DomainError::Banned => "BANNED",
            DomainError::IneligibleReputation => "INELIGIBLE_REPUTATION",
            DomainError::BuyNowUnavailable => "BUY_NOW_UNAVAILABLE",
            DomainError::WrongRole => "WRONG_ROLE",
            DomainError::WrongState { .. } => "WRONG_STATE",
            DomainError::NotFound(_) => "NOT_FOUND",
            DomainError::DuplicateRating => "DUPLICATE_RATING",
            DomainError::AlreadyCancelled => "ALREADY_CANCELLED",
            DomainError::Settings(_) => "SETTINGS_UNAVAILABLE",
            DomainError::Database(_) => "INTERNAL",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::DuplicateRating | DomainError::AlreadyCancelled => StatusCode::CONFLICT,
            DomainError::Settings(_) | DomainError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// 핸들러 응답 변환: (상태 코드, {"error": 메시지, "code": 코드})
impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(serde_json::json!({
                "error": self.to_string(),
                "code": self.code(),
            })),
        )
            .into_response()
    }
}
// endregion: --- Domain Error
