/// 거래(에스크로) 상태 모델과 전이 규칙
/// 전이는 pending → paid → shipped → completed 한 방향이며,
/// completed 이전 어느 단계에서든 cancelled로 끊을 수 있다.
/// 검증 순서는 역할 → 상태 → 입력 필드 순서로 고정한다.
// region:    --- Imports
use crate::error::DomainError;
use crate::reputation::RatingDirection;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

// endregion: --- Imports

// region:    --- Escrow Status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowStatus {
    Pending,
    Paid,
    Shipped,
    Completed,
    Cancelled,
}

impl EscrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowStatus::Pending => "pending",
            EscrowStatus::Paid => "paid",
            EscrowStatus::Shipped => "shipped",
            EscrowStatus::Completed => "completed",
            EscrowStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(EscrowStatus::Pending),
            "paid" => Some(EscrowStatus::Paid),
            "shipped" => Some(EscrowStatus::Shipped),
            "completed" => Some(EscrowStatus::Completed),
            "cancelled" => Some(EscrowStatus::Cancelled),
            _ => None,
        }
    }
}
// endregion: --- Escrow Status

// region:    --- Transaction Row
/// 거래 행. 낙찰된 경매와 1:1로 만들어진다.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub auction_id: i64,
    pub winner_id: i64,
    pub seller_id: i64,
    pub final_price: i64,
    pub status: String,
    pub shipping_address: Option<String>,
    pub payment_proof: Option<String>,
    pub shipping_receipt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 거래 당사자 역할. 프로필 필드를 들여다보는 대신 행위자 id를
/// 거래 행과 대조해 역할을 명시적으로 판정한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Winner,
    Seller,
}

impl Transaction {
    /// 행위자의 역할 판정. 거래 당사자가 아니면 권한 없음.
    pub fn party_of(&self, actor_id: i64) -> Result<Party, DomainError> {
        if actor_id == self.winner_id {
            Ok(Party::Winner)
        } else if actor_id == self.seller_id {
            Ok(Party::Seller)
        } else {
            Err(DomainError::WrongRole)
        }
    }

    fn current_status(&self) -> Result<EscrowStatus, DomainError> {
        EscrowStatus::parse(&self.status).ok_or_else(|| DomainError::WrongState {
            status: self.status.clone(),
        })
    }

    fn wrong_state(&self) -> DomainError {
        DomainError::WrongState {
            status: self.status.clone(),
        }
    }
}
// endregion: --- Transaction Row

// region:    --- Transition Validators
/// 결제 확인: 낙찰자가 pending 상태에서 배송지와 결제 증빙을 제출한다.
pub fn validate_payment(
    transaction: &Transaction,
    actor_id: i64,
    shipping_address: &str,
    payment_proof: &str,
) -> Result<(), DomainError> {
    if transaction.party_of(actor_id)? != Party::Winner {
        return Err(DomainError::WrongRole);
    }
    if transaction.current_status()? != EscrowStatus::Pending {
        return Err(transaction.wrong_state());
    }
    if shipping_address.trim().is_empty() {
        return Err(DomainError::Validation("배송지를 입력해 주세요.".to_string()));
    }
    if payment_proof.trim().is_empty() {
        return Err(DomainError::Validation(
            "결제 증빙을 입력해 주세요.".to_string(),
        ));
    }
    Ok(())
}

/// 발송 확인: 판매자가 paid 상태에서 운송장 번호를 제출한다.
pub fn validate_shipment(
    transaction: &Transaction,
    actor_id: i64,
    shipping_receipt: &str,
) -> Result<(), DomainError> {
    if transaction.party_of(actor_id)? != Party::Seller {
        return Err(DomainError::WrongRole);
    }
    if transaction.current_status()? != EscrowStatus::Paid {
        return Err(transaction.wrong_state());
    }
    if shipping_receipt.trim().is_empty() {
        return Err(DomainError::Validation(
            "운송장 번호를 입력해 주세요.".to_string(),
        ));
    }
    Ok(())
}

/// 수령 확인: 낙찰자가 shipped 상태에서 거래를 완료한다.
pub fn validate_received(transaction: &Transaction, actor_id: i64) -> Result<(), DomainError> {
    if transaction.party_of(actor_id)? != Party::Winner {
        return Err(DomainError::WrongRole);
    }
    if transaction.current_status()? != EscrowStatus::Shipped {
        return Err(transaction.wrong_state());
    }
    Ok(())
}

/// 거래 취소: 판매자가 completed 이전 어느 단계에서든 거래를 끊는다.
/// 취소 시 낙찰자 명의의 부정 평가가 판매자에게 기록된다.
pub fn validate_cancel(transaction: &Transaction, actor_id: i64) -> Result<(), DomainError> {
    if transaction.party_of(actor_id)? != Party::Seller {
        return Err(DomainError::WrongRole);
    }
    match transaction.current_status()? {
        EscrowStatus::Cancelled => Err(DomainError::AlreadyCancelled),
        EscrowStatus::Completed => Err(transaction.wrong_state()),
        EscrowStatus::Pending | EscrowStatus::Paid | EscrowStatus::Shipped => Ok(()),
    }
}

/// 평가 계획: 누가 누구를 평가하는지와 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingPlan {
    pub direction: RatingDirection,
    pub target_user_id: i64,
}

/// 상호 평가: completed 거래에서 당사자만, 점수는 +1/−1만 허용한다.
pub fn validate_rating(
    transaction: &Transaction,
    actor_id: i64,
    score: i32,
) -> Result<RatingPlan, DomainError> {
    let plan = match transaction.party_of(actor_id)? {
        Party::Winner => RatingPlan {
            direction: RatingDirection::BidderToSeller,
            target_user_id: transaction.seller_id,
        },
        Party::Seller => RatingPlan {
            direction: RatingDirection::SellerToBidder,
            target_user_id: transaction.winner_id,
        },
    };

    if transaction.current_status()? != EscrowStatus::Completed {
        return Err(transaction.wrong_state());
    }
    if score != 1 && score != -1 {
        return Err(DomainError::Validation(
            "평가 점수는 +1 또는 -1만 가능합니다.".to_string(),
        ));
    }
    Ok(plan)
}
// endregion: --- Transition Validators
