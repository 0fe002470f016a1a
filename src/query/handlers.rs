// region:    --- Imports
use super::queries;
use crate::auction::model::{Auction, Bid};
use crate::database::DatabaseManager;
use crate::error::DomainError;
use crate::escrow::model::Transaction;
use crate::reputation::ReputationSnapshot;
use tracing::info;

// endregion: --- Imports

// region:    --- Query Handlers

/// 경매 조회
pub async fn get_auction(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Auction, DomainError> {
    info!("{:<12} --> 경매 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Auction>(queries::GET_AUCTION)
                    .bind(auction_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .ok_or(DomainError::NotFound("경매"))
            })
        })
        .await
}

/// 모든 경매 조회
pub async fn get_all_auctions(db_manager: &DatabaseManager) -> Result<Vec<Auction>, DomainError> {
    info!("{:<12} --> 모든 경매 조회", "Query");
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let auctions = sqlx::query_as::<_, Auction>(queries::GET_ALL_AUCTIONS)
                    .fetch_all(&mut **tx)
                    .await?;
                Ok::<_, DomainError>(auctions)
            })
        })
        .await
}

/// 입찰 이력 조회
pub async fn get_bid_history(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Vec<Bid>, DomainError> {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let bids = sqlx::query_as::<_, Bid>(queries::GET_BID_HISTORY)
                    .bind(auction_id)
                    .fetch_all(&mut **tx)
                    .await?;
                Ok::<_, DomainError>(bids)
            })
        })
        .await
}

/// 거래 조회
pub async fn get_transaction(
    db_manager: &DatabaseManager,
    transaction_id: i64,
) -> Result<Transaction, DomainError> {
    info!("{:<12} --> 거래 조회 id: {}", "Query", transaction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Transaction>(queries::GET_TRANSACTION)
                    .bind(transaction_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .ok_or(DomainError::NotFound("거래"))
            })
        })
        .await
}

/// 평판 조회 (프로필 행이 없으면 평가 0건으로 본다)
pub async fn get_reputation(
    db_manager: &DatabaseManager,
    user_id: i64,
) -> Result<ReputationSnapshot, DomainError> {
    info!("{:<12} --> 평판 조회 user_id: {}", "Query", user_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let row = sqlx::query_as::<_, (i64, i64)>(queries::GET_REPUTATION)
                    .bind(user_id)
                    .fetch_optional(&mut **tx)
                    .await?;
                Ok::<_, DomainError>(match row {
                    Some((count, positive)) => ReputationSnapshot { count, positive },
                    None => ReputationSnapshot::default(),
                })
            })
        })
        .await
}

// endregion: --- Query Handlers
