/// 거래(에스크로) 커맨드 처리
/// 1. 결제 확인
/// 2. 발송 확인
/// 3. 수령 확인
/// 4. 거래 취소
/// 5. 상호 평가
/// 모든 전이는 거래 행을 잠근 단일 트랜잭션으로 수행한다. 중간 상태를
/// 덧대지 않고 잠근 행에서 검증한 뒤 한 번에 갱신한다.
// region:    --- Imports
use crate::database::DatabaseManager;
use crate::error::DomainError;
use crate::escrow::model::{self, Transaction};
use crate::notifier::{notify_best_effort, NotificationMessage, Notifier, TemplateKey};
use crate::reputation::{self, NewRating, RatingDirection};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

// endregion: --- Imports

// region:    --- Commands
/// 결제 확인 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConfirmPaymentCommand {
    pub winner_id: i64,
    pub shipping_address: String,
    pub payment_proof: String,
}

/// 발송 확인 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConfirmShipmentCommand {
    pub seller_id: i64,
    pub shipping_receipt: String,
}

/// 수령 확인 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConfirmReceivedCommand {
    pub winner_id: i64,
}

/// 거래 취소 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CancelTransactionCommand {
    pub seller_id: i64,
}

/// 상호 평가 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RateTransactionCommand {
    pub rater_id: i64,
    pub score: i32,
    pub comment: Option<String>,
}
// endregion: --- Commands

// region:    --- Row Helpers
/// 거래 행을 잠그고 읽는다. 같은 거래에 대한 동시 전이는 여기서 직렬화된다.
async fn lock_transaction(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    transaction_id: i64,
) -> Result<Transaction, DomainError> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1 FOR UPDATE")
        .bind(transaction_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(DomainError::NotFound("거래"))
}

/// 낙찰 직후 거래 행 생성. 경매 행을 잠근 호출자(정산 스케줄러, 즉시 구매)만 부른다.
pub async fn open_transaction(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    auction_id: i64,
    winner_id: i64,
    seller_id: i64,
    final_price: i64,
) -> Result<Transaction, DomainError> {
    let row = sqlx::query_as::<_, Transaction>(
        "INSERT INTO transactions (auction_id, winner_id, seller_id, final_price)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(auction_id)
    .bind(winner_id)
    .bind(seller_id)
    .bind(final_price)
    .fetch_one(&mut **tx)
    .await?;

    info!(
        "{:<12} --> 거래 생성: transaction_id={}, auction_id={}, final_price={}",
        "Escrow", row.id, auction_id, final_price
    );
    Ok(row)
}
// endregion: --- Row Helpers

// region:    --- Command Handlers
/// 1. 결제 확인 (pending → paid)
pub async fn handle_confirm_payment(
    transaction_id: i64,
    cmd: ConfirmPaymentCommand,
    db_manager: &DatabaseManager,
    notifier: &dyn Notifier,
) -> Result<Transaction, DomainError> {
    info!(
        "{:<12} --> 결제 확인 처리 시작: transaction_id={}, winner_id={}",
        "Command", transaction_id, cmd.winner_id
    );

    let winner_id = cmd.winner_id;
    let shipping_address = cmd.shipping_address;
    let payment_proof = cmd.payment_proof;

    let updated = db_manager
        .transaction(move |tx| {
            Box::pin(async move {
                let current = lock_transaction(tx, transaction_id).await?;
                model::validate_payment(&current, winner_id, &shipping_address, &payment_proof)?;

                let row = sqlx::query_as::<_, Transaction>(
                    "UPDATE transactions
                     SET status = 'paid', shipping_address = $2, payment_proof = $3,
                         updated_at = NOW()
                     WHERE id = $1
                     RETURNING *",
                )
                .bind(transaction_id)
                .bind(&shipping_address)
                .bind(&payment_proof)
                .fetch_one(&mut **tx)
                .await?;
                Ok::<_, DomainError>(row)
            })
        })
        .await?;

    notify_best_effort(
        notifier,
        NotificationMessage {
            to_user_id: updated.seller_id,
            template: TemplateKey::ProductUpdate,
            subject: "결제가 확인되었습니다".to_string(),
            payload: json!({
                "transaction_id": updated.id,
                "auction_id": updated.auction_id,
                "status": updated.status,
            }),
        },
    )
    .await;

    Ok(updated)
}

/// 2. 발송 확인 (paid → shipped)
pub async fn handle_confirm_shipment(
    transaction_id: i64,
    cmd: ConfirmShipmentCommand,
    db_manager: &DatabaseManager,
    notifier: &dyn Notifier,
) -> Result<Transaction, DomainError> {
    info!(
        "{:<12} --> 발송 확인 처리 시작: transaction_id={}, seller_id={}",
        "Command", transaction_id, cmd.seller_id
    );

    let seller_id = cmd.seller_id;
    let shipping_receipt = cmd.shipping_receipt;

    let updated = db_manager
        .transaction(move |tx| {
            Box::pin(async move {
                let current = lock_transaction(tx, transaction_id).await?;
                model::validate_shipment(&current, seller_id, &shipping_receipt)?;

                let row = sqlx::query_as::<_, Transaction>(
                    "UPDATE transactions
                     SET status = 'shipped', shipping_receipt = $2, updated_at = NOW()
                     WHERE id = $1
                     RETURNING *",
                )
                .bind(transaction_id)
                .bind(&shipping_receipt)
                .fetch_one(&mut **tx)
                .await?;
                Ok::<_, DomainError>(row)
            })
        })
        .await?;

    notify_best_effort(
        notifier,
        NotificationMessage {
            to_user_id: updated.winner_id,
            template: TemplateKey::ProductUpdate,
            subject: "상품이 발송되었습니다".to_string(),
            payload: json!({
                "transaction_id": updated.id,
                "auction_id": updated.auction_id,
                "status": updated.status,
                "shipping_receipt": updated.shipping_receipt,
            }),
        },
    )
    .await;

    Ok(updated)
}

/// 3. 수령 확인 (shipped → completed)
pub async fn handle_confirm_received(
    transaction_id: i64,
    cmd: ConfirmReceivedCommand,
    db_manager: &DatabaseManager,
    notifier: &dyn Notifier,
) -> Result<Transaction, DomainError> {
    info!(
        "{:<12} --> 수령 확인 처리 시작: transaction_id={}, winner_id={}",
        "Command", transaction_id, cmd.winner_id
    );

    let winner_id = cmd.winner_id;

    let updated = db_manager
        .transaction(move |tx| {
            Box::pin(async move {
                let current = lock_transaction(tx, transaction_id).await?;
                model::validate_received(&current, winner_id)?;

                let row = sqlx::query_as::<_, Transaction>(
                    "UPDATE transactions
                     SET status = 'completed', updated_at = NOW()
                     WHERE id = $1
                     RETURNING *",
                )
                .bind(transaction_id)
                .fetch_one(&mut **tx)
                .await?;
                Ok::<_, DomainError>(row)
            })
        })
        .await?;

    notify_best_effort(
        notifier,
        NotificationMessage {
            to_user_id: updated.seller_id,
            template: TemplateKey::ProductUpdate,
            subject: "거래가 완료되었습니다".to_string(),
            payload: json!({
                "transaction_id": updated.id,
                "auction_id": updated.auction_id,
                "status": updated.status,
            }),
        },
    )
    .await;

    Ok(updated)
}

/// 4. 거래 취소 (pending/paid/shipped → cancelled)
/// 판매자가 취소하면 낙찰자 명의의 부정 평가가 같은 트랜잭션으로 기록된다.
pub async fn handle_cancel_transaction(
    transaction_id: i64,
    cmd: CancelTransactionCommand,
    db_manager: &DatabaseManager,
    notifier: &dyn Notifier,
) -> Result<Transaction, DomainError> {
    info!(
        "{:<12} --> 거래 취소 처리 시작: transaction_id={}, seller_id={}",
        "Command", transaction_id, cmd.seller_id
    );

    let seller_id = cmd.seller_id;

    let updated = db_manager
        .transaction(move |tx| {
            Box::pin(async move {
                let current = lock_transaction(tx, transaction_id).await?;
                model::validate_cancel(&current, seller_id)?;

                let row = sqlx::query_as::<_, Transaction>(
                    "UPDATE transactions
                     SET status = 'cancelled', updated_at = NOW()
                     WHERE id = $1
                     RETURNING *",
                )
                .bind(transaction_id)
                .fetch_one(&mut **tx)
                .await?;

                reputation::record_rating(
                    tx,
                    &NewRating {
                        product_id: row.auction_id,
                        direction: RatingDirection::BidderToSeller,
                        from_user_id: row.winner_id,
                        target_user_id: row.seller_id,
                        score: -1,
                        comment: "판매자가 판매를 이행하지 않았습니다.",
                    },
                )
                .await?;

                Ok::<_, DomainError>(row)
            })
        })
        .await?;

    info!(
        "{:<12} --> 거래 취소 완료: transaction_id={}, 판매자 부정 평가 기록",
        "Command", updated.id
    );

    notify_best_effort(
        notifier,
        NotificationMessage {
            to_user_id: updated.winner_id,
            template: TemplateKey::ProductUpdate,
            subject: "거래가 취소되었습니다".to_string(),
            payload: json!({
                "transaction_id": updated.id,
                "auction_id": updated.auction_id,
                "status": updated.status,
            }),
        },
    )
    .await;

    Ok(updated)
}

/// 5. 상호 평가 (completed 거래의 당사자 간, 방향별 1회)
pub async fn handle_rate_transaction(
    transaction_id: i64,
    cmd: RateTransactionCommand,
    db_manager: &DatabaseManager,
) -> Result<(), DomainError> {
    info!(
        "{:<12} --> 평가 등록 처리 시작: transaction_id={}, rater_id={}, score={}",
        "Command", transaction_id, cmd.rater_id, cmd.score
    );

    let rater_id = cmd.rater_id;
    let score = cmd.score;
    let comment = cmd.comment.unwrap_or_default();

    db_manager
        .transaction(move |tx| {
            Box::pin(async move {
                let current = lock_transaction(tx, transaction_id).await?;
                let plan = model::validate_rating(&current, rater_id, score)?;

                reputation::record_rating(
                    tx,
                    &NewRating {
                        product_id: current.auction_id,
                        direction: plan.direction,
                        from_user_id: rater_id,
                        target_user_id: plan.target_user_id,
                        score,
                        comment: &comment,
                    },
                )
                .await?;

                Ok::<_, DomainError>(())
            })
        })
        .await
}
// endregion: --- Command Handlers
