// region:    --- Imports
use crate::bidding::commands::{
    self as bid_commands, BanBidderCommand, BuyNowCommand, PlaceBidCommand,
};
use crate::database::DatabaseManager;
use crate::escrow::commands::{
    self as escrow_commands, CancelTransactionCommand, ConfirmPaymentCommand,
    ConfirmReceivedCommand, ConfirmShipmentCommand, RateTransactionCommand,
};
use crate::notifier::Notifier;
use crate::query;
use crate::settings::{GatePolicy, SettingsCache};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- App State
/// 핸들러 공유 상태
#[derive(Clone)]
pub struct AppState {
    pub db_manager: Arc<DatabaseManager>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: Arc<SettingsCache>,
    pub gate: GatePolicy,
}
// endregion: --- App State

// region:    --- Command Handlers

/// 입찰 요청 처리
pub async fn handle_bid(
    State(state): State<AppState>,
    Json(cmd): Json<PlaceBidCommand>,
) -> impl IntoResponse {
    match bid_commands::handle_place_bid(
        cmd,
        &state.db_manager,
        state.notifier.as_ref(),
        &state.settings,
        state.gate,
    )
    .await
    {
        Ok(auction) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "입찰이 성공적으로 처리되었습니다.",
                "auction": auction,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// 즉시 구매 요청 처리
pub async fn handle_buy_now(
    State(state): State<AppState>,
    Json(cmd): Json<BuyNowCommand>,
) -> impl IntoResponse {
    match bid_commands::handle_buy_now(cmd, &state.db_manager, state.notifier.as_ref(), state.gate)
        .await
    {
        Ok(transaction) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "즉시 구매가 완료되었습니다.",
                "transaction": transaction,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// 입찰자 차단 요청 처리
pub async fn handle_ban_bidder(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(cmd): Json<BanBidderCommand>,
) -> impl IntoResponse {
    match bid_commands::handle_ban_bidder(
        auction_id,
        cmd,
        &state.db_manager,
        state.notifier.as_ref(),
    )
    .await
    {
        Ok(auction) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "입찰자가 차단되었습니다.",
                "auction": auction,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// 결제 확인 요청 처리
pub async fn handle_confirm_payment(
    State(state): State<AppState>,
    Path(transaction_id): Path<i64>,
    Json(cmd): Json<ConfirmPaymentCommand>,
) -> impl IntoResponse {
    match escrow_commands::handle_confirm_payment(
        transaction_id,
        cmd,
        &state.db_manager,
        state.notifier.as_ref(),
    )
    .await
    {
        Ok(transaction) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "결제가 확인되었습니다.",
                "transaction": transaction,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// 발송 확인 요청 처리
pub async fn handle_confirm_shipment(
    State(state): State<AppState>,
    Path(transaction_id): Path<i64>,
    Json(cmd): Json<ConfirmShipmentCommand>,
) -> impl IntoResponse {
    match escrow_commands::handle_confirm_shipment(
        transaction_id,
        cmd,
        &state.db_manager,
        state.notifier.as_ref(),
    )
    .await
    {
        Ok(transaction) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "발송이 등록되었습니다.",
                "transaction": transaction,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// 수령 확인 요청 처리
pub async fn handle_confirm_received(
    State(state): State<AppState>,
    Path(transaction_id): Path<i64>,
    Json(cmd): Json<ConfirmReceivedCommand>,
) -> impl IntoResponse {
    match escrow_commands::handle_confirm_received(
        transaction_id,
        cmd,
        &state.db_manager,
        state.notifier.as_ref(),
    )
    .await
    {
        Ok(transaction) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "거래가 완료되었습니다.",
                "transaction": transaction,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// 거래 취소 요청 처리
pub async fn handle_cancel_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<i64>,
    Json(cmd): Json<CancelTransactionCommand>,
) -> impl IntoResponse {
    match escrow_commands::handle_cancel_transaction(
        transaction_id,
        cmd,
        &state.db_manager,
        state.notifier.as_ref(),
    )
    .await
    {
        Ok(transaction) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "거래가 취소되었습니다.",
                "transaction": transaction,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// 평가 등록 요청 처리
pub async fn handle_rate_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<i64>,
    Json(cmd): Json<RateTransactionCommand>,
) -> impl IntoResponse {
    match escrow_commands::handle_rate_transaction(transaction_id, cmd, &state.db_manager).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "평가가 등록되었습니다.",
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 모든 경매 조회
pub async fn handle_get_auctions(State(state): State<AppState>) -> impl IntoResponse {
    info!("{:<12} --> 모든 경매 조회", "HandlerQuery");
    match query::handlers::get_all_auctions(&state.db_manager).await {
        Ok(auctions) => Json(auctions).into_response(),
        Err(e) => e.into_response(),
    }
}

/// 경매 조회
pub async fn handle_get_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 조회 id: {}", "HandlerQuery", auction_id);
    match query::handlers::get_auction(&state.db_manager, auction_id).await {
        Ok(auction) => Json(auction).into_response(),
        Err(e) => e.into_response(),
    }
}

/// 경매 입찰 이력 조회
pub async fn handle_get_auction_bids(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 경매 입찰 이력 조회 id: {}",
        "HandlerQuery", auction_id
    );
    match query::handlers::get_bid_history(&state.db_manager, auction_id).await {
        Ok(bids) => Json(bids).into_response(),
        Err(e) => e.into_response(),
    }
}

/// 거래 조회
pub async fn handle_get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<i64>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 거래 조회 id: {}",
        "HandlerQuery", transaction_id
    );
    match query::handlers::get_transaction(&state.db_manager, transaction_id).await {
        Ok(transaction) => Json(transaction).into_response(),
        Err(e) => e.into_response(),
    }
}

/// 평판 조회
pub async fn handle_get_reputation(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 평판 조회 user_id: {}", "HandlerQuery", user_id);
    match query::handlers::get_reputation(&state.db_manager, user_id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => e.into_response(),
    }
}

// endregion: --- Query Handlers
