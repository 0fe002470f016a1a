// region:    --- Imports
use crate::database::DatabaseManager;
use crate::handlers::AppState;
use crate::notifier::{KafkaNotifier, Notifier};
use crate::settings::{GatePolicy, HttpSettingsSource, SettingsCache};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use message_broker::KafkaManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Modules
mod auction;
mod bidding;
mod database;
mod error;
mod escrow;
mod handlers;
mod message_broker;
mod notifier;
mod query;
mod reputation;
mod scheduler;
mod settings;

// endregion: --- Modules

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // DatabaseManager 생성
    let db_manager = Arc::new(DatabaseManager::new().await);

    // 데이터베이스 초기화
    if let Err(e) = db_manager.initialize_database().await {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    // Kafka 매니저 생성 및 초기화
    let kafka_manager = Arc::new(KafkaManager::new());
    if let Err(e) = kafka_manager.initialize().await {
        error!("{:<12} --> Kafka 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> Kafka 초기화 성공", "Main");

    // 알림 토픽 생성 (외부 메일러 서비스가 구독)
    kafka_manager
        .create_topic(notifier::NOTIFICATIONS_TOPIC, 5, 1)
        .await?;

    let notifier: Arc<dyn Notifier> = Arc::new(KafkaNotifier::new(kafka_manager.get_producer()));

    // 관리자 설정 캐시 + 평판 게이트 정책
    let settings = Arc::new(SettingsCache::from_env(Box::new(
        HttpSettingsSource::from_env(),
    )));
    let gate = GatePolicy::from_env();

    // 마감 경매 정산 스케줄러
    let sweeper =
        scheduler::AuctionSweeper::new(Arc::clone(&db_manager), Arc::clone(&notifier));
    sweeper.start().await;

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        db_manager,
        notifier,
        settings,
        gate,
    };

    // 라우터 설정
    let routes_all = Router::new()
        .route("/bid", post(handlers::handle_bid))
        .route("/buy-now", post(handlers::handle_buy_now))
        .route("/auctions", get(handlers::handle_get_auctions))
        .route("/auctions/:id", get(handlers::handle_get_auction))
        .route("/auctions/:id/bids", get(handlers::handle_get_auction_bids))
        .route("/auctions/:id/ban", post(handlers::handle_ban_bidder))
        .route(
            "/transactions/:id",
            get(handlers::handle_get_transaction),
        )
        .route(
            "/transactions/:id/payment",
            post(handlers::handle_confirm_payment),
        )
        .route(
            "/transactions/:id/shipment",
            post(handlers::handle_confirm_shipment),
        )
        .route(
            "/transactions/:id/received",
            post(handlers::handle_confirm_received),
        )
        .route(
            "/transactions/:id/cancel",
            post(handlers::handle_cancel_transaction),
        )
        .route(
            "/transactions/:id/rating",
            post(handlers::handle_rate_transaction),
        )
        .route(
            "/profiles/:id/reputation",
            get(handlers::handle_get_reputation),
        )
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 20)) // 동시성을 위한 바디 사이즈 10배 증가(20MB)
        .with_state(state);

    // 리스너 생성
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&bind_addr).await.unwrap();
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr().unwrap()
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
