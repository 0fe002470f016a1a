/// 경매 정산 스케줄러
/// 마감 시각이 지난 active 경매를 주기적으로 걷어 경매별 트랜잭션으로 정산한다.
/// 선두가 있으면 sold + 거래 생성, 없으면 expired. 한 경매의 실패나 알림 오류가
/// 다른 경매의 정산을 막지 않으며, 크래시 후 재실행해도 같은 결과다.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionStatus};
use crate::database::DatabaseManager;
use crate::error::DomainError;
use crate::escrow::commands::open_transaction;
use crate::escrow::model::Transaction;
use crate::notifier::{notify_best_effort, NotificationMessage, Notifier, TemplateKey};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

// endregion: --- Imports

// region:    --- Sweep Classification
/// 잠근 경매 행에 대한 정산 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepAction {
    Settle { winner_id: i64 },
    Expire,
    Skip,
}

/// 스캔과 잠금 사이에 상태가 바뀌었을 수 있으므로 잠근 행 기준으로 다시 분류한다.
/// 즉시 구매로 이미 낙찰되었거나 마감이 연장된 경매는 건너뛴다.
fn classify(auction: &Auction, now: DateTime<Utc>) -> SweepAction {
    if AuctionStatus::parse(&auction.status) != Some(AuctionStatus::Active)
        || now < auction.end_date
    {
        return SweepAction::Skip;
    }
    match auction.winner_id {
        Some(winner_id) => SweepAction::Settle { winner_id },
        None => SweepAction::Expire,
    }
}

/// 경매 한 건의 정산 결과
enum SweepOutcome {
    Sold {
        auction: Auction,
        transaction: Transaction,
    },
    Expired {
        auction: Auction,
    },
    Skipped,
}
// endregion: --- Sweep Classification

// region:    --- Auction Sweeper
/// 경매 정산 스케줄러
pub struct AuctionSweeper {
    db: Arc<DatabaseManager>,
    notifier: Arc<dyn Notifier>,
}

impl AuctionSweeper {
    pub fn new(db: Arc<DatabaseManager>, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// 정산 루프 시작
    pub async fn start(&self) {
        let db = Arc::clone(&self.db);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1)); // 1초마다 실행
            loop {
                interval.tick().await;
                if let Err(e) = Self::sweep_due_auctions(&db, notifier.as_ref()).await {
                    error!(
                        "{:<12} --> 마감 경매 스캔 중 오류 발생: {:?}",
                        "Scheduler", e
                    );
                }
            }
        });
    }

    /// 마감 경매 스캔 후 건별 정산
    async fn sweep_due_auctions(
        db: &DatabaseManager,
        notifier: &dyn Notifier,
    ) -> Result<(), DomainError> {
        let due = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM auctions WHERE status = 'active' AND end_date <= $1 ORDER BY id",
        )
        .bind(Utc::now())
        .fetch_all(&*db.get_pool())
        .await?;

        for auction_id in due {
            match Self::settle_one(db, auction_id).await {
                Ok(SweepOutcome::Sold {
                    auction,
                    transaction,
                }) => {
                    info!(
                        "{:<12} --> 경매 정산 완료(낙찰): auction_id={}, final_price={}",
                        "Scheduler", auction.id, auction.current_price
                    );
                    Self::notify_sold(notifier, &auction, &transaction).await;
                }
                Ok(SweepOutcome::Expired { auction }) => {
                    info!(
                        "{:<12} --> 경매 정산 완료(유찰): auction_id={}",
                        "Scheduler", auction.id
                    );
                    notify_best_effort(
                        notifier,
                        NotificationMessage {
                            to_user_id: auction.seller_id,
                            template: TemplateKey::AuctionExpired,
                            subject: "경매가 입찰 없이 종료되었습니다".to_string(),
                            payload: json!({
                                "auction_id": auction.id,
                                "title": auction.title,
                            }),
                        },
                    )
                    .await;
                }
                Ok(SweepOutcome::Skipped) => {}
                Err(e) => {
                    error!(
                        "{:<12} --> 경매 정산 실패: auction_id={}, {:?}",
                        "Scheduler", auction_id, e
                    );
                }
            }
        }

        Ok(())
    }

    /// 경매 한 건 정산. 자체 트랜잭션에서 행을 잠그고 마감 여부를 다시 확인한다.
    async fn settle_one(
        db: &DatabaseManager,
        auction_id: i64,
    ) -> Result<SweepOutcome, DomainError> {
        db.transaction(move |tx| {
            Box::pin(async move {
                let auction = sqlx::query_as::<_, Auction>(
                    "SELECT * FROM auctions WHERE id = $1 FOR UPDATE",
                )
                .bind(auction_id)
                .fetch_optional(&mut **tx)
                .await?;

                let auction = match auction {
                    Some(auction) => auction,
                    None => return Ok::<_, DomainError>(SweepOutcome::Skipped),
                };

                match classify(&auction, Utc::now()) {
                    SweepAction::Skip => Ok(SweepOutcome::Skipped),
                    SweepAction::Expire => {
                        let expired = sqlx::query_as::<_, Auction>(
                            "UPDATE auctions SET status = 'expired' WHERE id = $1 RETURNING *",
                        )
                        .bind(auction_id)
                        .fetch_one(&mut **tx)
                        .await?;
                        Ok(SweepOutcome::Expired { auction: expired })
                    }
                    SweepAction::Settle { winner_id } => {
                        let sold = sqlx::query_as::<_, Auction>(
                            "UPDATE auctions SET status = 'sold' WHERE id = $1 RETURNING *",
                        )
                        .bind(auction_id)
                        .fetch_one(&mut **tx)
                        .await?;

                        let transaction = open_transaction(
                            tx,
                            sold.id,
                            winner_id,
                            sold.seller_id,
                            sold.current_price,
                        )
                        .await?;

                        Ok(SweepOutcome::Sold {
                            auction: sold,
                            transaction,
                        })
                    }
                }
            })
        })
        .await
    }

    /// 낙찰 정산 알림 (낙찰자 + 판매자)
    async fn notify_sold(notifier: &dyn Notifier, auction: &Auction, transaction: &Transaction) {
        notify_best_effort(
            notifier,
            NotificationMessage {
                to_user_id: transaction.winner_id,
                template: TemplateKey::AuctionWon,
                subject: "경매에 낙찰되었습니다".to_string(),
                payload: json!({
                    "auction_id": auction.id,
                    "title": auction.title,
                    "final_price": auction.current_price,
                    "transaction_id": transaction.id,
                }),
            },
        )
        .await;

        notify_best_effort(
            notifier,
            NotificationMessage {
                to_user_id: auction.seller_id,
                template: TemplateKey::ProductSold,
                subject: "상품이 판매되었습니다".to_string(),
                payload: json!({
                    "auction_id": auction.id,
                    "title": auction.title,
                    "final_price": auction.current_price,
                    "transaction_id": transaction.id,
                }),
            },
        )
        .await;
    }
}
// endregion: --- Auction Sweeper
