/// 입찰 관련 커맨드 처리
/// 1. 입찰
/// 2. 즉시 구매
/// 3. 입찰자 차단
/// 세 커맨드 모두 경매 행을 잠근 단일 트랜잭션으로 수행되고, 현재가와
/// 선두는 항상 차단 제외 전체 입찰 집합에서 다시 계산해 저장한다.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionStatus};
use crate::bidding::engine::{self, BidEntry};
use crate::database::DatabaseManager;
use crate::error::DomainError;
use crate::escrow::commands::open_transaction;
use crate::escrow::model::Transaction;
use crate::notifier::{notify_best_effort, NotificationMessage, Notifier, TemplateKey};
use crate::reputation;
use crate::settings::{AdminSettings, GatePolicy, SettingsCache};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

// endregion: --- Imports

// region:    --- Commands
/// 입찰 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub auction_id: i64,
    pub bidder_id: i64,
    pub max_bid: i64,
}

/// 즉시 구매 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BuyNowCommand {
    pub auction_id: i64,
    pub buyer_id: i64,
}

/// 입찰자 차단 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BanBidderCommand {
    pub seller_id: i64,
    pub bidder_id: i64,
}
// endregion: --- Commands

// region:    --- Admission Rules
/// 입찰 수락 전제 조건 검사. 잠근 경매 행 기준으로 평가한다.
fn admission_check(
    auction: &Auction,
    bidder_id: i64,
    max_bid: i64,
    banned: bool,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if !auction.is_open_for_bids(now) {
        return Err(DomainError::AuctionClosed);
    }
    let min_bid = auction.current_price.saturating_add(auction.step_price);
    if max_bid < min_bid {
        return Err(DomainError::BidTooLow {
            current_price: auction.current_price,
            min_bid,
        });
    }
    if bidder_id == auction.seller_id {
        return Err(DomainError::SelfBid);
    }
    if banned {
        return Err(DomainError::Banned);
    }
    Ok(())
}

/// 입찰 한도가 즉시 구매가에 닿았는지 판정. 닿았으면 낙찰 가격(즉시 구매가)을 돌려준다.
fn buy_now_trigger(auction: &Auction, max_bid: i64) -> Option<i64> {
    match auction.buy_now_price {
        Some(price) if auction.is_instant_purchase && max_bid >= price => Some(price),
        _ => None,
    }
}

/// 마감 임박 입찰에 대한 자동 연장 계산.
/// 연장은 누적이 아니라 지금 기준 재설정이며, 마감을 과거로 되돌리지 않는다.
fn extended_end_date(
    auction: &Auction,
    settings: AdminSettings,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if !auction.is_auto_extend {
        return None;
    }
    if auction.end_date - now > chrono::Duration::minutes(settings.extend_threshold_minutes) {
        return None;
    }
    let proposed = now + chrono::Duration::minutes(settings.auto_extend_minutes);
    Some(proposed.max(auction.end_date))
}
// endregion: --- Admission Rules

// region:    --- Row Helpers
/// 경매 행을 잠그고 읽는다. 같은 경매의 입찰/차단/정산은 여기서 직렬화된다.
async fn lock_auction(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    auction_id: i64,
) -> Result<Auction, DomainError> {
    sqlx::query_as::<_, Auction>("SELECT * FROM auctions WHERE id = $1 FOR UPDATE")
        .bind(auction_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(DomainError::NotFound("경매"))
}

async fn is_banned(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    auction_id: i64,
    bidder_id: i64,
) -> Result<bool, DomainError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM bid_bans WHERE auction_id = $1 AND bidder_id = $2",
    )
    .bind(auction_id)
    .bind(bidder_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count > 0)
}

/// 평판 게이트 검사. 정책 범위 밖의 경매는 검사 없이 통과한다.
async fn check_reputation_gate(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    gate: GatePolicy,
    auction: &Auction,
    bidder_id: i64,
) -> Result<(), DomainError> {
    if !gate.applies_to(auction.is_instant_purchase) {
        return Ok(());
    }
    let snapshot = reputation::fetch_snapshot(tx, bidder_id).await?;
    if !snapshot.meets_gate(gate.min_positive_ratio) {
        return Err(DomainError::IneligibleReputation);
    }
    Ok(())
}

/// 경매 상태 재계산: 차단 제외 전체 입찰 집합에서 현재가와 선두를 다시 구해 저장한다.
/// 이전 값을 증분으로 고치지 않는다.
async fn recompute_auction_state(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    auction_id: i64,
    start_price: i64,
    step_price: i64,
) -> Result<Auction, DomainError> {
    let rows = sqlx::query_as::<_, (i64, i64, DateTime<Utc>)>(
        "SELECT b.bidder_id, b.max_bid, b.created_at
         FROM bids b
         WHERE b.auction_id = $1
           AND NOT EXISTS (
               SELECT 1 FROM bid_bans x
               WHERE x.auction_id = b.auction_id AND x.bidder_id = b.bidder_id
           )
         ORDER BY b.created_at",
    )
    .bind(auction_id)
    .fetch_all(&mut **tx)
    .await?;

    let entries: Vec<BidEntry> = rows
        .into_iter()
        .map(|(bidder_id, max_bid, created_at)| BidEntry {
            bidder_id,
            max_bid,
            created_at,
        })
        .collect();

    let outcome = engine::resolve(&entries, start_price, step_price);

    let updated = sqlx::query_as::<_, Auction>(
        "UPDATE auctions SET current_price = $2, winner_id = $3 WHERE id = $1 RETURNING *",
    )
    .bind(auction_id)
    .bind(outcome.current_price)
    .bind(outcome.leader_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(updated)
}

/// 즉시 구매 낙찰: 경매를 sold로 바꾸고 거래를 연다.
async fn settle_instant_purchase(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    auction: &Auction,
    buyer_id: i64,
    price: i64,
) -> Result<(Auction, Transaction), DomainError> {
    let sold = sqlx::query_as::<_, Auction>(
        "UPDATE auctions SET status = 'sold', current_price = $2, winner_id = $3
         WHERE id = $1
         RETURNING *",
    )
    .bind(auction.id)
    .bind(price)
    .bind(buyer_id)
    .fetch_one(&mut **tx)
    .await?;

    let transaction = open_transaction(tx, auction.id, buyer_id, auction.seller_id, price).await?;
    Ok((sold, transaction))
}
// endregion: --- Row Helpers

// region:    --- Command Handlers
/// 1. 입찰
/// 입찰 저장 후 전체 재계산. 입찰가가 즉시 구매가에 닿으면 즉시 낙찰로 전환하고,
/// 그렇지 않으면 마감 임박 여부에 따라 마감을 연장한다.
pub async fn handle_place_bid(
    cmd: PlaceBidCommand,
    db_manager: &DatabaseManager,
    notifier: &dyn Notifier,
    settings_cache: &SettingsCache,
    gate: GatePolicy,
) -> Result<Auction, DomainError> {
    info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);

    // 설정 스냅샷은 트랜잭션 밖에서 확보한다. TTL 내 구버전 사용은 허용 범위.
    let settings = settings_cache.get().await.map_err(DomainError::Settings)?;

    let PlaceBidCommand {
        auction_id,
        bidder_id,
        max_bid,
    } = cmd;

    let (updated, settled) = db_manager
        .transaction(move |tx| {
            Box::pin(async move {
                let auction = lock_auction(tx, auction_id).await?;
                let now = Utc::now();

                let banned = is_banned(tx, auction_id, bidder_id).await?;
                admission_check(&auction, bidder_id, max_bid, banned, now)?;
                check_reputation_gate(tx, gate, &auction, bidder_id).await?;

                sqlx::query(
                    "INSERT INTO bids (auction_id, bidder_id, max_bid, created_at)
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(auction_id)
                .bind(bidder_id)
                .bind(max_bid)
                .bind(now)
                .execute(&mut **tx)
                .await?;

                // 입찰가가 즉시 구매가에 닿으면 즉시 구매가로 낙찰 처리한다.
                if let Some(settlement_price) = buy_now_trigger(&auction, max_bid) {
                    let (sold, _) =
                        settle_instant_purchase(tx, &auction, bidder_id, settlement_price).await?;
                    return Ok::<_, DomainError>((sold, true));
                }

                let mut updated =
                    recompute_auction_state(tx, auction_id, auction.start_price, auction.step_price)
                        .await?;

                if let Some(new_end) = extended_end_date(&auction, settings, now) {
                    updated = sqlx::query_as::<_, Auction>(
                        "UPDATE auctions SET end_date = $2 WHERE id = $1 RETURNING *",
                    )
                    .bind(auction_id)
                    .bind(new_end)
                    .fetch_one(&mut **tx)
                    .await?;
                    info!(
                        "{:<12} --> 마감 자동 연장: auction_id={}, end_date={}",
                        "Command", auction_id, new_end
                    );
                }

                Ok::<_, DomainError>((updated, false))
            })
        })
        .await?;

    info!(
        "{:<12} --> 입찰 반영 완료: auction_id={}, current_price={}, winner_id={:?}",
        "Command", updated.id, updated.current_price, updated.winner_id
    );

    if settled {
        notify_settlement(notifier, &updated).await;
    }

    Ok(updated)
}

/// 2. 즉시 구매
/// 즉시 구매가 설정된 경매를 그 가격 그대로 낙찰 처리한다.
pub async fn handle_buy_now(
    cmd: BuyNowCommand,
    db_manager: &DatabaseManager,
    notifier: &dyn Notifier,
    gate: GatePolicy,
) -> Result<Transaction, DomainError> {
    info!("{:<12} --> 즉시 구매 요청 처리 시작: {:?}", "Command", cmd);

    let BuyNowCommand {
        auction_id,
        buyer_id,
    } = cmd;

    let (sold, transaction) = db_manager
        .transaction(move |tx| {
            Box::pin(async move {
                let auction = lock_auction(tx, auction_id).await?;
                let now = Utc::now();

                if !auction.is_open_for_bids(now) {
                    return Err(DomainError::AuctionClosed);
                }
                let buy_now_price = match auction.buy_now_price {
                    Some(price) if auction.is_instant_purchase => price,
                    _ => return Err(DomainError::BuyNowUnavailable),
                };
                if buyer_id == auction.seller_id {
                    return Err(DomainError::SelfBid);
                }
                if is_banned(tx, auction_id, buyer_id).await? {
                    return Err(DomainError::Banned);
                }
                check_reputation_gate(tx, gate, &auction, buyer_id).await?;

                // 구매 의사도 입찰 기록으로 남긴다.
                sqlx::query(
                    "INSERT INTO bids (auction_id, bidder_id, max_bid, created_at)
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(auction_id)
                .bind(buyer_id)
                .bind(buy_now_price)
                .bind(now)
                .execute(&mut **tx)
                .await?;

                let settled = settle_instant_purchase(tx, &auction, buyer_id, buy_now_price).await?;
                Ok::<_, DomainError>(settled)
            })
        })
        .await?;

    info!(
        "{:<12} --> 즉시 구매 낙찰 완료: auction_id={}, final_price={}",
        "Command", sold.id, sold.current_price
    );

    notify_settlement(notifier, &sold).await;

    Ok(transaction)
}

/// 3. 입찰자 차단
/// 차단 즉시 해당 입찰자의 모든 입찰이 계산에서 영구 제외되고 상태가 재계산된다.
/// 이미 차단된 입찰자를 다시 차단해도 같은 결과로 성공한다.
pub async fn handle_ban_bidder(
    auction_id: i64,
    cmd: BanBidderCommand,
    db_manager: &DatabaseManager,
    notifier: &dyn Notifier,
) -> Result<Auction, DomainError> {
    info!(
        "{:<12} --> 입찰자 차단 처리 시작: auction_id={}, {:?}",
        "Command", auction_id, cmd
    );

    let BanBidderCommand {
        seller_id,
        bidder_id,
    } = cmd;

    let updated = db_manager
        .transaction(move |tx| {
            Box::pin(async move {
                let auction = lock_auction(tx, auction_id).await?;

                if seller_id != auction.seller_id {
                    return Err(DomainError::WrongRole);
                }
                if auction.status != AuctionStatus::Active.as_str() {
                    return Err(DomainError::AuctionClosed);
                }

                sqlx::query(
                    "INSERT INTO bid_bans (auction_id, bidder_id)
                     VALUES ($1, $2)
                     ON CONFLICT (auction_id, bidder_id) DO NOTHING",
                )
                .bind(auction_id)
                .bind(bidder_id)
                .execute(&mut **tx)
                .await?;

                let updated =
                    recompute_auction_state(tx, auction_id, auction.start_price, auction.step_price)
                        .await?;
                Ok::<_, DomainError>(updated)
            })
        })
        .await?;

    info!(
        "{:<12} --> 입찰자 차단 반영: auction_id={}, current_price={}, winner_id={:?}",
        "Command", updated.id, updated.current_price, updated.winner_id
    );

    notify_best_effort(
        notifier,
        NotificationMessage {
            to_user_id: bidder_id,
            template: TemplateKey::BannedNotification,
            subject: "경매 입찰이 차단되었습니다".to_string(),
            payload: json!({"auction_id": auction_id}),
        },
    )
    .await;

    Ok(updated)
}

/// 낙찰 직후 당사자 알림 (낙찰자 + 판매자)
async fn notify_settlement(notifier: &dyn Notifier, sold: &Auction) {
    if let Some(winner_id) = sold.winner_id {
        notify_best_effort(
            notifier,
            NotificationMessage {
                to_user_id: winner_id,
                template: TemplateKey::AuctionWon,
                subject: "경매에 낙찰되었습니다".to_string(),
                payload: json!({
                    "auction_id": sold.id,
                    "title": sold.title,
                    "final_price": sold.current_price,
                }),
            },
        )
        .await;
    }
    notify_best_effort(
        notifier,
        NotificationMessage {
            to_user_id: sold.seller_id,
            template: TemplateKey::ProductSold,
            subject: "상품이 판매되었습니다".to_string(),
            payload: json!({
                "auction_id": sold.id,
                "title": sold.title,
                "final_price": sold.current_price,
            }),
        },
    )
    .await;
}
// endregion: --- Command Handlers

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SELLER: i64 = 1;
    const BIDDER: i64 = 2;

    fn auction_ending_in(minutes: i64) -> Auction {
        let now = Utc::now();
        Auction {
            id: 1,
            seller_id: SELLER,
            title: "민트급 필름 카메라".to_string(),
            start_price: 100,
            step_price: 10,
            buy_now_price: None,
            current_price: 100,
            end_date: now + Duration::minutes(minutes),
            status: "active".to_string(),
            is_auto_extend: false,
            is_instant_purchase: false,
            winner_id: None,
            created_at: now,
        }
    }

    fn settings(threshold: i64, extend: i64) -> AdminSettings {
        AdminSettings {
            extend_threshold_minutes: threshold,
            auto_extend_minutes: extend,
            highlight_minutes: 60,
        }
    }

    fn code_of(result: Result<(), DomainError>) -> &'static str {
        match result {
            Ok(()) => "OK",
            Err(e) => e.code(),
        }
    }

    #[test]
    fn admission_accepts_minimum_increment() {
        let auction = auction_ending_in(60);
        let now = Utc::now();
        // current 100 + step 10 = 최소 110
        assert_eq!(
            code_of(admission_check(&auction, BIDDER, 110, false, now)),
            "OK"
        );
        assert_eq!(
            code_of(admission_check(&auction, BIDDER, 109, false, now)),
            "BID_TOO_LOW"
        );
    }

    #[test]
    fn admission_rejects_closed_auction() {
        let now = Utc::now();

        let mut sold = auction_ending_in(60);
        sold.status = "sold".to_string();
        assert_eq!(
            code_of(admission_check(&sold, BIDDER, 500, false, now)),
            "AUCTION_CLOSED"
        );

        // 아직 active지만 마감 시각이 지난 경우도 닫힌 것으로 본다.
        let unswept = auction_ending_in(-1);
        assert_eq!(
            code_of(admission_check(&unswept, BIDDER, 500, false, now)),
            "AUCTION_CLOSED"
        );
    }

    #[test]
    fn admission_rejects_seller_and_banned() {
        let auction = auction_ending_in(60);
        let now = Utc::now();
        assert_eq!(
            code_of(admission_check(&auction, SELLER, 500, false, now)),
            "SELF_BID"
        );
        assert_eq!(
            code_of(admission_check(&auction, BIDDER, 500, true, now)),
            "BANNED"
        );
    }

    #[test]
    fn admission_failure_precedence_is_stable() {
        let now = Utc::now();

        // 닫힌 경매가 가장 먼저다.
        let mut closed = auction_ending_in(-1);
        closed.status = "expired".to_string();
        assert_eq!(
            code_of(admission_check(&closed, SELLER, 1, true, now)),
            "AUCTION_CLOSED"
        );

        // 열린 경매에서는 금액 미달이 본인/차단 검사보다 앞선다.
        let open = auction_ending_in(60);
        assert_eq!(
            code_of(admission_check(&open, SELLER, 1, true, now)),
            "BID_TOO_LOW"
        );
    }

    #[test]
    fn buy_now_triggers_at_or_above_threshold() {
        let mut auction = auction_ending_in(60);
        auction.is_instant_purchase = true;
        auction.buy_now_price = Some(500);

        assert_eq!(buy_now_trigger(&auction, 500), Some(500));
        // 한도가 더 높아도 낙찰 가격은 즉시 구매가 그대로다.
        assert_eq!(buy_now_trigger(&auction, 650), Some(500));
        assert_eq!(buy_now_trigger(&auction, 499), None);
    }

    #[test]
    fn buy_now_requires_instant_purchase_listing() {
        // 즉시 구매 경매가 아니면 가격이 있어도 전환하지 않는다.
        let mut priced_only = auction_ending_in(60);
        priced_only.buy_now_price = Some(500);
        assert_eq!(buy_now_trigger(&priced_only, 650), None);

        let standard = auction_ending_in(60);
        assert_eq!(buy_now_trigger(&standard, 650), None);
    }

    #[test]
    fn extension_resets_from_bid_time() {
        // 마감 T−3분에 입찰, 임계 5분, 연장 10분 → 새 마감은 입찰 시각+10분
        let mut auction = auction_ending_in(3);
        auction.is_auto_extend = true;
        let now = Utc::now();

        let new_end = extended_end_date(&auction, settings(5, 10), now).unwrap();
        assert_eq!(new_end, now + Duration::minutes(10));
        assert!(new_end > auction.end_date);
    }

    #[test]
    fn extension_skipped_when_not_imminent() {
        let mut auction = auction_ending_in(30);
        auction.is_auto_extend = true;
        let now = Utc::now();

        assert_eq!(extended_end_date(&auction, settings(5, 10), now), None);
    }

    #[test]
    fn extension_skipped_without_auto_extend() {
        let auction = auction_ending_in(3);
        let now = Utc::now();

        assert_eq!(extended_end_date(&auction, settings(5, 10), now), None);
    }

    #[test]
    fn extension_never_moves_end_date_backward() {
        // 연장 폭이 임계보다 짧은 설정에서도 마감은 뒤로 가지 않는다.
        let mut auction = auction_ending_in(9);
        auction.is_auto_extend = true;
        let now = Utc::now();

        let new_end = extended_end_date(&auction, settings(10, 2), now).unwrap();
        assert_eq!(new_end, auction.end_date);
    }
}
