/// 자동 입찰(프록시 입찰) 계산 엔진
/// 한 경매의 입찰 집합만으로 선두와 현재가를 결정하는 순수 함수.
/// 같은 스냅샷에 대해 입력 순서와 무관하게 항상 같은 결과를 낸다.
// region:    --- Imports
use chrono::{DateTime, Utc};

// endregion: --- Imports

// region:    --- Types
/// 계산 입력: 차단되지 않은 입찰 한 건
#[derive(Debug, Clone)]
pub struct BidEntry {
    pub bidder_id: i64,
    pub max_bid: i64,
    pub created_at: DateTime<Utc>,
}

/// 계산 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidOutcome {
    pub leader_id: Option<i64>,
    pub leader_max_bid: Option<i64>,
    pub current_price: i64,
}

/// 입찰자별 유효 입찰: 가장 높은 상한가와, 그 상한가에 처음 도달한 시각
#[derive(Debug, Clone, Copy)]
struct EffectiveBid {
    bidder_id: i64,
    max_bid: i64,
    first_reached_at: DateTime<Utc>,
}
// endregion: --- Types

// region:    --- Engine
/// 선두/현재가 계산
/// 1. 입찰자별로 유효 입찰 하나로 접는다 (상한가가 같으면 먼저 낸 입찰 시각 기준).
/// 2. 유효 입찰자가 없으면 선두 없이 시작가.
/// 3. 한 명이면 그 입찰자가 시작가로 선두 (혼자인 자동 입찰은 자기 자신과 경쟁하지 않는다).
/// 4. 두 명 이상이면 (상한가 내림차순, 시각 오름차순) 정렬 후
///    현재가 = min(선두 상한가, 2위 상한가 + 입찰 단위).
///    상한가가 같으면 먼저 낸 입찰자가 선두가 되고 상한가 전액을 부담한다.
pub fn resolve(entries: &[BidEntry], start_price: i64, step_price: i64) -> BidOutcome {
    let mut effective: Vec<EffectiveBid> = Vec::new();
    for entry in entries {
        match effective.iter_mut().find(|e| e.bidder_id == entry.bidder_id) {
            Some(existing) => {
                if entry.max_bid > existing.max_bid {
                    existing.max_bid = entry.max_bid;
                    existing.first_reached_at = entry.created_at;
                } else if entry.max_bid == existing.max_bid
                    && entry.created_at < existing.first_reached_at
                {
                    existing.first_reached_at = entry.created_at;
                }
            }
            None => effective.push(EffectiveBid {
                bidder_id: entry.bidder_id,
                max_bid: entry.max_bid,
                first_reached_at: entry.created_at,
            }),
        }
    }

    match effective.len() {
        0 => BidOutcome {
            leader_id: None,
            leader_max_bid: None,
            current_price: start_price,
        },
        1 => BidOutcome {
            leader_id: Some(effective[0].bidder_id),
            leader_max_bid: Some(effective[0].max_bid),
            current_price: start_price,
        },
        _ => {
            // 잔여 동점은 입찰자 id로 갈라 전순서를 보장한다.
            effective.sort_by(|a, b| {
                b.max_bid
                    .cmp(&a.max_bid)
                    .then(a.first_reached_at.cmp(&b.first_reached_at))
                    .then(a.bidder_id.cmp(&b.bidder_id))
            });
            let leader = effective[0];
            let runner_up = effective[1];
            let current_price = leader
                .max_bid
                .min(runner_up.max_bid.saturating_add(step_price))
                .max(start_price);
            BidOutcome {
                leader_id: Some(leader.bidder_id),
                leader_max_bid: Some(leader.max_bid),
                current_price,
            }
        }
    }
}
// endregion: --- Engine
