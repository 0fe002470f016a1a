/// 평판 원장
/// 평가는 추가 전용이고, 프로필 집계는 수락된 평가당 정확히 한 번 증가한다.
/// 모든 쓰기는 호출자가 연 트랜잭션 안에서 수행된다.
// region:    --- Imports
use crate::error::DomainError;
use serde::Serialize;

// endregion: --- Imports

// region:    --- Snapshot
/// 프로필 집계 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReputationSnapshot {
    pub count: i64,
    pub positive: i64,
}

impl ReputationSnapshot {
    /// 긍정 평가 비율. 평가가 하나도 없으면 게이트를 통과시킨다(신규 사용자 허용).
    pub fn meets_gate(&self, min_positive_ratio: f64) -> bool {
        if self.count == 0 {
            return true;
        }
        (self.positive as f64) / (self.count as f64) >= min_positive_ratio
    }
}
// endregion: --- Snapshot

// region:    --- Rating Direction
/// 평가 방향: 구매자→판매자 또는 판매자→구매자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingDirection {
    BidderToSeller,
    SellerToBidder,
}

impl RatingDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingDirection::BidderToSeller => "bidder_seller",
            RatingDirection::SellerToBidder => "seller_bidder",
        }
    }
}
// endregion: --- Rating Direction

// region:    --- Ledger Operations
/// 신규 평가 입력
#[derive(Debug)]
pub struct NewRating<'a> {
    pub product_id: i64,
    pub direction: RatingDirection,
    pub from_user_id: i64,
    pub target_user_id: i64,
    pub score: i32,
    pub comment: &'a str,
}

/// 프로필 집계 조회. 행이 없으면 평가 0건으로 본다.
pub async fn fetch_snapshot(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: i64,
) -> Result<ReputationSnapshot, DomainError> {
    let row = sqlx::query_as::<_, (i64, i64)>(
        "SELECT rating_count, rating_positive FROM profiles WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(match row {
        Some((count, positive)) => ReputationSnapshot { count, positive },
        None => ReputationSnapshot::default(),
    })
}

/// 평가 기록: 평가 행 추가와 대상 프로필 집계 갱신을 같은 트랜잭션에서 처리한다.
/// 같은 (상품, 방향, 작성자, 대상) 조합은 한 번만 허용한다.
pub async fn record_rating(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    rating: &NewRating<'_>,
) -> Result<(), DomainError> {
    let duplicates = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM ratings
         WHERE product_id = $1 AND rating_type = $2 AND from_user_id = $3 AND target_user_id = $4",
    )
    .bind(rating.product_id)
    .bind(rating.direction.as_str())
    .bind(rating.from_user_id)
    .bind(rating.target_user_id)
    .fetch_one(&mut **tx)
    .await?;

    if duplicates > 0 {
        return Err(DomainError::DuplicateRating);
    }

    sqlx::query(
        "INSERT INTO ratings (product_id, rating_type, from_user_id, target_user_id, score, comment)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(rating.product_id)
    .bind(rating.direction.as_str())
    .bind(rating.from_user_id)
    .bind(rating.target_user_id)
    .bind(rating.score)
    .bind(rating.comment)
    .execute(&mut **tx)
    .await?;

    let positive_delta: i64 = if rating.score > 0 { 1 } else { 0 };
    sqlx::query(
        "INSERT INTO profiles (user_id, rating_count, rating_positive)
         VALUES ($1, 1, $2)
         ON CONFLICT (user_id) DO UPDATE
         SET rating_count = profiles.rating_count + 1,
             rating_positive = profiles.rating_positive + $2",
    )
    .bind(rating.target_user_id)
    .bind(positive_delta)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
// endregion: --- Ledger Operations
