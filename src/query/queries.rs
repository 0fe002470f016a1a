/// 경매 단건 조회
pub const GET_AUCTION: &str = "SELECT id, seller_id, title, start_price, step_price, buy_now_price, current_price, end_date, status, is_auto_extend, is_instant_purchase, winner_id, created_at FROM auctions WHERE id = $1";

/// 전체 경매 목록 조회
pub const GET_ALL_AUCTIONS: &str =
    "SELECT id, seller_id, title, start_price, step_price, buy_now_price, current_price, end_date, status, is_auto_extend, is_instant_purchase, winner_id, created_at FROM auctions ORDER BY created_at DESC";

/// 입찰 이력 조회 (차단된 입찰자의 입찰도 기록으로는 남아 함께 보인다)
pub const GET_BID_HISTORY: &str = r#"
    SELECT id, auction_id, bidder_id, max_bid, created_at
    FROM bids
    WHERE auction_id = $1
    ORDER BY created_at DESC
"#;

/// 거래 단건 조회
pub const GET_TRANSACTION: &str = "SELECT id, auction_id, winner_id, seller_id, final_price, status, shipping_address, payment_proof, shipping_receipt, created_at, updated_at FROM transactions WHERE id = $1";

/// 평판 집계 조회
pub const GET_REPUTATION: &str =
    "SELECT rating_count, rating_positive FROM profiles WHERE user_id = $1";
