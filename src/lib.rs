pub mod auction;
pub mod bidding;
pub mod database;
pub mod error;
pub mod escrow;
pub mod handlers;
pub mod message_broker;
pub mod notifier;
pub mod query;
pub mod reputation;
pub mod scheduler;
pub mod settings;
