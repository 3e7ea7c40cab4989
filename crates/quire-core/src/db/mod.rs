//! Database layer for Quire

mod connection;
mod migrations;
mod promotion;
mod queue_repository;
mod record_repository;

pub use connection::Database;
pub use promotion::{
    group_promotion, promote, record_promotion, GroupPromotion, PromotionOutcome, RecordPromotion,
};
pub use queue_repository::{SqliteSyncQueueRepository, SyncQueueEntry, SyncQueueRepository};
pub use record_repository::{RecordRepository, SqliteRecordRepository};
