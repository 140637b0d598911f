//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! ## Architecture
//!
//! - Traits define the storage surface the sync engine depends on
//! - SQLite implementations use sqlx for async database access
//! - `bulk_put` runs in one transaction; either every record lands or none
//! - Writes are upserts keyed by remote ids and carry no ordering
//!   precondition; freshness gating happens before a write is requested
//!
//! ## Available Repositories
//!
//! - `MediaRepository` - catalog entries, keyed by media id
//! - `ConsumptionRepository` - list entries, always scoped to one login
//! - `LoginRepository` - logins known to this device

pub mod consumption;
pub mod login;
pub mod media;

pub use consumption::{ConsumptionIndex, ConsumptionRepository, SqliteConsumptionRepository};
pub use login::{LoginRepository, SqliteLoginRepository};
pub use media::{MediaIndex, MediaRepository, SqliteMediaRepository};

/// Largest number of bound ids in one `IN (...)` clause
pub(crate) const MAX_BIND_IDS: usize = 500;

/// Result ordering for index queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}
