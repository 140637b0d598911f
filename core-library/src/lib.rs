//! # Local Store Module
//!
//! Owns the local replica of the remote media catalog and each login's
//! consumption list.
//!
//! ## Overview
//!
//! This crate manages:
//! - SQLite schema and embedded migrations
//! - Repository traits for media, consumption entries and logins, each with
//!   a sqlx-backed implementation
//! - Domain models shared by the sync engine (`MediaRecord`,
//!   `ConsumptionRecord`, `PartialDate`, status and format enums)
//!
//! Writes are upserts keyed by stable remote ids. Nothing here deletes
//! records; entries that disappear remotely stay in the local store.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{
    ConsumptionRecord, EntryId, Login, LoginId, MediaId, MediaListStatus, MediaRecord,
    MediaTitle, PartialDate, TitleLanguageOrder,
};
pub use repositories::SortOrder;
