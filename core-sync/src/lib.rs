//! # Sync Module
//!
//! Keeps the local replica of a login's anime list and the referenced media
//! in step with AniList.
//!
//! ## Overview
//!
//! A sync pulls the whole list in one request, refuses anything partial,
//! upserts the consumption entries and then refreshes the referenced media in
//! fixed-size chunks, reporting progress as it goes. Nothing is deleted
//! locally and nothing is retried; a failed run is simply started again.
//!
//! ## Components
//!
//! - **Sync State Machine** (`job`): validated phase transitions, weighted progress
//! - **List Flattening** (`flatten`): single-pass iterator over a fetched collection
//! - **Mapping** (`mapping`): wire types to storage records
//! - **Fetch Gating** (`freshness`): which media are worth refetching
//! - **Sync Orchestrator** (`orchestrator`): runs syncs and streams their progress

pub mod error;
pub mod flatten;
pub mod freshness;
pub mod job;
pub mod mapping;
pub mod orchestrator;

pub use error::{Result, SyncError};
pub use flatten::ListEntries;
pub use freshness::select_stale;
pub use job::{SyncJobId, SyncProgress, SyncState, SyncSummary};
pub use mapping::{consumption_record, media_record};
pub use orchestrator::{SyncOrchestrator, SyncStream};
