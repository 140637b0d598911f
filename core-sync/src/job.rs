//! # Sync State Machine
//!
//! Tracks one sync run through its phases with validated transitions.
//!
//! ## State Machine
//!
//! ```text
//! Idle → FetchingList → ValidatingList → PersistingConsumption → ChunkingMedia
//!                                                                     ↓
//!                       Complete ← PersistingMedia ⇄ FetchingMediaChunk
//!
//! any non-terminal state → Failed | Cancelled
//! ```
//!
//! `ChunkingMedia` may go straight to `Complete` when the list references no
//! media.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncProgress, SyncState};
//!
//! let mut progress = SyncProgress::new();
//! progress.transition(SyncState::FetchingList)?;
//! progress.transition(SyncState::ValidatingList)?;
//! assert_eq!(progress.fraction(), 0.0);
//! ```

use crate::{Result, SyncError};
use chrono::{DateTime, Utc};
use core_library::models::LoginId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for one sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncJobId(Uuid);

impl SyncJobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SyncJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SyncJobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// States
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    FetchingList,
    ValidatingList,
    PersistingConsumption,
    ChunkingMedia,
    FetchingMediaChunk,
    PersistingMedia,
    Complete,
    Failed,
    Cancelled,
}

impl SyncState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncState::Complete | SyncState::Failed | SyncState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::FetchingList => "fetching_list",
            SyncState::ValidatingList => "validating_list",
            SyncState::PersistingConsumption => "persisting_consumption",
            SyncState::ChunkingMedia => "chunking_media",
            SyncState::FetchingMediaChunk => "fetching_media_chunk",
            SyncState::PersistingMedia => "persisting_media",
            SyncState::Complete => "complete",
            SyncState::Failed => "failed",
            SyncState::Cancelled => "cancelled",
        }
    }

    fn can_transition_to(self, to: SyncState) -> bool {
        use SyncState::*;

        match (self, to) {
            (from, Failed | Cancelled) => !from.is_terminal(),
            (Idle, FetchingList)
            | (FetchingList, ValidatingList)
            | (ValidatingList, PersistingConsumption)
            | (PersistingConsumption, ChunkingMedia)
            | (ChunkingMedia, FetchingMediaChunk)
            | (ChunkingMedia, Complete)
            | (FetchingMediaChunk, PersistingMedia)
            | (PersistingMedia, FetchingMediaChunk)
            | (PersistingMedia, Complete) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Share of the overall fraction carried by media chunks
const MEDIA_WEIGHT: f64 = 0.8;
/// Share carried by the list itself
const LIST_WEIGHT: f64 = 0.2;

/// Snapshot of a running sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub state: SyncState,
    pub media_total: u64,
    pub media_done: u64,
    /// Consumption records have been persisted
    pub list_done: bool,
}

impl SyncProgress {
    pub fn new() -> Self {
        Self {
            state: SyncState::Idle,
            media_total: 0,
            media_done: 0,
            list_done: false,
        }
    }

    /// Weighted completion in `0.0..=1.0`
    ///
    /// Media chunks count for 80%, the list for 20%. A list that references
    /// no media has nothing left to wait for once it is persisted.
    pub fn fraction(&self) -> f64 {
        let media_part = if self.media_total == 0 {
            if self.list_done {
                1.0
            } else {
                0.0
            }
        } else {
            (self.media_done as f64 / self.media_total as f64).min(1.0)
        };
        let list_part = if self.list_done { 1.0 } else { 0.0 };

        media_part * MEDIA_WEIGHT + list_part * LIST_WEIGHT
    }

    /// Move to `to`
    ///
    /// # Errors
    ///
    /// `SyncError::InvalidStateTransition` if the machine does not allow it.
    pub fn transition(&mut self, to: SyncState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(SyncError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
                reason: format!("Cannot transition from {} to {}", self.state, to),
            });
        }
        self.state = to;
        Ok(())
    }

    pub fn mark_list_done(&mut self) {
        self.list_done = true;
    }

    pub fn set_media_total(&mut self, total: u64) {
        self.media_total = total;
    }

    pub fn advance_media(&mut self, count: u64) {
        self.media_done = (self.media_done + count).min(self.media_total);
    }
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Outcome of a completed sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub job_id: SyncJobId,
    pub login_id: LoginId,
    pub entries_synced: u64,
    /// Entries dropped because their media reference was null
    pub entries_skipped: u64,
    pub media_synced: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncSummary {
    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}
