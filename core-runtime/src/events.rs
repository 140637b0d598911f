//! # Event Bus System
//!
//! Typed events broadcast with `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`SyncEvent`] for full-sync lifecycle and progress,
//!   [`ApiEvent`] for quota and throttling notices from the request executor
//! - **EventBus**: central broadcast channel
//!
//! Emitting with no subscribers is not an error for producers; they ignore
//! the `SendError`.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{ApiEvent, CoreEvent, EventBus};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Api(ApiEvent::RateLimited { retry_after_seconds: 60 }))
//!     .ok();
//!
//! assert!(subscriber.try_recv().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall further behind receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Full-sync lifecycle events
    Sync(SyncEvent),
    /// Remote API quota and throttling events
    Api(ApiEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Api(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Api(ApiEvent::RateLimited { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Cancelled { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::Started { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events emitted while a login's list and media catalog are synchronized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Sync job initiated.
    Started {
        /// Unique identifier for this sync job.
        job_id: String,
        /// The login being synced.
        login_id: i64,
    },
    /// Progress update, emitted after the list is persisted and after each
    /// media chunk.
    Progress {
        job_id: String,
        login_id: i64,
        /// Media ids persisted so far.
        media_done: u64,
        /// Distinct media ids referenced by the list.
        media_total: u64,
        /// Weighted overall progress in `0.0..=1.0`.
        fraction: f64,
        /// Current state name (e.g., "persisting_media").
        phase: String,
    },
    /// Sync finished successfully.
    Completed {
        job_id: String,
        login_id: i64,
        /// Consumption entries written.
        entries_synced: u64,
        /// Media records written.
        media_synced: u64,
        /// Wall-clock duration in milliseconds.
        duration_ms: u64,
    },
    /// Sync encountered an error and stopped.
    Failed {
        job_id: String,
        login_id: i64,
        /// Human-readable error message.
        message: String,
        /// Whether waiting and retrying can succeed (rate limiting).
        recoverable: bool,
    },
    /// Sync was cancelled between chunks.
    Cancelled {
        job_id: String,
        login_id: i64,
        /// Media ids committed before cancellation.
        media_done: u64,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::Progress { .. } => "Sync in progress",
            SyncEvent::Completed { .. } => "Sync completed successfully",
            SyncEvent::Failed { .. } => "Sync failed",
            SyncEvent::Cancelled { .. } => "Sync cancelled",
        }
    }
}

// ============================================================================
// API Events
// ============================================================================

/// Events from the request executor about the remote quota.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ApiEvent {
    /// Quota headers were read from a response.
    QuotaUpdated { limit: u64, remaining: u64 },
    /// The remote answered 429.
    RateLimited { retry_after_seconds: u64 },
}

impl ApiEvent {
    fn description(&self) -> &str {
        match self {
            ApiEvent::QuotaUpdated { .. } => "API quota updated",
            ApiEvent::RateLimited { .. } => "API rate limit hit",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for broadcasting events to multiple subscribers.
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
