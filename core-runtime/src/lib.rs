//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the sync engine:
//! - Logging and tracing infrastructure
//! - Engine configuration
//! - Event bus system
//!
//! ## Overview
//!
//! Every other engine crate depends on this one for its configuration values,
//! logging conventions, and the broadcast channel that carries sync progress
//! and API quota notifications to observers.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use events::{ApiEvent, CoreEvent, EventBus, SyncEvent};
