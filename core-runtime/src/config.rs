//! # Engine Configuration Module
//!
//! Provides configuration for the sync engine.
//!
//! ## Overview
//!
//! `EngineConfig` is built through `EngineConfigBuilder` and validated before
//! it is handed out, so every component downstream can trust its values. It
//! covers three concerns:
//!
//! - **Remote API**: endpoint, user agent, per-request timeout
//! - **Throttling**: requests-per-minute budget and in-flight cap shared by
//!   every caller of the GraphQL API
//! - **Batching**: coalescing window, maximum keys per bulk lookup, and the
//!   media chunk size used by full syncs
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::EngineConfig;
//!
//! let config = EngineConfig::builder()
//!     .database_path("/path/to/upnext.db")
//!     .requests_per_minute(30)
//!     .build()?;
//!
//! assert_eq!(config.min_request_spacing().as_millis(), 2000);
//! ```

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Public GraphQL endpoint
pub const DEFAULT_ENDPOINT: &str = "https://graphql.anilist.co";

/// Identifies this client to the remote service
pub const DEFAULT_USER_AGENT: &str = "UpNext/github.com/dantman/up-next";

pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 30;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 2;
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(10);
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;
pub const DEFAULT_MEDIA_CHUNK_SIZE: usize = 20;

/// Validated engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// GraphQL endpoint URL
    pub endpoint: String,

    /// `User-Agent` header sent with every request
    pub user_agent: String,

    /// Request budget per minute; spacing between request starts is
    /// derived from this
    pub requests_per_minute: u32,

    /// Maximum number of requests in flight at once
    pub max_concurrent_requests: usize,

    /// Per-request transport timeout
    pub request_timeout: Duration,

    /// How long a batch stays open for more keys before dispatch
    pub batch_window: Duration,

    /// Batch dispatches immediately once it holds this many keys
    pub max_batch_size: usize,

    /// Media ids per chunk during a full sync
    pub media_chunk_size: usize,

    /// Buffer size of the event bus
    pub event_buffer_size: usize,

    /// Local database file; `None` means in-memory
    pub database_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            request_timeout: Duration::from_secs(30),
            batch_window: DEFAULT_BATCH_WINDOW,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            media_chunk_size: DEFAULT_MEDIA_CHUNK_SIZE,
            event_buffer_size: crate::events::DEFAULT_EVENT_BUFFER_SIZE,
            database_path: None,
        }
    }
}

impl EngineConfig {
    /// Creates a new builder seeded with defaults.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Minimum time between the starts of two consecutive requests.
    ///
    /// 30 requests per minute gives 2000ms.
    pub fn min_request_spacing(&self) -> Duration {
        Duration::from_millis(60_000 / u64::from(self.requests_per_minute.max(1)))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::Config("Endpoint cannot be empty".to_string()));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(Error::Config(format!(
                "Endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }

        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("User agent cannot be empty".to_string()));
        }

        if !(1..=600).contains(&self.requests_per_minute) {
            return Err(Error::Config(format!(
                "requests_per_minute must be between 1 and 600, got {}",
                self.requests_per_minute
            )));
        }

        if !(1..=16).contains(&self.max_concurrent_requests) {
            return Err(Error::Config(format!(
                "max_concurrent_requests must be between 1 and 16, got {}",
                self.max_concurrent_requests
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "request_timeout must be greater than zero".to_string(),
            ));
        }

        if self.max_batch_size == 0 {
            return Err(Error::Config(
                "max_batch_size must be at least 1".to_string(),
            ));
        }

        if self.media_chunk_size == 0 {
            return Err(Error::Config(
                "media_chunk_size must be at least 1".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "event_buffer_size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`EngineConfig`]
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Sets the GraphQL endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Sets the `User-Agent` header value.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Sets the request budget per minute.
    pub fn requests_per_minute(mut self, rpm: u32) -> Self {
        self.config.requests_per_minute = rpm;
        self
    }

    /// Sets the in-flight request cap.
    pub fn max_concurrent_requests(mut self, max: usize) -> Self {
        self.config.max_concurrent_requests = max;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn batch_window(mut self, window: Duration) -> Self {
        self.config.batch_window = window;
        self
    }

    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.config.max_batch_size = size;
        self
    }

    pub fn media_chunk_size(mut self, size: usize) -> Self {
        self.config.media_chunk_size = size;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.config.event_buffer_size = size;
        self
    }

    /// Sets the local database file path.
    ///
    /// When not set, the engine uses an in-memory database.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.database_path = Some(path.into());
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if validation fails.
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
