//! # Host Bridge Traits
//!
//! Collaborator seams the sync engine needs from its host.
//!
//! ## Overview
//!
//! The engine never talks to the network, the credential store or the system
//! clock directly. Each of those is a trait defined here and implemented per
//! host (see `bridge-desktop` for the reqwest-backed transport).
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Raw request/response transport. It performs
//!   no status interpretation and no retries; the caller sees every status code.
//! - [`CredentialProvider`](credentials::CredentialProvider) - Supplies a bearer token
//!   for a login, or `None` to proceed anonymously.
//! - [`Clock`](time::Clock) - Wall-clock source for timestamps.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! convert platform errors into it and keep the message actionable.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync` so a single instance can be shared across
//! tasks behind an `Arc`.

pub mod credentials;
pub mod error;
pub mod http;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use credentials::{AnonymousCredentials, CredentialProvider, StaticCredentials};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
