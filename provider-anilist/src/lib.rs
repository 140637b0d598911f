//! # AniList Provider
//!
//! Everything that talks to the AniList GraphQL API.
//!
//! ## Overview
//!
//! Layered leaves first:
//! - [`error`] - remote error taxonomy and response classification
//! - [`packed`] - process-boundary form of the remote errors
//! - [`rate_limit`] - the one throttle every request passes through
//! - [`executor`] - POSTs a document, records quota, maps failures
//! - [`batch`] - DataLoader-style key coalescing
//! - [`client`] and [`media`] - typed operations over the fixed documents
//!
//! Nothing in this crate retries. A [`ProviderError`] that
//! [`is_retryable`](ProviderError::is_retryable) tells the caller how long to
//! wait; whether to try again is up to them.

pub mod batch;
pub mod client;
pub mod error;
pub mod executor;
pub mod media;
pub mod packed;
pub mod queries;
pub mod rate_limit;
pub mod types;

pub use batch::{BatchFn, BatchLoader};
pub use client::AniListClient;
pub use error::{
    AniListError, AniListMultiError, ErrorCause, ProviderError, RateLimitError, RemoteError,
    Result,
};
pub use executor::RequestExecutor;
pub use media::MediaLookup;
pub use packed::{pack, unpack, BoundaryError, PackedError};
pub use rate_limit::{QuotaSnapshot, RateLimitPermit, RateLimiter};
