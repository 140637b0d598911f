//! Process-boundary form of [`RemoteError`]
//!
//! Errors cross the boundary as plain JSON objects keyed by a `$error_<Kind>`
//! tag:
//!
//! ```json
//! { "$error_RateLimitError": {
//!     "name": "RateLimitError",
//!     "message": "429 Too Many Requests\n...",
//!     "retryAfterSeconds": 30,
//!     "cause": { "$error_AniListError": { "name": "AniListError", "message": "...", "cause": "..." } }
//! } }
//! ```
//!
//! `cause` is a string, a nested packed error, a raw remote error object, or
//! `null`. Only the three remote kinds are packable; anything else is refused
//! with [`BoundaryError::NotClientSafe`].

use crate::error::{
    AniListError, AniListMultiError, ErrorCause, ProviderError, RateLimitError, RemoteError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum BoundaryError {
    #[error("Error is not safe to send across the process boundary: {0}")]
    NotClientSafe(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PackedError {
    #[serde(rename = "$error_AniListError")]
    AniList(PackedAniListError),

    #[serde(rename = "$error_AniListMultiError")]
    Multi(PackedMultiError),

    #[serde(rename = "$error_RateLimitError")]
    RateLimit(PackedRateLimitError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PackedCause {
    Text(String),
    Error(Box<PackedError>),
    Json(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedAniListError {
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub cause: Option<PackedCause>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedMultiError {
    pub name: String,
    pub message: String,
    pub errors: Vec<PackedAniListError>,
    #[serde(default)]
    pub cause: Option<PackedCause>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackedRateLimitError {
    pub name: String,
    pub message: String,
    pub retry_after_seconds: u64,
    #[serde(default)]
    pub cause: Option<PackedCause>,
}

// =============================================================================
// Packing
// =============================================================================

/// Pack a provider error for the other side of the boundary
///
/// # Errors
///
/// `BoundaryError::NotClientSafe` for every non-remote failure.
pub fn pack(error: &ProviderError) -> Result<PackedError, BoundaryError> {
    match error {
        ProviderError::Remote(remote) => Ok(pack_remote(remote)),
        other => {
            warn!(error = %other, "Refusing to pack error that is not client-safe");
            Err(BoundaryError::NotClientSafe(other.to_string()))
        }
    }
}

pub fn pack_remote(error: &RemoteError) -> PackedError {
    match error {
        RemoteError::AniList(e) => PackedError::AniList(pack_single(e)),
        RemoteError::Multi(e) => PackedError::Multi(PackedMultiError {
            name: e.name.clone(),
            message: e.message.clone(),
            errors: e.errors.iter().map(pack_single).collect(),
            cause: pack_cause(e.cause.as_ref()),
        }),
        RemoteError::RateLimit(e) => PackedError::RateLimit(PackedRateLimitError {
            name: e.name.clone(),
            message: e.message.clone(),
            retry_after_seconds: e.retry_after_seconds,
            cause: pack_cause(e.cause.as_ref()),
        }),
    }
}

fn pack_single(error: &AniListError) -> PackedAniListError {
    PackedAniListError {
        name: error.name.clone(),
        message: error.message.clone(),
        cause: pack_cause(error.cause.as_ref()),
    }
}

fn pack_cause(cause: Option<&ErrorCause>) -> Option<PackedCause> {
    cause.map(|cause| match cause {
        ErrorCause::Text(text) => PackedCause::Text(text.clone()),
        ErrorCause::Json(raw) => PackedCause::Json(raw.clone()),
        ErrorCause::Remote(remote) => PackedCause::Error(Box::new(pack_remote(remote))),
    })
}

// =============================================================================
// Unpacking
// =============================================================================

/// Rebuild the original error kind and cause chain
pub fn unpack(packed: PackedError) -> RemoteError {
    match packed {
        PackedError::AniList(e) => unpack_single(e).into(),
        PackedError::Multi(e) => AniListMultiError {
            name: e.name,
            message: e.message,
            errors: e.errors.into_iter().map(unpack_single).collect(),
            cause: unpack_cause(e.cause),
        }
        .into(),
        PackedError::RateLimit(e) => RateLimitError {
            name: e.name,
            message: e.message,
            retry_after_seconds: e.retry_after_seconds,
            cause: unpack_cause(e.cause),
        }
        .into(),
    }
}

fn unpack_single(packed: PackedAniListError) -> AniListError {
    AniListError {
        name: packed.name,
        message: packed.message,
        cause: unpack_cause(packed.cause),
    }
}

fn unpack_cause(cause: Option<PackedCause>) -> Option<ErrorCause> {
    cause.map(|cause| match cause {
        PackedCause::Text(text) => ErrorCause::Text(text),
        PackedCause::Json(raw) => ErrorCause::Json(raw),
        PackedCause::Error(packed) => ErrorCause::Remote(Box::new(unpack(*packed))),
    })
}
