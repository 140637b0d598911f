//! Process-boundary envelopes
//!
//! Operations invoked from another process answer with an [`ActionResult`]:
//! `{"result": …}` on success or `{"error": <packed remote error>}` when the
//! remote service reported the failure. A provider failure of any other kind
//! is refused as [`provider_anilist::BoundaryError::NotClientSafe`]. Storage
//! and sync failures go back to the local caller unchanged.
//!
//! [`SyncFailureKind`] is the only thing a failed sync shows the user; the
//! diagnostic payload stays in the logs.

use crate::error::{CoreError, Result};
use core_sync::SyncError;
use provider_anilist::{pack, unpack, PackedError, RemoteError};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionResult<T> {
    Result(T),
    Error(PackedError),
}

/// Turn an operation result into its boundary envelope
///
/// # Errors
///
/// `CoreError::Boundary` for a provider failure the remote service did not
/// report. Every non-provider error is re-raised as is.
pub fn wrap_action<T>(result: Result<T>) -> Result<ActionResult<T>> {
    let error = match result {
        Ok(value) => return Ok(ActionResult::Result(value)),
        Err(error) => error,
    };
    match error.provider() {
        Some(provider) => {
            let packed = pack(provider)?;
            debug!(kind = packed_kind(&packed), "Packed remote error for the boundary");
            Ok(ActionResult::Error(packed))
        }
        None => Err(error),
    }
}

fn packed_kind(packed: &PackedError) -> &'static str {
    match packed {
        PackedError::AniList(_) => "AniListError",
        PackedError::Multi(_) => "AniListMultiError",
        PackedError::RateLimit(_) => "RateLimitError",
    }
}

/// Receiving side of [`wrap_action`]
pub fn unwrap_action<T>(action: ActionResult<T>) -> std::result::Result<T, RemoteError> {
    match action {
        ActionResult::Result(value) => Ok(value),
        ActionResult::Error(packed) => Err(unpack(packed)),
    }
}

// =============================================================================
// User-facing sync failures
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncFailureKind {
    RemoteService,
    Unexpected,
}

impl SyncFailureKind {
    /// Only errors AniList reported in a response body are remote-service
    /// failures. A 429 reads as unexpected.
    fn of_remote(remote: Option<&RemoteError>) -> Self {
        match remote {
            Some(RemoteError::AniList(_) | RemoteError::Multi(_)) => SyncFailureKind::RemoteService,
            Some(RemoteError::RateLimit(_)) | None => SyncFailureKind::Unexpected,
        }
    }

    pub fn of_sync_error(error: &SyncError) -> Self {
        match error {
            SyncError::Provider(e) => Self::of_remote(e.remote()),
            _ => SyncFailureKind::Unexpected,
        }
    }

    pub fn of_core_error(error: &CoreError) -> Self {
        Self::of_remote(error.remote())
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            SyncFailureKind::RemoteService => {
                "AniList responded with an error while we were syncing your watch list and local anime database."
            }
            SyncFailureKind::Unexpected => {
                "An unexpected error occurred while syncing your watch list and local anime database from AniList."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provider_anilist::{AniListError, BoundaryError, ErrorCause, ProviderError, RateLimitError};
    use serde_json::json;

    fn rate_limited() -> CoreError {
        CoreError::Provider(ProviderError::Remote(RemoteError::RateLimit(
            RateLimitError::new(
                "429 Too Many Requests\nSlow down",
                Some(30),
                Some(ErrorCause::Text("raw body".to_string())),
            ),
        )))
    }

    #[test]
    fn test_success_is_wrapped() {
        let action = wrap_action(Ok(vec![1, 2])).unwrap();
        assert_eq!(serde_json::to_value(&action).unwrap(), json!({ "result": [1, 2] }));
        assert_eq!(unwrap_action(action).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_remote_error_round_trips_through_json() {
        let action: ActionResult<()> = wrap_action(Err(rate_limited())).unwrap();

        let wire = serde_json::to_value(&action).unwrap();
        assert_eq!(
            wire["error"]["$error_RateLimitError"]["retryAfterSeconds"],
            json!(30)
        );

        let received: ActionResult<()> = serde_json::from_value(wire).unwrap();
        match unwrap_action(received).unwrap_err() {
            RemoteError::RateLimit(e) => {
                assert_eq!(e.retry_after_seconds, 30);
                assert_eq!(e.message, "429 Too Many Requests\nSlow down");
            }
            other => panic!("expected RateLimit, got {:?}", other),
        }
    }

    #[test]
    fn test_remote_error_inside_sync_error_is_packed() {
        let error = CoreError::Sync(SyncError::Provider(ProviderError::Remote(
            RemoteError::AniList(AniListError::new("Not Found.", None)),
        )));
        let action: ActionResult<()> = wrap_action(Err(error)).unwrap();
        assert!(matches!(action, ActionResult::Error(PackedError::AniList(_))));
    }

    #[test]
    fn test_transport_errors_are_refused() {
        let error = CoreError::Provider(ProviderError::Transport("connection reset".to_string()));
        let result: Result<ActionResult<()>> = wrap_action(Err(error));
        match result {
            Err(CoreError::Boundary(BoundaryError::NotClientSafe(message))) => {
                assert!(message.contains("connection reset"));
            }
            other => panic!("expected NotClientSafe, got {:?}", other),
        }

        let error = CoreError::Sync(SyncError::Provider(ProviderError::Internal(
            "database locked".to_string(),
        )));
        let result: Result<ActionResult<()>> = wrap_action(Err(error));
        assert!(matches!(
            result,
            Err(CoreError::Boundary(BoundaryError::NotClientSafe(_)))
        ));
    }

    #[test]
    fn test_non_provider_errors_are_not_wrapped() {
        let result: Result<ActionResult<()>> = wrap_action(Err(CoreError::Sync(SyncError::Paginated)));
        assert!(matches!(result, Err(CoreError::Sync(SyncError::Paginated))));

        let error = CoreError::LoginMismatch {
            expected: 1,
            actual: 2,
        };
        let result: Result<ActionResult<()>> = wrap_action(Err(error));
        assert!(matches!(result, Err(CoreError::LoginMismatch { .. })));
    }

    #[test]
    fn test_failure_kind_classification() {
        let not_found = CoreError::Sync(SyncError::Provider(ProviderError::Remote(
            RemoteError::AniList(AniListError::new("Not Found.", None)),
        )));
        assert_eq!(
            SyncFailureKind::of_core_error(&not_found),
            SyncFailureKind::RemoteService
        );
        assert_eq!(
            SyncFailureKind::of_core_error(&rate_limited()),
            SyncFailureKind::Unexpected
        );
        assert_eq!(
            SyncFailureKind::of_sync_error(&SyncError::Paginated),
            SyncFailureKind::Unexpected
        );
        assert_eq!(
            SyncFailureKind::of_sync_error(&SyncError::Provider(ProviderError::Transport(
                "dns".to_string()
            ))),
            SyncFailureKind::Unexpected
        );
    }

    #[test]
    fn test_user_messages_carry_no_diagnostics() {
        let message = SyncFailureKind::of_core_error(&rate_limited()).user_message();
        assert!(message.starts_with("An unexpected error occurred"));
        assert!(!message.contains("raw body"));
        assert!(SyncFailureKind::RemoteService
            .user_message()
            .starts_with("AniList responded with an error"));
    }
}
