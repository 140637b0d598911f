use core_library::models::{LoginId, MediaId};
use core_library::LibraryError;
use provider_anilist::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Got the list of viewer {actual:?}, expected login {expected}")]
    WrongViewer {
        expected: LoginId,
        actual: Option<i64>,
    },

    #[error("List collection arrived in multiple chunks; refusing to sync a partial list")]
    Paginated,

    #[error("Media {media_id} has no title")]
    MissingTitle { media_id: MediaId },

    #[error("{what} {id} has no updatedAt")]
    MissingUpdatedAt { what: &'static str, id: i64 },

    #[error("Malformed list collection: {0}")]
    MalformedList(String),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Sync already in progress for login {0}")]
    SyncInProgress(LoginId),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },
}

impl SyncError {
    /// Whether re-running the sync later could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            SyncError::Provider(e) => e.is_retryable() || matches!(e, ProviderError::Transport(_)),
            SyncError::Cancelled | SyncError::SyncInProgress(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
