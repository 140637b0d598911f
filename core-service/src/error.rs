use provider_anilist::{BoundaryError, ProviderError, RemoteError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),

    #[error("Logged in as {actual}, expected login {expected}")]
    LoginMismatch { expected: i64, actual: i64 },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error(transparent)]
    Boundary(#[from] BoundaryError),
}

impl CoreError {
    /// The provider failure underneath, wherever it was raised
    pub fn provider(&self) -> Option<&ProviderError> {
        match self {
            CoreError::Provider(e) | CoreError::Sync(core_sync::SyncError::Provider(e)) => Some(e),
            _ => None,
        }
    }

    /// The remote-reported failure underneath, if that is what this is
    pub fn remote(&self) -> Option<&RemoteError> {
        self.provider().and_then(ProviderError::remote)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
