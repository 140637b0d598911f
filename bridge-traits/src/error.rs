use thiserror::Error;

/// Failures reported by host-provided bridge implementations
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("HTTP transport failed: {0}")]
    OperationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Credential lookup failed: {0}")]
    Credentials(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
