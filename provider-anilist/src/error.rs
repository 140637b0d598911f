//! Error types for the AniList provider
//!
//! Remote failures are split into a small whitelist ([`RemoteError`]) that is
//! allowed to cross the process boundary, and everything else
//! ([`ProviderError`]'s other variants) which stays on the engine side.

use bridge_traits::error::BridgeError;
use bridge_traits::http::HttpResponse;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Wait used when a 429 carries no usable `Retry-After`
pub const DEFAULT_RETRY_AFTER_SECONDS: u64 = 60;

// =============================================================================
// Causes
// =============================================================================

/// Diagnostic context attached to a remote error
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCause {
    /// Human-readable context, usually the raw status line and body
    Text(String),
    /// Raw error object as the remote reported it
    Json(Value),
    /// Another remote error this one wraps
    Remote(Box<RemoteError>),
}

impl fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCause::Text(text) => f.write_str(text),
            ErrorCause::Json(value) => write!(f, "{}", value),
            ErrorCause::Remote(error) => write!(f, "{}", error),
        }
    }
}

impl From<RemoteError> for ErrorCause {
    fn from(error: RemoteError) -> Self {
        ErrorCause::Remote(Box::new(error))
    }
}

// =============================================================================
// Remote Errors
// =============================================================================

/// A single failure reported by AniList
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct AniListError {
    pub name: String,
    pub message: String,
    pub cause: Option<ErrorCause>,
}

impl AniListError {
    pub const NAME: &'static str = "AniListError";

    pub fn new(message: impl Into<String>, cause: Option<ErrorCause>) -> Self {
        Self {
            name: Self::NAME.to_string(),
            message: message.into(),
            cause,
        }
    }

    /// Machine status carried by the raw GraphQL error object, if any
    pub fn status(&self) -> Option<u16> {
        match &self.cause {
            Some(ErrorCause::Json(raw)) => raw
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|status| u16::try_from(status).ok()),
            _ => None,
        }
    }
}

/// Several failures reported together in one GraphQL `errors` array
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct AniListMultiError {
    pub name: String,
    pub message: String,
    pub errors: Vec<AniListError>,
    pub cause: Option<ErrorCause>,
}

impl AniListMultiError {
    pub const NAME: &'static str = "AniListMultiError";

    pub fn new(errors: Vec<AniListError>, cause: Option<ErrorCause>) -> Self {
        let message = Self::message_for(&errors);
        Self {
            name: Self::NAME.to_string(),
            message,
            errors,
            cause,
        }
    }

    fn message_for(errors: &[AniListError]) -> String {
        let joined = errors
            .iter()
            .map(|error| error.message.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        format!("AniList responded with multiple errors:\n{}", joined)
    }
}

/// The remote service or its CDN asked us to slow down
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct RateLimitError {
    pub name: String,
    pub message: String,
    pub retry_after_seconds: u64,
    pub cause: Option<ErrorCause>,
}

impl RateLimitError {
    pub const NAME: &'static str = "RateLimitError";

    pub fn new(
        message: impl Into<String>,
        retry_after_seconds: Option<u64>,
        cause: Option<ErrorCause>,
    ) -> Self {
        Self {
            name: Self::NAME.to_string(),
            message: message.into(),
            retry_after_seconds: retry_after_seconds.unwrap_or(DEFAULT_RETRY_AFTER_SECONDS),
            cause,
        }
    }

    pub fn retry_after(&self) -> Duration {
        Duration::from_secs(self.retry_after_seconds)
    }
}

/// Remote failures that may be packed across the process boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    #[error(transparent)]
    AniList(#[from] AniListError),

    #[error(transparent)]
    Multi(#[from] AniListMultiError),
}

impl RemoteError {
    pub fn name(&self) -> &str {
        match self {
            RemoteError::RateLimit(e) => &e.name,
            RemoteError::AniList(e) => &e.name,
            RemoteError::Multi(e) => &e.name,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RemoteError::RateLimit(e) => &e.message,
            RemoteError::AniList(e) => &e.message,
            RemoteError::Multi(e) => &e.message,
        }
    }

    pub fn cause(&self) -> Option<&ErrorCause> {
        match self {
            RemoteError::RateLimit(e) => e.cause.as_ref(),
            RemoteError::AniList(e) => e.cause.as_ref(),
            RemoteError::Multi(e) => e.cause.as_ref(),
        }
    }

    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            RemoteError::RateLimit(e) => Some(e.retry_after_seconds),
            _ => None,
        }
    }

    /// Classify a non-2xx response body
    ///
    /// Tries the simple `{error: {status, messages}}` envelope, then the
    /// GraphQL `{data, errors}` envelope. Anything else becomes a generic
    /// [`AniListError`]. The raw status line and body are always kept as the
    /// cause.
    pub fn from_response(response: &HttpResponse) -> RemoteError {
        let status_line = status_line(response);

        match parse_json_body(response) {
            Some(body) => {
                let pretty = pretty_json(&body);
                let cause = ErrorCause::Text(format!(
                    "AniList responded with {}\n{}",
                    status_line, pretty
                ));

                if let Ok(simple) = SimpleErrorEnvelope::deserialize(&body) {
                    return AniListError::new(simple.error.messages.join("\n"), Some(cause))
                        .into();
                }

                if let Some(errors) = graphql_errors(&body) {
                    return AniListMultiError::new(errors, Some(cause)).into();
                }

                AniListError::new(
                    format!("AniList responded with an unexpected error:\n{}", pretty),
                    Some(cause),
                )
                .into()
            }
            None => {
                let text = response.text_lossy();
                AniListError::new(
                    format!("AniList responded with an unexpected error:\n{}", text),
                    Some(ErrorCause::Text(format!(
                        "AniList responded with {}\n{}",
                        status_line, text
                    ))),
                )
                .into()
            }
        }
    }

    /// GraphQL errors reported alongside a 2xx status
    ///
    /// Returns `None` when the body carries no `errors`, or an empty array.
    pub fn from_graphql_body(response: &HttpResponse, body: &Value) -> Option<RemoteError> {
        let errors = graphql_errors(body)?;
        if errors.is_empty() {
            return None;
        }

        let cause = ErrorCause::Text(format!(
            "AniList responded with {}\n{}",
            status_line(response),
            pretty_json(body)
        ));
        Some(AniListMultiError::new(errors, Some(cause)).into())
    }
}

#[derive(Deserialize)]
struct SimpleErrorEnvelope {
    error: SimpleErrorBody,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct SimpleErrorBody {
    #[serde(default)]
    status: Option<u16>,
    messages: Vec<String>,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct GraphQlErrorItem {
    message: String,
    #[serde(default)]
    status: Option<u16>,
}

/// `errors` array where every element has a string `message`
fn graphql_errors(body: &Value) -> Option<Vec<AniListError>> {
    let raw_errors = body.get("errors")?.as_array()?;

    raw_errors
        .iter()
        .map(|raw| {
            GraphQlErrorItem::deserialize(raw)
                .ok()
                .map(|item| AniListError::new(item.message, Some(ErrorCause::Json(raw.clone()))))
        })
        .collect()
}

fn parse_json_body(response: &HttpResponse) -> Option<Value> {
    let is_json = response
        .header("Content-Type")
        .and_then(|value| value.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false);

    if !is_json {
        return None;
    }
    response.json().ok()
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// `"429 Too Many Requests"`, or just the code when no reason is known
pub(crate) fn status_line(response: &HttpResponse) -> String {
    match response.reason.as_deref() {
        Some(reason) if !reason.is_empty() => format!("{} {}", response.status, reason),
        _ => response.status.to_string(),
    }
}

// =============================================================================
// Provider Errors
// =============================================================================

/// Every failure the provider can report
///
/// `Clone` so a single failed batch can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to parse AniList response: {0}")]
    Parse(String),

    #[error("Credentials unavailable: {0}")]
    Credentials(String),

    #[error("Invalid response from AniList: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Only throttling is worth retrying; callers decide when
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Remote(RemoteError::RateLimit(_)))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::Remote(RemoteError::RateLimit(e)) => Some(e.retry_after()),
            _ => None,
        }
    }

    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            ProviderError::Remote(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BridgeError> for ProviderError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Credentials(message) => ProviderError::Credentials(message),
            other => ProviderError::Transport(other.to_string()),
        }
    }
}

impl From<RateLimitError> for ProviderError {
    fn from(error: RateLimitError) -> Self {
        ProviderError::Remote(error.into())
    }
}

impl From<AniListError> for ProviderError {
    fn from(error: AniListError) -> Self {
        ProviderError::Remote(error.into())
    }
}

impl From<AniListMultiError> for ProviderError {
    fn from(error: AniListMultiError) -> Self {
        ProviderError::Remote(error.into())
    }
}

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;
