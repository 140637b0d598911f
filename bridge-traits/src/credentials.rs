//! Credential Provider Abstraction
//!
//! The engine never performs the OAuth handshake. It asks the host for the
//! bearer token belonging to a login right before each authenticated request.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;

/// Supplies access tokens for logins
///
/// `Ok(None)` means "proceed anonymously"; the request is still valid and is
/// served under public rate limits.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::credentials::CredentialProvider;
///
/// async fn header(provider: &dyn CredentialProvider, login: i64) -> Option<String> {
///     provider
///         .access_token(login)
///         .await
///         .ok()
///         .flatten()
///         .map(|token| format!("Bearer {}", token))
/// }
/// ```
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Look up the token for `login_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the backing credential store cannot be read.
    async fn access_token(&self, login_id: i64) -> Result<Option<String>>;
}

/// Provider that never has a token
#[derive(Debug, Clone, Default)]
pub struct AnonymousCredentials;

#[async_trait]
impl CredentialProvider for AnonymousCredentials {
    async fn access_token(&self, _login_id: i64) -> Result<Option<String>> {
        Ok(None)
    }
}

/// In-memory token table
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    tokens: HashMap<i64, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, login_id: i64, token: impl Into<String>) -> Self {
        self.tokens.insert(login_id, token.into());
        self
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn access_token(&self, login_id: i64) -> Result<Option<String>> {
        Ok(self.tokens.get(&login_id).cloned())
    }
}
