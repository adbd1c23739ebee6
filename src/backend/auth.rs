//! Credential boundary.
//!
//! Token acquisition (OAuth dance, keychain storage, refresh) lives in
//! the host application; the core only consumes a bearer token string or
//! fails with an auth-unavailable condition.

use crate::core::Result;
use async_trait::async_trait;

/// Supplies bearer credentials for outbound backend calls.
///
/// `Ok(None)` means no credential is currently available, which the
/// transport converts into an auth error rather than sending anonymously.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Fetch the current access token for the named logical service
    async fn access_token(&self, service: &str) -> Result<Option<String>>;
}

/// Fixed-token provider for tests and simple deployments
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Wrap an already-acquired token
    pub fn new<S: Into<String>>(token: S) -> Self {
        StaticTokenProvider {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self, _service: &str) -> Result<Option<String>> {
        Ok(Some(self.token.clone()))
    }
}
