//! Bearer credential capability.
//!
//! Token issuance belongs to an external identity provider; the client only
//! asks for whatever token is current right before each request.

use async_trait::async_trait;

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn obtain_credential(&self) -> Option<String>;
}

/// No identity provider wired in. Requests go out unauthenticated.
pub struct MissingCredentialProvider;

#[async_trait]
impl CredentialProvider for MissingCredentialProvider {
    async fn obtain_credential(&self) -> Option<String> {
        None
    }
}

/// Fixed token handed over at startup (CLI flag or environment).
pub struct StaticCredentialProvider {
    token: Option<String>,
}

impl StaticCredentialProvider {
    pub fn new(token: Option<String>) -> Self {
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self { token }
    }

    pub fn from_env(var: &str) -> Self {
        Self::new(std::env::var(var).ok())
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

impl std::fmt::Debug for StaticCredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentialProvider")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn obtain_credential(&self) -> Option<String> {
        self.token.clone()
    }
}
