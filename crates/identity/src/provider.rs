use armdeploy_core::Credential;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::azure_cli::AzureCliCredential;
use crate::environment::EnvironmentCredential;
use crate::error::{AuthError, Result};

/// Source of bearer tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Short name for logs and diagnostics
    fn name(&self) -> &'static str;

    async fn get_token(&self, scope: &str) -> Result<Credential>;
}

/// Tries providers in order, moving to the next one only when the current
/// one fails for an authentication-specific reason.
pub struct ChainedTokenProvider {
    providers: Vec<Arc<dyn TokenProvider>>,
}

impl ChainedTokenProvider {
    pub fn new(providers: Vec<Arc<dyn TokenProvider>>) -> Self {
        Self { providers }
    }

    pub fn with_fallback(primary: Arc<dyn TokenProvider>, fallback: Arc<dyn TokenProvider>) -> Self {
        Self::new(vec![primary, fallback])
    }
}

#[async_trait]
impl TokenProvider for ChainedTokenProvider {
    fn name(&self) -> &'static str {
        "chained"
    }

    async fn get_token(&self, scope: &str) -> Result<Credential> {
        let mut last_error = None;

        for provider in &self.providers {
            match provider.get_token(scope).await {
                Ok(credential) => {
                    debug!(provider = provider.name(), "Acquired token");
                    return Ok(credential);
                }
                Err(e) if e.is_authentication_failure() => {
                    warn!(provider = provider.name(), error = %e, "Credential provider failed, trying next");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| AuthError::Unavailable("no credential providers configured".to_string())))
    }
}

/// Fixed token, for pre-issued tokens and tests
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenCredential {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn get_token(&self, scope: &str) -> Result<Credential> {
        Ok(Credential::new(self.token.clone(), scope))
    }
}

/// Azure CLI first, then service-principal environment variables.
pub fn default_chain() -> ChainedTokenProvider {
    ChainedTokenProvider::with_fallback(
        Arc::new(AzureCliCredential::new()),
        Arc::new(EnvironmentCredential::from_env()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use armdeploy_core::ARM_SCOPE;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingProvider {
        error: fn() -> AuthError,
        calls: AtomicUsize,
    }

    impl FailingProvider {
        fn new(error: fn() -> AuthError) -> Self {
            Self {
                error,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TokenProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn get_token(&self, _scope: &str) -> Result<Credential> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.error)())
        }
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let fallback = Arc::new(FailingProvider::new(|| AuthError::Unavailable("unused".into())));
        let chain = ChainedTokenProvider::with_fallback(
            Arc::new(StaticTokenCredential::new("primary")),
            fallback.clone(),
        );

        let cred = chain.get_token(ARM_SCOPE).await.unwrap();
        assert_eq!(cred.token(), "primary");
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_back_on_authentication_failure() {
        let chain = ChainedTokenProvider::with_fallback(
            Arc::new(FailingProvider::new(|| {
                AuthError::Unavailable("Please run 'az login'".into())
            })),
            Arc::new(StaticTokenCredential::new("fallback")),
        );

        let cred = chain.get_token(ARM_SCOPE).await.unwrap();
        assert_eq!(cred.token(), "fallback");
        assert_eq!(cred.scope(), ARM_SCOPE);
    }

    #[tokio::test]
    async fn test_does_not_fall_back_on_other_errors() {
        let fallback = Arc::new(FailingProvider::new(|| AuthError::Unavailable("unused".into())));
        let chain = ChainedTokenProvider::with_fallback(
            Arc::new(FailingProvider::new(|| {
                AuthError::InvalidResponse("garbled output".into())
            })),
            fallback.clone(),
        );

        let err = chain.get_token(ARM_SCOPE).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_providers_failing_returns_last_error() {
        let chain = ChainedTokenProvider::with_fallback(
            Arc::new(FailingProvider::new(|| AuthError::Unavailable("cli".into()))),
            Arc::new(FailingProvider::new(|| AuthError::Unavailable("env".into()))),
        );

        let err = chain.get_token(ARM_SCOPE).await.unwrap_err();
        assert_eq!(err.to_string(), "Credential unavailable: env");
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let chain = ChainedTokenProvider::new(Vec::new());
        assert!(chain.get_token(ARM_SCOPE).await.is_err());
    }
}
