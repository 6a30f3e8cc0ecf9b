use armdeploy_core::Credential;
use chrono::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::provider::TokenProvider;

/// Refresh tokens this long before they expire.
const DEFAULT_REFRESH_SKEW_SECS: i64 = 300;

/// Holds the current token for one run and re-fetches it from the provider
/// once it is about to expire.
///
/// Tokens without a known expiry are fetched once and reused.
pub struct CredentialCache {
    provider: Arc<dyn TokenProvider>,
    scope: String,
    refresh_skew: Duration,
    current: Mutex<Option<Credential>>,
}

impl CredentialCache {
    pub fn new(provider: Arc<dyn TokenProvider>, scope: impl Into<String>) -> Self {
        Self {
            provider,
            scope: scope.into(),
            refresh_skew: Duration::seconds(DEFAULT_REFRESH_SKEW_SECS),
            current: Mutex::new(None),
        }
    }

    pub async fn credential(&self) -> Result<Credential> {
        let mut current = self.current.lock().await;

        if let Some(credential) = current.as_ref() {
            if !credential.expires_within(self.refresh_skew) {
                return Ok(credential.clone());
            }
            info!(expires_on = ?credential.expires_on(), "Refreshing expiring token");
        }

        let credential = self.provider.get_token(&self.scope).await?;
        debug!(provider = self.provider.name(), expires_on = ?credential.expires_on(), "Token cached");
        *current = Some(credential.clone());
        Ok(credential)
    }
}
