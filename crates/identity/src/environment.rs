use armdeploy_core::Credential;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{AuthError, Result};
use crate::provider::TokenProvider;

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

const TENANT_VAR: &str = "AZURE_TENANT_ID";
const CLIENT_ID_VAR: &str = "AZURE_CLIENT_ID";
const CLIENT_SECRET_VAR: &str = "AZURE_CLIENT_SECRET";
const AUTHORITY_VAR: &str = "AZURE_AUTHORITY_HOST";

#[derive(Clone)]
struct ClientSecret {
    tenant_id: String,
    client_id: String,
    secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Service principal client-credentials grant, configured from
/// `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET`.
pub struct EnvironmentCredential {
    settings: Option<ClientSecret>,
    authority: String,
    client: Client,
}

impl EnvironmentCredential {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            settings: Some(ClientSecret {
                tenant_id: tenant_id.into(),
                client_id: client_id.into(),
                secret: secret.into(),
            }),
            authority: DEFAULT_AUTHORITY.to_string(),
            client: Client::new(),
        }
    }

    /// Missing variables are not an error here; `get_token` reports the
    /// credential as unavailable instead.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let credential = match (var(TENANT_VAR), var(CLIENT_ID_VAR), var(CLIENT_SECRET_VAR)) {
            (Some(tenant_id), Some(client_id), Some(secret)) => {
                Self::new(tenant_id, client_id, secret)
            }
            _ => Self {
                settings: None,
                authority: DEFAULT_AUTHORITY.to_string(),
                client: Client::new(),
            },
        };

        match var(AUTHORITY_VAR) {
            Some(authority) => credential.with_authority(authority),
            None => credential,
        }
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TokenProvider for EnvironmentCredential {
    fn name(&self) -> &'static str {
        "environment"
    }

    async fn get_token(&self, scope: &str) -> Result<Credential> {
        let settings = self.settings.as_ref().ok_or_else(|| {
            AuthError::Unavailable(format!(
                "{}, {} and {} must be set",
                TENANT_VAR, CLIENT_ID_VAR, CLIENT_SECRET_VAR
            ))
        })?;

        let url = format!("{}/{}/oauth2/v2.0/token", self.authority, settings.tenant_id);
        debug!(tenant_id = %settings.tenant_id, client_id = %settings.client_id, "Requesting client-credentials token");

        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", settings.client_id.as_str()),
                ("client_secret", settings.secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::InvalidResponse(format!("token endpoint: {}", e)))?;

        let credential = Credential::new(token.access_token, scope);
        Ok(match token.expires_in {
            Some(secs) => credential.with_expiry(Utc::now() + Duration::seconds(secs)),
            None => credential,
        })
    }
}
