use armdeploy_core::Credential;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{AuthError, Result};
use crate::provider::TokenProvider;

const AZ_PROGRAM: &str = "az";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    /// Unix timestamp, present on Azure CLI 2.54+
    #[serde(default, rename = "expires_on")]
    expires_on: Option<i64>,
}

/// Token provider backed by the user's local `az login` session
pub struct AzureCliCredential {
    program: PathBuf,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self::with_program(AZ_PROGRAM)
    }

    /// Use a different `az` executable
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Subscription ID of the CLI's active account
    pub async fn default_subscription(&self) -> Result<String> {
        let stdout = self
            .run(&["account", "show", "--query", "id", "--output", "tsv"])
            .await?;
        let id = stdout.trim().to_string();

        if id.is_empty() {
            return Err(AuthError::Unavailable(
                "Azure CLI has no active subscription".to_string(),
            ));
        }

        info!(subscription_id = %id, "Using Azure CLI default subscription");
        Ok(id)
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        debug!(program = %self.program.display(), args = ?args, "Running Azure CLI");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => AuthError::Unavailable(format!(
                    "Azure CLI not found at '{}'",
                    self.program.display()
                )),
                _ => AuthError::Command(format!("Failed to run Azure CLI: {}", e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AuthError::Unavailable(format!(
                "Azure CLI failed ({}); run 'az login' first: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenProvider for AzureCliCredential {
    fn name(&self) -> &'static str {
        "azure-cli"
    }

    async fn get_token(&self, scope: &str) -> Result<Credential> {
        let stdout = self
            .run(&["account", "get-access-token", "--scope", scope, "--output", "json"])
            .await?;

        parse_cli_token(&stdout, scope)
    }
}

fn parse_cli_token(stdout: &str, scope: &str) -> Result<Credential> {
    let token: CliToken = serde_json::from_str(stdout)
        .map_err(|e| AuthError::InvalidResponse(format!("Azure CLI output: {}", e)))?;

    let credential = Credential::new(token.access_token, scope);
    Ok(match token.expires_on.and_then(|ts| Utc.timestamp_opt(ts, 0).single()) {
        Some(at) => credential.with_expiry(at),
        None => credential,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use armdeploy_core::ARM_SCOPE;

    #[test]
    fn test_parse_cli_token_with_expiry() {
        let stdout = r#"{
            "accessToken": "eyJ0eXAi",
            "expiresOn": "2026-10-18 12:00:00.000000",
            "expires_on": 1792324800,
            "subscription": "sub",
            "tenant": "tenant",
            "tokenType": "Bearer"
        }"#;

        let cred = parse_cli_token(stdout, ARM_SCOPE).unwrap();
        assert_eq!(cred.token(), "eyJ0eXAi");
        assert_eq!(cred.expires_on().unwrap().timestamp(), 1792324800);
    }

    #[test]
    fn test_parse_cli_token_without_expiry() {
        let cred = parse_cli_token(r#"{"accessToken": "abc"}"#, ARM_SCOPE).unwrap();
        assert!(cred.expires_on().is_none());
    }

    #[test]
    fn test_parse_cli_token_garbage() {
        let err = parse_cli_token("ERROR: something", ARM_SCOPE).unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_cli_is_unavailable() {
        let cred = AzureCliCredential::with_program("/nonexistent/bin/az-missing");
        let err = cred.get_token(ARM_SCOPE).await.unwrap_err();
        assert!(err.is_authentication_failure());
    }
}
