use anyhow::{bail, Context, Result};
use arm::{DEFAULT_API_VERSION, DEFAULT_ENDPOINT};
use armdeploy_core::validate_deployment_prefix;
use orchestrator::{DeployerConfig, PollPolicy, DEFAULT_DEPLOYMENT_PREFIX};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Cli;

pub const CONFIG_FILE: &str = "armdeploy.toml";
pub const DEFAULT_LOCATION: &str = "eastus";
pub const DEFAULT_PARAMETERS: &str = "parameters.json";
pub const DEFAULT_TEMPLATE: &str = "main.bicep";

/// `armdeploy.toml`. Every key is optional; command-line flags win.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub subscription_id: Option<String>,
    pub location: Option<String>,
    pub template: Option<PathBuf>,
    pub parameters: Option<PathBuf>,
    pub deployment_prefix: Option<String>,
    pub arm: ArmConfig,
    pub polling: PollingConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArmConfig {
    pub endpoint: Option<String>,
    pub api_version: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollingConfig {
    pub deployment_timeout_secs: Option<u64>,
    pub deployment_interval_secs: Option<u64>,
    pub what_if_timeout_secs: Option<u64>,
    pub what_if_interval_secs: Option<u64>,
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// An explicit `--config` path must exist; the default `armdeploy.toml`
    /// in the working directory is optional.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(CONFIG_FILE);
                if !tokio::fs::try_exists(&default).await.unwrap_or(false) {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

/// Effective settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub resource_group: String,
    pub location: String,
    pub template: PathBuf,
    pub parameters: PathBuf,
    pub subscription_id: Option<String>,
    pub deployment_prefix: String,
    pub endpoint: String,
    pub api_version: String,
    pub deployment_policy: PollPolicy,
    pub what_if_policy: PollPolicy,
    pub what_if: bool,
    pub verbose: bool,
}

impl Settings {
    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self> {
        let deployment_policy = policy(
            PollPolicy::deployment(),
            file.polling.deployment_timeout_secs,
            file.polling.deployment_interval_secs,
        )
        .context("Invalid [polling] deployment settings")?;
        let what_if_policy = policy(
            PollPolicy::follow_up(),
            file.polling.what_if_timeout_secs,
            file.polling.what_if_interval_secs,
        )
        .context("Invalid [polling] what-if settings")?;

        let deployment_prefix = cli
            .deployment_name_prefix
            .clone()
            .or(file.deployment_prefix)
            .unwrap_or_else(|| DEFAULT_DEPLOYMENT_PREFIX.to_string());
        validate_deployment_prefix(&deployment_prefix)?;

        Ok(Self {
            resource_group: cli.resource_group.clone(),
            location: cli
                .location
                .clone()
                .or(file.location)
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            template: cli
                .template
                .clone()
                .or(file.template)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE)),
            parameters: cli
                .parameter_file
                .clone()
                .or(file.parameters)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PARAMETERS)),
            subscription_id: cli.subscription_id.clone().or(file.subscription_id),
            deployment_prefix,
            endpoint: cli
                .endpoint
                .clone()
                .or(file.arm.endpoint)
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_version: file
                .arm
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            deployment_policy,
            what_if_policy,
            what_if: cli.what_if,
            verbose: cli.verbose,
        })
    }

    pub fn deployer_config(&self) -> DeployerConfig {
        DeployerConfig::new(self.deployment_prefix.clone())
            .with_deployment_policy(self.deployment_policy)
            .with_what_if_policy(self.what_if_policy)
    }
}

fn policy(base: PollPolicy, timeout_secs: Option<u64>, interval_secs: Option<u64>) -> Result<PollPolicy> {
    let timeout = timeout_secs.map(Duration::from_secs).unwrap_or(base.timeout());
    let interval = interval_secs.map(Duration::from_secs).unwrap_or(base.interval());

    if interval.is_zero() {
        bail!("poll interval must be at least one second");
    }
    if timeout < interval {
        bail!(
            "timeout ({}s) must not be shorter than the interval ({}s)",
            timeout.as_secs(),
            interval.as_secs()
        );
    }
    Ok(PollPolicy::new(timeout, interval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("armdeploy").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::resolve(&cli(&["-g", "rg-sentinel"]), FileConfig::default()).unwrap();

        assert_eq!(settings.resource_group, "rg-sentinel");
        assert_eq!(settings.location, "eastus");
        assert_eq!(settings.template, PathBuf::from("main.bicep"));
        assert_eq!(settings.parameters, PathBuf::from("parameters.json"));
        assert_eq!(settings.deployment_prefix, "deployment");
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.deployment_policy, PollPolicy::deployment());
        assert_eq!(settings.what_if_policy, PollPolicy::follow_up());
        assert!(settings.subscription_id.is_none());
        assert!(!settings.what_if);
    }

    #[test]
    fn test_file_overrides_defaults_and_flags_override_file() {
        let file = FileConfig::parse(
            r#"
            subscription_id = "sub-from-file"
            location = "westeurope"
            template = "infra/main.bicep"

            [arm]
            api_version = "2022-09-01"

            [polling]
            deployment_timeout_secs = 3600
            deployment_interval_secs = 30
            "#,
        )
        .unwrap();

        let settings = Settings::resolve(
            &cli(&["-g", "rg", "-l", "northeurope", "--what-if", "-v"]),
            file,
        )
        .unwrap();

        assert_eq!(settings.location, "northeurope");
        assert_eq!(settings.template, PathBuf::from("infra/main.bicep"));
        assert_eq!(settings.subscription_id.as_deref(), Some("sub-from-file"));
        assert_eq!(settings.api_version, "2022-09-01");
        assert_eq!(
            settings.deployment_policy,
            PollPolicy::new(Duration::from_secs(3600), Duration::from_secs(30))
        );
        assert!(settings.what_if);
        assert!(settings.verbose);
    }

    #[test]
    fn test_deployer_config_carries_prefix_and_policies() {
        let settings = Settings::resolve(
            &cli(&["-g", "rg", "--deployment-name-prefix", "sentinel"]),
            FileConfig::default(),
        )
        .unwrap();

        let config = settings.deployer_config();
        assert_eq!(config.deployment_prefix, "sentinel");
        assert_eq!(config.deployment_policy, PollPolicy::deployment());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let file = FileConfig::parse("[polling]\nwhat_if_interval_secs = 0\n").unwrap();
        let err = Settings::resolve(&cli(&["-g", "rg"]), file).unwrap_err();
        assert!(format!("{:#}", err).contains("at least one second"));
    }

    #[test]
    fn test_deployment_prefix_must_be_a_name_segment() {
        let err = Settings::resolve(
            &cli(&["-g", "rg", "--deployment-name-prefix", "a/b"]),
            FileConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("a/b"));

        let file = FileConfig::parse("deployment_prefix = \"dep?x=1\"\n").unwrap();
        assert!(Settings::resolve(&cli(&["-g", "rg"]), file).is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(FileConfig::parse("resource_group = \"rg\"\n").is_err());
    }

    #[tokio::test]
    async fn test_explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(FileConfig::load(Some(&missing)).await.is_err());

        let present = dir.path().join("armdeploy.toml");
        std::fs::write(&present, "location = \"uksouth\"\n").unwrap();
        let file = FileConfig::load(Some(&present)).await.unwrap();
        assert_eq!(file.location.as_deref(), Some("uksouth"));
    }
}
