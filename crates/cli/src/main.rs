mod config;
mod output;

use anyhow::{Context, Result};
use arm::ArmClient;
use armdeploy_core::{validate_container_name, DeploymentRequest, ARM_SCOPE};
use clap::Parser;
use events::EventBus;
use identity::{default_chain, AzureCliCredential, CredentialCache};
use orchestrator::Deployer;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{FileConfig, Settings};

const DEFAULT_FILTER: &str = "armdeploy=info,orchestrator=info,arm=info";
const VERBOSE_FILTER: &str =
    "armdeploy=debug,orchestrator=debug,arm=debug,identity=debug,template=debug";

#[derive(Parser, Debug)]
#[command(name = "armdeploy")]
#[command(about = "Deploy a Bicep or ARM template to an Azure resource group", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Target resource group; created when missing
    #[arg(short = 'g', long)]
    pub resource_group: String,

    /// Location used when the resource group has to be created [default: eastus]
    #[arg(short, long)]
    pub location: Option<String>,

    /// Parameter file [default: parameters.json]
    #[arg(short, long)]
    pub parameter_file: Option<PathBuf>,

    /// Subscription ID; defaults to the Azure CLI's active subscription
    #[arg(short, long)]
    pub subscription_id: Option<String>,

    /// Template to deploy, `.bicep` or ARM JSON [default: main.bicep]
    #[arg(short, long)]
    pub template: Option<PathBuf>,

    /// Preview the changes instead of deploying
    #[arg(short, long)]
    pub what_if: bool,

    /// Debug logging and full error/preview documents
    #[arg(short, long)]
    pub verbose: bool,

    /// Config file [default: ./armdeploy.toml when present]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Prefix for generated deployment names [default: deployment]
    #[arg(long)]
    pub deployment_name_prefix: Option<String>,

    /// Resource Manager endpoint, e.g. for sovereign clouds
    #[arg(long)]
    pub endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let verbose = cli.verbose;
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(error = ?e, "armdeploy failed");
            output::failure(&e, verbose);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let file = FileConfig::load(cli.config.as_deref()).await?;
    let settings = Settings::resolve(&cli, file)?;
    validate_container_name(&settings.resource_group)?;

    let subscription_id = match settings.subscription_id.clone() {
        Some(id) => id,
        None => AzureCliCredential::new()
            .default_subscription()
            .await
            .context("No subscription configured; pass --subscription-id or run 'az login'")?,
    };

    // Compile and load before any call to Resource Manager.
    let template = template::compiler_for(&settings.template)
        .compile(&settings.template)
        .await
        .with_context(|| format!("Failed to compile {}", settings.template.display()))?;
    let parameters = template::load_parameters(&settings.parameters)
        .await
        .with_context(|| format!("Failed to load {}", settings.parameters.display()))?;
    debug!(parameters = parameters.len(), "Template and parameters ready");

    let credentials = CredentialCache::new(Arc::new(default_chain()), ARM_SCOPE);
    let credential = credentials.credential().await.context("Failed to acquire a token")?;

    let client = ArmClient::new(&subscription_id)
        .with_endpoint(&settings.endpoint)
        .with_api_version(&settings.api_version);

    let subscription_name = match client.get_subscription(&credential).await {
        Ok(subscription) => subscription.display_name,
        Err(e) => {
            warn!(error = %e, "Could not look up subscription");
            None
        }
    };
    output::header(&settings, &subscription_id, subscription_name.as_deref());

    let bus = EventBus::new();
    let progress = output::spawn_progress(bus.subscribe());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        on_signal.cancel();
    });

    let deployer = Deployer::new(Arc::new(client), credentials, settings.deployer_config())
        .with_event_bus(bus)
        .with_cancellation(cancel);
    let request = DeploymentRequest::new(settings.resource_group.clone(), template, parameters);

    let result = if settings.what_if {
        deployer
            .what_if(&request, &settings.location)
            .await
            .map(|preview| Outcome::Preview(Box::new(preview)))
    } else {
        deployer
            .deploy(&request, &settings.location)
            .await
            .map(|outcome| Outcome::Deployed(Box::new(outcome)))
    };

    // Closing the bus lets the progress task drain and exit.
    drop(deployer);
    if let Err(e) = progress.await {
        debug!(error = %e, "Progress task ended abnormally");
    }

    match result? {
        Outcome::Deployed(outcome) => {
            info!(deployment = %outcome.deployment_name, "Deployment complete");
            output::outputs(&outcome);
        }
        Outcome::Preview(preview) => output::preview(&preview, settings.verbose),
    }
    Ok(())
}

enum Outcome {
    Deployed(Box<orchestrator::DeploymentOutcome>),
    Preview(Box<orchestrator::WhatIfPreview>),
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, cancelling");
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}
