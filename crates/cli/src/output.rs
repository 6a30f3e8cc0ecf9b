//! Terminal presentation. Progress comes from the event bus; the orchestrator
//! never prints anything itself.

use colored::Colorize;
use events::{Event, EventEnvelope};
use indicatif::{ProgressBar, ProgressStyle};
use orchestrator::{DeploymentOutcome, OrchestratorError, WhatIfPreview};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::Settings;

/// Render progress events until every publisher is gone.
pub fn spawn_progress(mut rx: broadcast::Receiver<EventEnvelope>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut spinner: Option<ProgressBar> = None;

        loop {
            match rx.recv().await {
                Ok(envelope) => render(&envelope.event, &mut spinner),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Progress display fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }

        if let Some(spinner) = spinner.take() {
            spinner.finish_and_clear();
        }
    })
}

fn render(event: &Event, spinner: &mut Option<ProgressBar>) {
    match event {
        Event::ContainerChecked {
            container,
            exists: true,
        } => {
            println!("{} Resource group {} exists", "✓".green(), container.bold());
        }
        Event::ContainerChecked {
            container,
            exists: false,
        } => {
            println!(
                "{} Resource group {} not found, creating it",
                "•".yellow(),
                container.bold()
            );
        }
        Event::ContainerCreated {
            container,
            location,
        } => {
            println!(
                "{} Created resource group {} in {}",
                "✓".green(),
                container.bold(),
                location
            );
        }
        Event::Submitted { deployment, kind } => {
            println!("{} Submitted {} {}", "→".cyan(), kind.as_str(), deployment.bold());
        }
        Event::PollingStarted {
            kind, timeout_secs, ..
        } => {
            let bar = new_spinner();
            bar.set_message(format!(
                "Waiting for {} to finish (up to {}s)",
                kind.as_str(),
                timeout_secs
            ));
            *spinner = Some(bar);
        }
        Event::StatusChanged { to, .. } => {
            let line = format!("  {} {}", "status".dimmed(), colorize_state(to));
            match spinner.as_ref() {
                Some(bar) => {
                    bar.println(line);
                    bar.set_message(format!("Current status: {}", to));
                }
                None => println!("{}", line),
            }
        }
        Event::Finished {
            deployment,
            kind,
            outcome,
            success,
        } => {
            if let Some(bar) = spinner.take() {
                bar.finish_and_clear();
            }
            if *success {
                println!("{} {} {} {}", "✓".green(), kind.as_str(), deployment.bold(), "succeeded".green());
            } else {
                println!("{} {} {} ended: {}", "✗".red(), kind.as_str(), deployment.bold(), outcome.red());
            }
        }
        Event::PhaseChanged { .. } => {}
    }
}

fn new_spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg} {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn colorize_state(state: &str) -> colored::ColoredString {
    match state {
        "Succeeded" => state.green(),
        s if s.starts_with("Failed") || s == "Canceled" => state.red(),
        _ => state.yellow(),
    }
}

pub fn header(settings: &Settings, subscription_id: &str, subscription_name: Option<&str>) {
    let mode = if settings.what_if { "what-if" } else { "deploy" };
    println!("{} {}", "armdeploy".bold(), mode.dimmed());
    println!();
    match subscription_name {
        Some(name) => field("Subscription", format!("{} ({})", name, subscription_id)),
        None => field("Subscription", subscription_id),
    }
    field("Resource group", &settings.resource_group);
    field("Location", &settings.location);
    field("Template", settings.template.display());
    field("Parameters", settings.parameters.display());
    println!();
}

fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", format!("{:<15}", label).dimmed(), value);
}

pub fn outputs(outcome: &DeploymentOutcome) {
    let Some(outputs) = outcome.outputs().filter(|o| !o.is_empty()) else {
        println!("No outputs.");
        return;
    };

    println!();
    println!("{}", "Outputs".bold());
    for (name, value) in outputs {
        println!("  {}: {}", name.cyan(), display_value(value));
    }
}

pub fn preview(preview: &WhatIfPreview, verbose: bool) {
    let summary = preview.change_summary();
    println!();
    if summary.is_empty() {
        println!("{}", "No changes reported.".dimmed());
    } else {
        println!("{}", "Predicted changes".bold());
        for (change_type, count) in &summary {
            println!("  {:<12} {}", change_type, count);
        }
    }

    if verbose {
        println!();
        println!("{}", pretty(&preview.changes));
    }
}

pub fn failure(error: &anyhow::Error, verbose: bool) {
    match error.downcast_ref::<OrchestratorError>() {
        Some(err) => {
            eprintln!("{} [{}] {}", "error:".red().bold(), err.kind(), err);
            if let Some(detail) = err.remote_detail() {
                if verbose {
                    eprintln!("{}", pretty(&detail));
                } else if let Some(message) = detail.get("message").and_then(Value::as_str) {
                    eprintln!("  {}", message);
                }
            }
            if err.is_auth_failure() {
                eprintln!(
                    "  {}",
                    "hint: run 'az login' or check that the signed-in account can deploy to this subscription"
                        .yellow()
                );
            }
        }
        None => eprintln!("{} {:#}", "error:".red().bold(), error),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
