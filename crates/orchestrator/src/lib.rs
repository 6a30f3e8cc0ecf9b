//! Deployment orchestration: resource group provisioning, submission and
//! bounded polling of the resulting long-running operation.

pub mod config;
pub mod deployer;
pub mod error;
pub mod poller;
pub mod state_machine;

pub use config::{DeployerConfig, DEFAULT_DEPLOYMENT_PREFIX, VALIDATION_PREFIX};
pub use deployer::{Deployer, DeploymentOutcome, WhatIfPreview};
pub use error::{OrchestratorError, Result};
pub use poller::{PollError, PollPolicy, Poller};
pub use state_machine::{InvocationState, InvocationStateMachine};
