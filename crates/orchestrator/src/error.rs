use arm::ArmError;
use armdeploy_core::{CoreError, ProvisioningState};
use identity::AuthError;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::state_machine::InvocationState;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] CoreError),

    #[error("Failed to provision resource group '{container}': {source}")]
    ContainerProvisioning {
        container: String,
        #[source]
        source: ArmError,
    },

    #[error("Failed to submit '{deployment}': {reason}")]
    Submission {
        deployment: String,
        reason: String,
        #[source]
        source: Option<ArmError>,
    },

    #[error("Polling '{deployment}' failed: {source}")]
    PollTransport {
        deployment: String,
        #[source]
        source: ArmError,
    },

    #[error("'{deployment}' finished in state {state}")]
    RemoteFailure {
        deployment: String,
        state: ProvisioningState,
        error: Option<Value>,
    },

    #[error(
        "Timed out after {}s waiting for '{deployment}' (last state: {})",
        .elapsed.as_secs(),
        .last_state.as_deref().unwrap_or("unknown")
    )]
    Timeout {
        deployment: String,
        elapsed: Duration,
        last_state: Option<String>,
    },

    #[error("'{deployment}' was cancelled before it finished")]
    Cancelled { deployment: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl OrchestratorError {
    pub fn submission(deployment: impl Into<String>, source: ArmError) -> Self {
        Self::Submission {
            deployment: deployment.into(),
            reason: source.to_string(),
            source: Some(source),
        }
    }

    /// Stable short label, used for the CLI's failure line and in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::InvalidRequest(_) => "invalid_request",
            Self::ContainerProvisioning { .. } => "container",
            Self::Submission { .. } => "submission",
            Self::PollTransport { .. } => "transport",
            Self::RemoteFailure { .. } => "remote_failure",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
            Self::InvalidTransition { .. } => "internal",
        }
    }

    /// Terminal invocation state this failure leaves the run in.
    pub fn invocation_state(&self) -> InvocationState {
        match self {
            Self::RemoteFailure { state, .. } if *state == ProvisioningState::Canceled => {
                InvocationState::Canceled
            }
            Self::RemoteFailure { .. } => InvocationState::Failed,
            Self::Timeout { .. } => InvocationState::TimedOut,
            Self::PollTransport { .. } => InvocationState::TransportFailed,
            Self::Cancelled { .. } => InvocationState::Cancelled,
            Self::Auth(_)
            | Self::InvalidRequest(_)
            | Self::ContainerProvisioning { .. }
            | Self::Submission { .. }
            | Self::InvalidTransition { .. } => InvocationState::Aborted,
        }
    }

    /// True when no token could be had, or the control plane answered 401/403.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Auth(_) => true,
            Self::Submission {
                source: Some(source),
                ..
            }
            | Self::PollTransport { source, .. }
            | Self::ContainerProvisioning { source, .. } => source.is_auth_failure(),
            _ => false,
        }
    }

    /// Structured error payload reported by the control plane, if any.
    pub fn remote_detail(&self) -> Option<Value> {
        match self {
            Self::RemoteFailure { error, .. } => error.clone(),
            Self::Submission {
                source: Some(source),
                ..
            }
            | Self::PollTransport { source, .. }
            | Self::ContainerProvisioning { source, .. } => source.detail(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
