use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{OrchestratorError, Result};

/// Lifecycle of one deploy or what-if invocation.
///
/// `Canceled` is the control plane's own terminal state; `Cancelled` means
/// this process stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Init,
    ContainerChecked,
    Submitted,
    Polling,
    Succeeded,
    Failed,
    Canceled,
    TimedOut,
    TransportFailed,
    Aborted,
    Cancelled,
}

impl InvocationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ContainerChecked => "container_checked",
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::TimedOut => "timed_out",
            Self::TransportFailed => "transport_failed",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        InvocationStateMachine::allowed_transitions(self).is_empty()
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct InvocationStateMachine;

impl InvocationStateMachine {
    pub fn validate_transition(from: &InvocationState, to: &InvocationState) -> Result<()> {
        let allowed = Self::allowed_transitions(from);

        if allowed.contains(to) {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    fn allowed_transitions(from: &InvocationState) -> Vec<InvocationState> {
        use InvocationState::*;

        match from {
            Init => vec![ContainerChecked, Cancelled, Aborted],
            ContainerChecked => vec![Submitted, Cancelled, Aborted],
            // A what-if answered inline never polls.
            Submitted => vec![Polling, Succeeded, Aborted],
            Polling => vec![
                Succeeded,
                Failed,
                Canceled,
                TimedOut,
                TransportFailed,
                Cancelled,
                Aborted,
            ],
            Succeeded | Failed | Canceled | TimedOut | TransportFailed | Aborted | Cancelled => {
                vec![]
            }
        }
    }

    pub fn can_transition(from: &InvocationState, to: &InvocationState) -> bool {
        Self::validate_transition(from, to).is_ok()
    }
}
