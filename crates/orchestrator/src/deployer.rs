use arm::{ArmError, FollowUpOutcome, ResourceApi, SubmitOutcome};
use armdeploy_core::{
    DeploymentName, DeploymentRequest, DeploymentResult, OperationHandle, ProvisioningState,
};
use events::{Event, EventBus, OperationKind};
use identity::CredentialCache;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DeployerConfig;
use crate::error::{OrchestratorError, Result};
use crate::poller::{PollError, PollPolicy, Poller};
use crate::state_machine::{InvocationState, InvocationStateMachine};

/// A deployment that reached `Succeeded`.
#[derive(Debug, Clone)]
pub struct DeploymentOutcome {
    pub deployment_name: DeploymentName,
    pub result: DeploymentResult,
}

impl DeploymentOutcome {
    pub fn outputs(&self) -> Option<&Map<String, Value>> {
        self.result.outputs.as_ref()
    }
}

/// Change preview returned by a what-if request.
#[derive(Debug, Clone)]
pub struct WhatIfPreview {
    pub deployment_name: DeploymentName,
    pub changes: Value,
}

impl WhatIfPreview {
    /// Per-resource entries of the preview document.
    pub fn resource_changes(&self) -> &[Value] {
        self.changes
            .pointer("/properties/changes")
            .or_else(|| self.changes.get("changes"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of resource changes per `changeType` (Create, Modify, ...).
    pub fn change_summary(&self) -> BTreeMap<String, usize> {
        let mut summary = BTreeMap::new();
        for change in self.resource_changes() {
            let change_type = change
                .get("changeType")
                .and_then(Value::as_str)
                .unwrap_or("Unknown");
            *summary.entry(change_type.to_string()).or_insert(0) += 1;
        }
        summary
    }
}

struct Invocation {
    kind: OperationKind,
    state: InvocationState,
    deployment: Option<DeploymentName>,
}

impl Invocation {
    fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            state: InvocationState::Init,
            deployment: None,
        }
    }
}

/// Runs one deploy or what-if invocation end to end: make sure the resource
/// group exists, submit, then poll until the operation settles.
///
/// Nothing is retried. A failure at any step ends the invocation and is
/// reported as the matching `OrchestratorError`.
pub struct Deployer {
    api: Arc<dyn ResourceApi>,
    credentials: CredentialCache,
    config: DeployerConfig,
    event_bus: Option<EventBus>,
    cancel: CancellationToken,
}

impl Deployer {
    pub fn new(
        api: Arc<dyn ResourceApi>,
        credentials: CredentialCache,
        config: DeployerConfig,
    ) -> Self {
        Self {
            api,
            credentials,
            config,
            event_bus: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub async fn deploy(
        &self,
        request: &DeploymentRequest,
        location: &str,
    ) -> Result<DeploymentOutcome> {
        let mut invocation = Invocation::new(OperationKind::Deployment);
        let result = self.run_deploy(&mut invocation, request, location).await;
        self.finish(&mut invocation, result)
    }

    /// Preview the changes `request` would make. The deployment endpoint
    /// itself is never called.
    pub async fn what_if(&self, request: &DeploymentRequest, location: &str) -> Result<WhatIfPreview> {
        let mut invocation = Invocation::new(OperationKind::WhatIf);
        let result = self.run_what_if(&mut invocation, request, location).await;
        self.finish(&mut invocation, result)
    }

    async fn run_deploy(
        &self,
        invocation: &mut Invocation,
        request: &DeploymentRequest,
        location: &str,
    ) -> Result<DeploymentOutcome> {
        let container = request.container();
        let name = DeploymentName::generate(&self.config.deployment_prefix)?;
        self.ensure_not_cancelled(container)?;
        self.ensure_container(container, location).await?;
        self.transition(invocation, InvocationState::ContainerChecked)?;

        invocation.deployment = Some(name.clone());

        let credential = self.credentials.credential().await?;
        self.ensure_not_cancelled(name.as_str())?;
        info!(deployment = %name, container, "Submitting deployment");
        let submitted = self
            .api
            .submit_deployment(&credential, name.as_str(), request)
            .await
            .map_err(|e| OrchestratorError::submission(name.as_str(), e))?;
        debug!(deployment = %name, pending = submitted.is_pending(), "Deployment accepted");

        self.transition(invocation, InvocationState::Submitted)?;
        self.emit(Event::Submitted {
            deployment: name.to_string(),
            kind: OperationKind::Deployment,
        });

        // Status always comes from the deployment resource, whatever the
        // submission response carried.
        let handle = OperationHandle::Resource {
            container: container.to_string(),
            deployment: name.to_string(),
        };
        self.transition(invocation, InvocationState::Polling)?;

        let deployment = name.as_str();
        let result = self
            .poll(
                &handle,
                deployment,
                OperationKind::Deployment,
                self.config.deployment_policy,
                move || self.fetch_status(container, deployment),
                DeploymentResult::is_terminal,
                |result: &DeploymentResult| result.state.as_str().to_string(),
            )
            .await?;

        if !result.state.is_success() {
            return Err(OrchestratorError::RemoteFailure {
                deployment: name.to_string(),
                state: result.state,
                error: result.error,
            });
        }

        self.transition(invocation, InvocationState::Succeeded)?;
        info!(
            deployment = %name,
            outputs = result.outputs.as_ref().map_or(0, |o| o.len()),
            "Deployment succeeded"
        );
        Ok(DeploymentOutcome {
            deployment_name: name,
            result,
        })
    }

    async fn run_what_if(
        &self,
        invocation: &mut Invocation,
        request: &DeploymentRequest,
        location: &str,
    ) -> Result<WhatIfPreview> {
        let container = request.container();
        let name = DeploymentName::generate(&self.config.validation_prefix)?;
        self.ensure_not_cancelled(container)?;
        self.ensure_container(container, location).await?;
        self.transition(invocation, InvocationState::ContainerChecked)?;

        invocation.deployment = Some(name.clone());

        let credential = self.credentials.credential().await?;
        self.ensure_not_cancelled(name.as_str())?;
        info!(deployment = %name, container, "Submitting what-if request");
        let submitted = self
            .api
            .submit_what_if(&credential, name.as_str(), request)
            .await
            .map_err(|e| OrchestratorError::submission(name.as_str(), e))?;

        self.transition(invocation, InvocationState::Submitted)?;
        self.emit(Event::Submitted {
            deployment: name.to_string(),
            kind: OperationKind::WhatIf,
        });

        let url = match submitted {
            SubmitOutcome::Resolved(changes) => {
                debug!(deployment = %name, "What-if answered inline");
                self.transition(invocation, InvocationState::Succeeded)?;
                return Ok(WhatIfPreview {
                    deployment_name: name,
                    changes,
                });
            }
            SubmitOutcome::Pending {
                location: Some(url),
            } => url,
            SubmitOutcome::Pending { location: None } => {
                return Err(OrchestratorError::Submission {
                    deployment: name.to_string(),
                    reason: "what-if was accepted without a Location header to poll".to_string(),
                    source: None,
                });
            }
        };

        let handle = OperationHandle::FollowUp { url };
        self.transition(invocation, InvocationState::Polling)?;

        let deployment = name.as_str();
        let handle_ref = &handle;
        let outcome = self
            .poll(
                &handle,
                deployment,
                OperationKind::WhatIf,
                self.config.what_if_policy,
                move || self.fetch_follow_up(deployment, handle_ref),
                FollowUpOutcome::is_terminal,
                follow_up_label,
            )
            .await?;

        match outcome {
            FollowUpOutcome::Resolved(changes) => {
                self.transition(invocation, InvocationState::Succeeded)?;
                info!(deployment = %name, "What-if completed");
                Ok(WhatIfPreview {
                    deployment_name: name,
                    changes,
                })
            }
            FollowUpOutcome::Failed { status, error } => {
                warn!(deployment = %name, status, "What-if operation failed");
                Err(OrchestratorError::RemoteFailure {
                    deployment: name.to_string(),
                    state: ProvisioningState::Failed,
                    error: error.map(|body| body.get("error").cloned().unwrap_or(body)),
                })
            }
            // The poller only hands back terminal outcomes.
            FollowUpOutcome::Pending => Err(OrchestratorError::InvalidTransition {
                from: InvocationState::Polling.to_string(),
                to: "pending".to_string(),
            }),
        }
    }

    /// Nothing is created or submitted once the caller has cancelled.
    fn ensure_not_cancelled(&self, target: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            warn!(target, "Cancelled before submission");
            return Err(OrchestratorError::Cancelled {
                deployment: target.to_string(),
            });
        }
        Ok(())
    }

    async fn ensure_container(&self, container: &str, location: &str) -> Result<()> {
        let credential = self.credentials.credential().await?;
        let provisioning = |source: ArmError| OrchestratorError::ContainerProvisioning {
            container: container.to_string(),
            source,
        };

        let exists = self
            .api
            .container_exists(&credential, container)
            .await
            .map_err(provisioning)?;
        self.emit(Event::ContainerChecked {
            container: container.to_string(),
            exists,
        });

        if exists {
            debug!(container, "Resource group exists");
            return Ok(());
        }

        info!(container, location, "Creating resource group");
        self.api
            .create_container(&credential, container, location)
            .await
            .map_err(provisioning)?;
        self.emit(Event::ContainerCreated {
            container: container.to_string(),
            location: location.to_string(),
        });
        Ok(())
    }

    /// One bounded poll loop; `label` names each snapshot for progress
    /// events and the timeout report.
    #[allow(clippy::too_many_arguments)]
    async fn poll<T, F, Fut, P, L>(
        &self,
        handle: &OperationHandle,
        deployment: &str,
        kind: OperationKind,
        policy: PollPolicy,
        fetch: F,
        is_terminal: P,
        label: L,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&T) -> bool,
        L: Fn(&T) -> String,
    {
        info!(
            deployment,
            kind = kind.as_str(),
            handle = %handle,
            timeout_secs = policy.timeout().as_secs(),
            interval_secs = policy.interval().as_secs(),
            "Polling operation"
        );
        self.emit(Event::PollingStarted {
            deployment: deployment.to_string(),
            kind,
            timeout_secs: policy.timeout().as_secs(),
            interval_secs: policy.interval().as_secs(),
        });

        let mut last: Option<String> = None;
        let poller = Poller::new(policy).with_cancellation(self.cancel.clone());
        let polled = poller
            .run(fetch, is_terminal, |value| {
                let current = label(value);
                if last.as_deref() != Some(current.as_str()) {
                    info!(deployment, from = ?last, to = %current, "Status changed");
                    self.emit(Event::StatusChanged {
                        deployment: deployment.to_string(),
                        from: last.clone(),
                        to: current.clone(),
                    });
                    last = Some(current);
                }
            })
            .await;

        match polled {
            Ok(value) => Ok(value),
            Err(PollError::Fetch(e)) => Err(e),
            Err(PollError::TimedOut { elapsed, attempts }) => {
                warn!(deployment, attempts, elapsed_secs = elapsed.as_secs(), "Polling timed out");
                Err(OrchestratorError::Timeout {
                    deployment: deployment.to_string(),
                    elapsed,
                    last_state: last,
                })
            }
            Err(PollError::Cancelled { attempts }) => {
                warn!(deployment, attempts, "Polling cancelled");
                Err(OrchestratorError::Cancelled {
                    deployment: deployment.to_string(),
                })
            }
        }
    }

    async fn fetch_status(&self, container: &str, deployment: &str) -> Result<DeploymentResult> {
        let credential = self.credentials.credential().await?;
        self.api
            .get_deployment_status(&credential, container, deployment)
            .await
            .map_err(|source| OrchestratorError::PollTransport {
                deployment: deployment.to_string(),
                source,
            })
    }

    async fn fetch_follow_up(
        &self,
        deployment: &str,
        handle: &OperationHandle,
    ) -> Result<FollowUpOutcome> {
        let url = match handle {
            OperationHandle::FollowUp { url } => url,
            OperationHandle::Resource { .. } => {
                return Err(OrchestratorError::InvalidTransition {
                    from: handle.to_string(),
                    to: "follow-up poll".to_string(),
                })
            }
        };

        let credential = self.credentials.credential().await?;
        self.api
            .get_follow_up(&credential, url)
            .await
            .map_err(|source| OrchestratorError::PollTransport {
                deployment: deployment.to_string(),
                source,
            })
    }

    fn transition(&self, invocation: &mut Invocation, to: InvocationState) -> Result<()> {
        let from = invocation.state;
        InvocationStateMachine::validate_transition(&from, &to)?;
        invocation.state = to;

        info!(
            kind = invocation.kind.as_str(),
            from = %from,
            to = %to,
            "Invocation state transition"
        );
        self.emit(Event::PhaseChanged {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        });
        Ok(())
    }

    /// Record the terminal state for `result` and announce the outcome.
    fn finish<T>(&self, invocation: &mut Invocation, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            error!(kind = err.kind(), error = %err, "Invocation failed");
            let target = err.invocation_state();
            if InvocationStateMachine::can_transition(&invocation.state, &target) {
                if let Err(e) = self.transition(invocation, target) {
                    warn!(error = %e, "Could not record failed invocation state");
                }
            } else if !invocation.state.is_terminal() {
                warn!(from = %invocation.state, to = %target, "Failure has no matching invocation state");
            }
        }

        if let Some(name) = &invocation.deployment {
            self.emit(Event::Finished {
                deployment: name.to_string(),
                kind: invocation.kind,
                outcome: invocation.state.as_str().to_string(),
                success: invocation.state == InvocationState::Succeeded,
            });
        }

        result
    }

    fn emit(&self, event: Event) {
        if let Some(ref bus) = self.event_bus {
            bus.emit(event);
        }
    }
}

fn follow_up_label(outcome: &FollowUpOutcome) -> String {
    match outcome {
        FollowUpOutcome::Pending => "Running".to_string(),
        FollowUpOutcome::Resolved(_) => ProvisioningState::Succeeded.to_string(),
        FollowUpOutcome::Failed { status, .. } => format!("Failed ({})", status),
    }
}
