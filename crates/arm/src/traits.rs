use armdeploy_core::{Credential, DeploymentRequest, DeploymentResult};
use async_trait::async_trait;

use crate::error::Result;
use crate::types::{FollowUpOutcome, SubmitOutcome};

/// Control-plane operations the orchestrator relies on.
///
/// Implementations hold no per-call state: every method may be called
/// repeatedly and none of them retries or polls.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// `Ok(false)` on 404; any other failure is an error.
    async fn container_exists(&self, credential: &Credential, name: &str) -> Result<bool>;

    /// Succeeds when the container already exists.
    async fn create_container(
        &self,
        credential: &Credential,
        name: &str,
        location: &str,
    ) -> Result<()>;

    async fn submit_deployment(
        &self,
        credential: &Credential,
        deployment: &str,
        request: &DeploymentRequest,
    ) -> Result<SubmitOutcome>;

    async fn submit_what_if(
        &self,
        credential: &Credential,
        deployment: &str,
        request: &DeploymentRequest,
    ) -> Result<SubmitOutcome>;

    async fn get_deployment_status(
        &self,
        credential: &Credential,
        container: &str,
        deployment: &str,
    ) -> Result<DeploymentResult>;

    /// Only network-level failures are errors; non-202/200 statuses come
    /// back as `FollowUpOutcome::Failed`.
    async fn get_follow_up(&self, credential: &Credential, url: &str) -> Result<FollowUpOutcome>;
}
