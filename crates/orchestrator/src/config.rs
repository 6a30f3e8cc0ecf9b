use crate::poller::PollPolicy;

pub const DEFAULT_DEPLOYMENT_PREFIX: &str = "deployment";
/// What-if runs never create a deployment, so they get their own prefix.
pub const VALIDATION_PREFIX: &str = "validation";

#[derive(Debug, Clone)]
pub struct DeployerConfig {
    pub deployment_policy: PollPolicy,
    pub what_if_policy: PollPolicy,
    pub deployment_prefix: String,
    pub validation_prefix: String,
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            deployment_policy: PollPolicy::deployment(),
            what_if_policy: PollPolicy::follow_up(),
            deployment_prefix: DEFAULT_DEPLOYMENT_PREFIX.to_string(),
            validation_prefix: VALIDATION_PREFIX.to_string(),
        }
    }
}

impl DeployerConfig {
    pub fn new(deployment_prefix: impl Into<String>) -> Self {
        Self {
            deployment_prefix: deployment_prefix.into(),
            ..Default::default()
        }
    }

    pub fn with_deployment_policy(mut self, policy: PollPolicy) -> Self {
        self.deployment_policy = policy;
        self
    }

    pub fn with_what_if_policy(mut self, policy: PollPolicy) -> Self {
        self.what_if_policy = policy;
        self
    }
}
