use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use uuid::Uuid;

use super::parameters::Parameters;
use super::state::ProvisioningState;
use crate::error::{validate_deployment_prefix, CoreError};

/// ARM caps deployment names at 64 characters.
const MAX_DEPLOYMENT_NAME_LEN: usize = 64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DeploymentMode {
    /// Additive application: resources not in the template are left alone.
    #[default]
    Incremental,
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incremental => "Incremental",
        }
    }
}

/// Compiled, deployable template document. Opaque to everything but the
/// control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template(Value);

impl Template {
    pub fn new(document: Value) -> Self {
        Self(document)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// A deployment (or what-if) request against one resource group.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    container: String,
    template: Template,
    parameters: Parameters,
    mode: DeploymentMode,
}

impl DeploymentRequest {
    pub fn new(container: impl Into<String>, template: Template, parameters: Parameters) -> Self {
        Self {
            container: container.into(),
            template,
            parameters,
            mode: DeploymentMode::Incremental,
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    /// Request body shared by the deployment and whatIf endpoints.
    pub fn to_body(&self) -> Value {
        json!({
            "properties": {
                "template": self.template.as_value(),
                "parameters": self.parameters.to_arm(),
                "mode": self.mode.as_str(),
            }
        })
    }
}

/// Snapshot of a deployment as reported by the status endpoint.
///
/// `outputs` is only ever present on `Succeeded` and `error` only on
/// `Failed`; the constructor drops them for every other state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub state: ProvisioningState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl DeploymentResult {
    pub fn new(state: ProvisioningState, outputs: Option<Value>, error: Option<Value>) -> Self {
        let outputs = match (&state, outputs) {
            (ProvisioningState::Succeeded, Some(Value::Object(raw))) => Some(unwrap_outputs(raw)),
            _ => None,
        };
        let error = match state {
            ProvisioningState::Failed => error.filter(|e| !e.is_null()),
            _ => None,
        };

        Self {
            state,
            outputs,
            error,
        }
    }

    pub fn pending(state: ProvisioningState) -> Self {
        Self::new(state, None, None)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// ARM reports outputs as `{name: {type, value}}`; keep only the values.
fn unwrap_outputs(raw: Map<String, Value>) -> Map<String, Value> {
    raw.into_iter()
        .map(|(name, output)| {
            let value = match output {
                Value::Object(mut envelope) if envelope.contains_key("value") => {
                    envelope.remove("value").unwrap_or(Value::Null)
                }
                other => other,
            };
            (name, value)
        })
        .collect()
}

/// Server-side asynchronous operation to be polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationHandle {
    /// Poll the deployment resource path itself.
    Resource { container: String, deployment: String },
    /// Poll the opaque URL returned in a `Location` header.
    FollowUp { url: String },
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource {
                container,
                deployment,
            } => write!(f, "{}/{}", container, deployment),
            Self::FollowUp { url } => f.write_str(url),
        }
    }
}

/// Deployment name unique to one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentName(String);

impl DeploymentName {
    /// `prefix-YYYYMMDDHHMMSS-xxxxxxxx`, with the prefix cut short so the
    /// whole name fits ARM's limit.
    pub fn generate(prefix: &str) -> Result<Self, CoreError> {
        validate_deployment_prefix(prefix)?;

        let stamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let suffix = Uuid::new_v4().simple().to_string();
        let suffix = &suffix[..8];

        let max_prefix = MAX_DEPLOYMENT_NAME_LEN - (stamp.len() + suffix.len() + 2);
        let prefix: String = prefix.chars().take(max_prefix).collect();

        Ok(Self(format!("{}-{}-{}", prefix, stamp, suffix)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeploymentName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for DeploymentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
