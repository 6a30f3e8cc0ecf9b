use armdeploy_core::{DeploymentResult, ProvisioningState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of submitting a deployment or what-if request.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// 202: the operation continues server-side. `location` is the follow-up
    /// URL from the `Location` header, when one was sent.
    Pending { location: Option<String> },
    /// Any other 2xx: the body returned inline (`null` when empty).
    Resolved(Value),
}

impl SubmitOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// One poll of a follow-up URL.
#[derive(Debug, Clone, PartialEq)]
pub enum FollowUpOutcome {
    /// 202: still running.
    Pending,
    /// 200: finished, with the operation's payload.
    Resolved(Value),
    /// Any other status: the operation failed.
    Failed { status: u16, error: Option<Value> },
}

impl FollowUpOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscription_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceGroupBody {
    pub location: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DeploymentResource {
    pub properties: DeploymentProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeploymentProperties {
    pub provisioning_state: ProvisioningState,
    #[serde(default)]
    pub outputs: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl From<DeploymentResource> for DeploymentResult {
    fn from(resource: DeploymentResource) -> Self {
        let props = resource.properties;
        DeploymentResult::new(props.provisioning_state, props.outputs, props.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_succeeded_deployment() {
        let body = json!({
            "id": "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Resources/deployments/dep",
            "name": "dep",
            "properties": {
                "provisioningState": "Succeeded",
                "outputs": {"workspaceId": {"type": "String", "value": "ws-1"}}
            }
        });

        let resource: DeploymentResource = serde_json::from_value(body).unwrap();
        let result = DeploymentResult::from(resource);

        assert_eq!(result.state, ProvisioningState::Succeeded);
        assert_eq!(result.outputs.unwrap()["workspaceId"], "ws-1");
    }

    #[test]
    fn test_parse_failed_deployment() {
        let body = json!({
            "properties": {
                "provisioningState": "Failed",
                "error": {"code": "DeploymentFailed", "message": "boom"}
            }
        });

        let resource: DeploymentResource = serde_json::from_value(body).unwrap();
        let result = DeploymentResult::from(resource);

        assert_eq!(result.state, ProvisioningState::Failed);
        assert_eq!(result.error.unwrap()["code"], "DeploymentFailed");
        assert!(result.outputs.is_none());
    }

    #[test]
    fn test_follow_up_terminal() {
        assert!(!FollowUpOutcome::Pending.is_terminal());
        assert!(FollowUpOutcome::Resolved(json!({})).is_terminal());
        assert!(FollowUpOutcome::Failed {
            status: 400,
            error: None
        }
        .is_terminal());
    }
}
