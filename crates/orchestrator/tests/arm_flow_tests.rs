//! End-to-end runs against a mock ARM endpoint, with short poll intervals.

use arm::ArmClient;
use armdeploy_core::{DeploymentRequest, Parameters, Template, ARM_SCOPE};
use identity::{CredentialCache, StaticTokenCredential};
use orchestrator::{Deployer, DeployerConfig, OrchestratorError, PollPolicy};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SUB: &str = "00000000-0000-0000-0000-000000000001";
const DEPLOYMENTS: &str =
    r"^/subscriptions/[0-9-]+/resourcegroups/rg-e2e/providers/Microsoft\.Resources/deployments/deployment-\d{14}-[0-9a-f]{8}$";
const WHAT_IF: &str =
    r"^/subscriptions/[0-9-]+/resourcegroups/rg-e2e/providers/Microsoft\.Resources/deployments/validation-\d{14}-[0-9a-f]{8}/whatIf$";

fn rg_path() -> String {
    format!("/subscriptions/{}/resourcegroups/rg-e2e", SUB)
}

fn fast_policy() -> PollPolicy {
    PollPolicy::new(Duration::from_secs(5), Duration::from_millis(20))
}

fn deployer_for(server: &MockServer) -> Deployer {
    let client = ArmClient::new(SUB).with_endpoint(server.uri());
    let credentials = CredentialCache::new(Arc::new(StaticTokenCredential::new("e2e-token")), ARM_SCOPE);
    let config = DeployerConfig::default()
        .with_deployment_policy(fast_policy())
        .with_what_if_policy(fast_policy());
    Deployer::new(Arc::new(client), credentials, config)
}

fn request() -> DeploymentRequest {
    let mut parameters = Parameters::new();
    parameters.insert("retentionInDays", json!(90));
    DeploymentRequest::new(
        "rg-e2e",
        Template::new(json!({"resources": [], "outputs": {}})),
        parameters,
    )
}

fn status(state: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "name": "deployment",
        "properties": {"provisioningState": state}
    }))
}

async fn mount_missing_container(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(rg_path()))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path(rg_path()))
        .and(body_partial_json(json!({"location": "westeurope"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"name": "rg-e2e"})))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_deploy_creates_container_and_returns_outputs() {
    let server = MockServer::start().await;
    mount_missing_container(&server).await;

    Mock::given(method("PUT"))
        .and(path_regex(DEPLOYMENTS))
        .and(header("Authorization", "Bearer e2e-token"))
        .and(body_partial_json(json!({
            "properties": {
                "mode": "Incremental",
                "parameters": {"retentionInDays": {"value": 90}}
            }
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(DEPLOYMENTS))
        .respond_with(status("Accepted"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(DEPLOYMENTS))
        .respond_with(status("Running"))
        .up_to_n_times(1)
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(DEPLOYMENTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {
                "provisioningState": "Succeeded",
                "outputs": {"workspaceName": {"type": "String", "value": "law-e2e"}}
            }
        })))
        .with_priority(3)
        .mount(&server)
        .await;

    let outcome = deployer_for(&server)
        .deploy(&request(), "westeurope")
        .await
        .unwrap();

    assert_eq!(outcome.outputs().unwrap()["workspaceName"], json!("law-e2e"));
}

#[tokio::test]
async fn test_what_if_polls_location_and_never_deploys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(rg_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "rg-e2e"})))
        .mount(&server)
        .await;

    let operation = format!("{}/operations/what-if-1", server.uri());
    Mock::given(method("POST"))
        .and(path_regex(WHAT_IF))
        .respond_with(ResponseTemplate::new(202).insert_header("Location", operation.as_str()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/what-if-1"))
        .respond_with(ResponseTemplate::new(202))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/what-if-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Succeeded",
            "properties": {
                "changes": [
                    {"resourceId": "/subscriptions/x/workspaces/law", "changeType": "Modify"}
                ]
            }
        })))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path_regex(DEPLOYMENTS))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let preview = deployer_for(&server)
        .what_if(&request(), "eastus")
        .await
        .unwrap();

    assert_eq!(preview.change_summary().get("Modify"), Some(&1));
}

#[tokio::test]
async fn test_forbidden_submission_never_polls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(rg_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "rg-e2e"})))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path_regex(DEPLOYMENTS))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": "AuthorizationFailed", "message": "no access"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(DEPLOYMENTS))
        .respond_with(status("Running"))
        .expect(0)
        .mount(&server)
        .await;

    let err = deployer_for(&server)
        .deploy(&request(), "eastus")
        .await
        .unwrap_err();

    match &err {
        OrchestratorError::Submission { source, .. } => {
            assert_eq!(source.as_ref().and_then(|e| e.status()), Some(403));
        }
        other => panic!("expected submission error, got {:?}", other),
    }
    assert_eq!(err.remote_detail().unwrap()["code"], json!("AuthorizationFailed"));
}

#[tokio::test]
async fn test_malformed_status_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(rg_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "rg-e2e"})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(DEPLOYMENTS))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(DEPLOYMENTS))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = deployer_for(&server)
        .deploy(&request(), "eastus")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "transport");
}
