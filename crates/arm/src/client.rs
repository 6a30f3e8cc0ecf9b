use armdeploy_core::{Credential, DeploymentRequest, DeploymentResult};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, LOCATION};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use crate::error::{ArmError, Result};
use crate::traits::ResourceApi;
use crate::types::{
    DeploymentResource, FollowUpOutcome, ResourceGroupBody, SubmitOutcome, Subscription,
};

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_API_VERSION: &str = "2021-04-01";

/// Azure Resource Manager REST client scoped to one subscription.
#[derive(Clone)]
pub struct ArmClient {
    endpoint: String,
    api_version: String,
    subscription_id: String,
    client: Client,
}

impl ArmClient {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self::with_client(subscription_id, Client::new())
    }

    pub fn with_client(subscription_id: impl Into<String>, client: Client) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            subscription_id: subscription_id.into(),
            client,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn subscription_path(&self) -> String {
        format!("{}/subscriptions/{}", self.endpoint, self.subscription_id)
    }

    fn container_url(&self, name: &str) -> String {
        format!(
            "{}/resourcegroups/{}?api-version={}",
            self.subscription_path(),
            name,
            self.api_version
        )
    }

    fn deployment_path(&self, container: &str, deployment: &str) -> String {
        format!(
            "{}/resourcegroups/{}/providers/Microsoft.Resources/deployments/{}",
            self.subscription_path(),
            container,
            deployment
        )
    }

    fn deployment_url(&self, container: &str, deployment: &str) -> String {
        format!(
            "{}?api-version={}",
            self.deployment_path(container, deployment),
            self.api_version
        )
    }

    fn what_if_url(&self, container: &str, deployment: &str) -> String {
        format!(
            "{}/whatIf?api-version={}",
            self.deployment_path(container, deployment),
            self.api_version
        )
    }

    fn authorized(&self, builder: RequestBuilder, credential: &Credential) -> RequestBuilder {
        builder.header(AUTHORIZATION, credential.bearer())
    }

    pub async fn get_subscription(&self, credential: &Credential) -> Result<Subscription> {
        let url = format!("{}?api-version={}", self.subscription_path(), self.api_version);
        let response = self
            .authorized(self.client.get(&url), credential)
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn submit(&self, builder: RequestBuilder, request: &DeploymentRequest) -> Result<SubmitOutcome> {
        let response = builder.json(&request.to_body()).send().await?;
        let status = response.status();

        if status == StatusCode::ACCEPTED {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            debug!(location = ?location, "Submission accepted, operation pending");
            return Ok(SubmitOutcome::Pending { location });
        }

        if !status.is_success() {
            return Err(Self::status_error(response).await);
        }

        debug!(status = %status, "Submission resolved inline");
        Ok(SubmitOutcome::Resolved(Self::json_or_null(response).await?))
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn status_error(response: reqwest::Response) -> ArmError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ArmError::Status { status, body }
    }

    async fn json_or_null(response: reqwest::Response) -> Result<Value> {
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ResourceApi for ArmClient {
    async fn container_exists(&self, credential: &Credential, name: &str) -> Result<bool> {
        let response = self
            .authorized(self.client.get(self.container_url(name)), credential)
            .send()
            .await?;
        let status = response.status();

        debug!(container = %name, status = %status, "Checked resource group");

        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(Self::status_error(response).await);
        }
        Ok(true)
    }

    async fn create_container(
        &self,
        credential: &Credential,
        name: &str,
        location: &str,
    ) -> Result<()> {
        let body = ResourceGroupBody {
            location: location.to_string(),
        };
        let response = self
            .authorized(self.client.put(self.container_url(name)), credential)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        debug!(container = %name, location = %location, "Resource group created or updated");
        Ok(())
    }

    async fn submit_deployment(
        &self,
        credential: &Credential,
        deployment: &str,
        request: &DeploymentRequest,
    ) -> Result<SubmitOutcome> {
        let url = self.deployment_url(request.container(), deployment);
        debug!(container = %request.container(), deployment = %deployment, "Submitting deployment");
        self.submit(self.authorized(self.client.put(url), credential), request)
            .await
    }

    async fn submit_what_if(
        &self,
        credential: &Credential,
        deployment: &str,
        request: &DeploymentRequest,
    ) -> Result<SubmitOutcome> {
        let url = self.what_if_url(request.container(), deployment);
        debug!(container = %request.container(), deployment = %deployment, "Submitting what-if");
        self.submit(self.authorized(self.client.post(url), credential), request)
            .await
    }

    async fn get_deployment_status(
        &self,
        credential: &Credential,
        container: &str,
        deployment: &str,
    ) -> Result<DeploymentResult> {
        let response = self
            .authorized(
                self.client.get(self.deployment_url(container, deployment)),
                credential,
            )
            .send()
            .await?;

        let resource: DeploymentResource = self.handle_response(response).await?;
        Ok(resource.into())
    }

    async fn get_follow_up(&self, credential: &Credential, url: &str) -> Result<FollowUpOutcome> {
        let url = Url::parse(url).map_err(|e| ArmError::InvalidUrl(format!("{}: {}", url, e)))?;
        let response = self
            .authorized(self.client.get(url), credential)
            .send()
            .await?;
        let status = response.status();

        debug!(status = %status, "Polled follow-up URL");

        match status {
            StatusCode::ACCEPTED => Ok(FollowUpOutcome::Pending),
            StatusCode::OK => Ok(FollowUpOutcome::Resolved(
                Self::json_or_null(response).await?,
            )),
            other => {
                let body = response.text().await.unwrap_or_default();
                let error = serde_json::from_str::<Value>(&body)
                    .ok()
                    .or_else(|| (!body.is_empty()).then(|| Value::String(body)));
                Ok(FollowUpOutcome::Failed {
                    status: other.as_u16(),
                    error,
                })
            }
        }
    }
}
