//! reqwest-backed API client

use super::{ApiError, ClusterApi, Endpoints, ExecOutput, error_detail};
use crate::models::{AuthToken, CachedResource, CollectionKey};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// HTTP client for the list and exec endpoints
pub struct ApiClient {
    client: reqwest::Client,
    endpoints: Endpoints,
    token: RwLock<Option<AuthToken>>,
}

impl ApiClient {
    pub fn new(
        endpoints: Endpoints,
        timeout: Duration,
        token: Option<AuthToken>,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Unavailable(format!("failed to create HTTP client: {}", e)))?;

        tracing::debug!("Created API client for: {}", endpoints.api_base());

        Ok(Self {
            client,
            endpoints,
            token: RwLock::new(token),
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(token) => req.bearer_auth(token.expose()),
            None => req,
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let detail = error_detail(&body);
        if status == reqwest::StatusCode::UNAUTHORIZED {
            Err(ApiError::Unauthorized(detail))
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
                detail,
            })
        }
    }
}

#[async_trait]
impl ClusterApi for ApiClient {
    async fn list(&self, collection: CollectionKey) -> Result<Vec<CachedResource>, ApiError> {
        let url = self.endpoints.http(collection.list_path())?;
        tracing::debug!("Fetching {} from: {}", collection, url);

        let resp = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        let resp = Self::check(resp).await?;
        let data: Value = resp.json().await.map_err(ApiError::from_reqwest)?;

        let Value::Array(records) = data else {
            return Err(ApiError::Decode(format!(
                "expected a JSON array from {}",
                collection.list_path()
            )));
        };

        let mut resources = Vec::with_capacity(records.len());
        for record in records {
            match CachedResource::from_record(record) {
                Ok(resource) => resources.push(resource),
                Err(e) => tracing::warn!("Skipping {} record: {}", collection, e),
            }
        }
        tracing::debug!("Fetched {} {}", resources.len(), collection);
        Ok(resources)
    }

    async fn exec(&self, cluster_id: &str, command: &str) -> Result<ExecOutput, ApiError> {
        let url = self
            .endpoints
            .http_with("/clusters", &[cluster_id, "exec"])?;
        tracing::debug!("Executing command on cluster {}", cluster_id);

        let resp = self
            .authorize(self.client.post(url))
            .json(&json!({ "command": command }))
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        let resp = Self::check(resp).await?;
        resp.json().await.map_err(ApiError::from_reqwest)
    }

    fn clear_credentials(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
