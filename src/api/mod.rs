//! HTTP collaborator
//!
//! The request/response side of the server: list endpoints that seed the
//! cache and the stateless command execution fallback. The live channel
//! itself lives in [`crate::transport`].

mod client;
mod endpoints;

pub use client::ApiClient;
pub use endpoints::Endpoints;

use crate::models::{CachedResource, CollectionKey};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

/// Errors returned by the HTTP collaborator
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("could not communicate with the API: {0}")]
    Unavailable(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("API returned status {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    /// The command ran and reported an error; carries the rendered output
    #[error("{0}")]
    CommandFailed(String),
}

impl ApiError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Unavailable(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

/// Human-readable message from an error response body
///
/// Prefers the `detail` field (rendered as JSON when it is not a string),
/// then the raw body.
pub fn error_detail(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        match map.get("detail") {
            Some(Value::String(s)) => return s.clone(),
            Some(other) if !other.is_null() => return other.to_string(),
            _ => {}
        }
    }
    let body = body.trim();
    if body.is_empty() {
        "no response body".to_string()
    } else {
        body.to_string()
    }
}

/// Result of a stateless command execution
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExecOutput {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExecOutput {
    pub fn is_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Output followed by the error text, both verbatim
    pub fn render(&self) -> String {
        let mut rendered = self.output.clone().unwrap_or_default();
        if let Some(error) = self.error.as_deref().filter(|e| !e.is_empty()) {
            if !rendered.is_empty() && !rendered.ends_with('\n') {
                rendered.push('\n');
            }
            rendered.push_str(error);
        }
        rendered
    }

    /// Rendered output, or [`ApiError::CommandFailed`] when the command
    /// reported an error
    pub fn into_result(self) -> Result<String, ApiError> {
        let rendered = self.render();
        if self.is_error() {
            Err(ApiError::CommandFailed(rendered))
        } else {
            Ok(rendered)
        }
    }
}

/// Request/response operations used by the session layer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetch a collection in server order
    async fn list(&self, collection: CollectionKey) -> Result<Vec<CachedResource>, ApiError>;

    /// Run one command on a cluster; no streaming
    async fn exec(&self, cluster_id: &str, command: &str) -> Result<ExecOutput, ApiError>;

    /// Drop any credentials held for later requests
    fn clear_credentials(&self);
}
