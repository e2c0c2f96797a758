//! Cached resource records
//!
//! A `CachedResource` is one row of a server-owned collection as the client
//! last saw it. Only `id` and `status` are interpreted; everything else the
//! list endpoint returns is kept verbatim in `fields` for display.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Lifecycle status of a resource
///
/// Cluster statuses are known variants. Other collections may carry their own
/// equivalents, which are preserved in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceStatus {
    Provisioning,
    Running,
    Deleting,
    Error,
    Other(String),
}

impl ResourceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceStatus::Provisioning => "PROVISIONING",
            ResourceStatus::Running => "RUNNING",
            ResourceStatus::Deleting => "DELETING",
            ResourceStatus::Error => "ERROR",
            ResourceStatus::Other(s) => s,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ResourceStatus::Running)
    }
}

impl From<String> for ResourceStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "PROVISIONING" => ResourceStatus::Provisioning,
            "RUNNING" => ResourceStatus::Running,
            "DELETING" => ResourceStatus::Deleting,
            "ERROR" => ResourceStatus::Error,
            _ => ResourceStatus::Other(s),
        }
    }
}

impl From<&str> for ResourceStatus {
    fn from(s: &str) -> Self {
        ResourceStatus::from(s.to_string())
    }
}

impl From<ResourceStatus> for String {
    fn from(status: ResourceStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error produced when a list-endpoint record cannot become a cache entry
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no usable id field")]
    MissingId,
}

/// One entry of a cached collection
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResource {
    pub id: String,
    pub status: Option<ResourceStatus>,
    /// Remaining descriptive fields (name, ttl_expires_at, role, ...)
    pub fields: Map<String, Value>,
}

impl CachedResource {
    pub fn new(id: impl Into<String>, status: Option<ResourceStatus>) -> Self {
        Self {
            id: id.into(),
            status,
            fields: Map::new(),
        }
    }

    /// Builder-style helper to attach a descriptive field
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Build a cache entry from a record returned by a list endpoint
    ///
    /// `id` may be a string or a number; a missing `status` is allowed since
    /// teams and some invitation payloads carry none.
    pub fn from_record(record: Value) -> Result<Self, RecordError> {
        let Value::Object(mut fields) = record else {
            return Err(RecordError::NotAnObject);
        };

        let id = match fields.remove("id") {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(RecordError::MissingId),
        };

        let status = match fields.remove("status") {
            Some(Value::String(s)) => Some(ResourceStatus::from(s)),
            _ => None,
        };

        Ok(Self { id, status, fields })
    }

    /// Human-readable name, falling back to the id
    pub fn name(&self) -> &str {
        self.field_str("name")
            .or_else(|| self.field_str("team_name"))
            .unwrap_or(&self.id)
    }

    /// Get a descriptive field as a string slice if it is a JSON string
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    /// Status text for display, `-` when the collection has no status
    pub fn status_label(&self) -> &str {
        self.status.as_ref().map(|s| s.as_str()).unwrap_or("-")
    }
}
