//! Operation semantics shared by every step of the pipeline.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of change applied to all three services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Create,
    Update,
    Delete,
}

impl Method {
    /// HTTP verb used against the CRUD services.
    pub fn http_verb(&self) -> &'static str {
        match self {
            Method::Create => "POST",
            Method::Update => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Update and delete address a resource that must already exist.
    pub fn requires_resource_id(&self) -> bool {
        matches!(self, Method::Update | Method::Delete)
    }

    /// Only creations are undone when a later step fails.
    pub fn needs_compensation(&self) -> bool {
        matches!(self, Method::Create)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Create => "create",
            Method::Update => "update",
            Method::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names neither an operation nor its HTTP verb.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported method: {0}")]
pub struct ParseMethodError(pub String);

impl FromStr for Method {
    type Err = ParseMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" | "post" => Ok(Method::Create),
            "update" | "put" => Ok(Method::Update),
            "delete" => Ok(Method::Delete),
            _ => Err(ParseMethodError(s.to_string())),
        }
    }
}
