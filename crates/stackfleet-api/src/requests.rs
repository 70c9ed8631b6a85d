//! Request types for the registry

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /services`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterServiceRequest {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

fn default_path() -> String {
    "/".to_string()
}

impl RegisterServiceRequest {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            path: default_path(),
            health_check_url: None,
            tags: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}
