//! Normalized cloud metadata shared by all providers.

use serde::Serialize;

use crate::provider::CloudProvider;

/// Instance metadata normalized across providers.
///
/// Serializes to the mapping embedded in telemetry reports. Optional parts are
/// left out of the output entirely when absent.
///
/// ```ignore
/// {
///   "provider": "aws",
///   "account": { "id": "123456789012" },
///   "instance": { "id": "i-0abc" },
///   "availability_zone": "us-east-1a",
///   "region": "us-east-1",
///   "machine": { "type": "t3.micro" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudMetadata {
    pub provider: CloudProvider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
    pub instance: Instance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine: Option<Machine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: String,
}

/// GCP fills `id`, Azure fills `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instance {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Machine {
    #[serde(rename = "type")]
    pub machine_type: String,
}

impl CloudMetadata {
    /// Convert a probe result into the report mapping; `None` becomes `{}`.
    pub fn to_value(metadata: Option<&CloudMetadata>) -> serde_json::Value {
        match metadata {
            Some(m) => serde_json::to_value(m)
                .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
            None => serde_json::Value::Object(Default::default()),
        }
    }
}

impl Project {
    pub(crate) fn with_id(id: String) -> Self {
        Self {
            id: Some(id),
            name: None,
        }
    }

    pub(crate) fn with_name(name: String) -> Self {
        Self {
            id: None,
            name: Some(name),
        }
    }
}

impl Machine {
    pub(crate) fn new(machine_type: String) -> Self {
        Self { machine_type }
    }
}
