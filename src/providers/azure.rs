//! Azure instance metadata, with App Service as fallback.

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::client::{send, MetadataClient};
use crate::config::ProbeConfig;
use crate::env::Environment;
use crate::error::ProbeError;
use crate::metadata::{Account, CloudMetadata, Instance, Machine, Project};
use crate::provider::CloudProvider;
use crate::providers::app_service;

/// Compute metadata path. Pinned to an API version available in every region.
const COMPUTE_PATH: &str = "/metadata/instance/compute?api-version=2019-08-15";

/// Required header for Azure metadata requests.
const METADATA_HEADER: &str = "Metadata";

/// Required header value for Azure metadata requests.
const METADATA_VALUE: &str = "true";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputeMetadata {
    subscription_id: String,
    vm_id: String,
    name: String,
    resource_group_name: String,
    #[serde(default)]
    zone: Option<String>,
    vm_size: String,
    location: String,
}

impl From<ComputeMetadata> for CloudMetadata {
    fn from(compute: ComputeMetadata) -> Self {
        CloudMetadata {
            provider: CloudProvider::Azure,
            account: Some(Account {
                id: compute.subscription_id,
            }),
            project: Some(Project::with_name(compute.resource_group_name)),
            instance: Instance {
                id: compute.vm_id,
                name: Some(compute.name),
            },
            // Unlike the other providers an empty zone is dropped entirely.
            availability_zone: compute.zone.filter(|zone| !zone.is_empty()),
            region: compute.location,
            machine: Some(Machine::new(compute.vm_size)),
        }
    }
}

/// Probe the Azure metadata service, falling back to App Service detection
/// when the service is unreachable or its answer is unusable.
#[instrument(skip_all, name = "probe_azure")]
pub(crate) async fn probe<E: Environment>(config: &ProbeConfig, env: &E) -> Option<CloudMetadata> {
    match fetch(config).await {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            debug!(
                kind = %err.kind(),
                error = %err,
                "azure metadata service unavailable, trying app service"
            );
            app_service::probe(env)
        }
    }
}

async fn fetch(config: &ProbeConfig) -> Result<CloudMetadata, ProbeError> {
    let client = MetadataClient::new(config.request_timeout, &config.azure_base_url)?;
    client.check_connectivity(config.liveness_timeout).await?;

    let body = send(
        client
            .get(COMPUTE_PATH)
            .header(METADATA_HEADER, METADATA_VALUE),
    )
    .await?;

    let compute: ComputeMetadata = serde_json::from_slice(&body)?;
    Ok(compute.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compute(zone: serde_json::Value) -> ComputeMetadata {
        serde_json::from_value(json!({
            "location": "westus2",
            "name": "basepi-test",
            "resourceGroupName": "basepi-testing",
            "subscriptionId": "7657426d-c4c3-44ac-88a2-3b2cd59e6dba",
            "vmId": "e11ebedc-019d-427f-84dd-56cd4388d3a8",
            "vmScaleSetName": "",
            "vmSize": "Standard_D2s_v3",
            "zone": zone
        }))
        .unwrap()
    }

    #[test]
    fn test_normalization() {
        let metadata = CloudMetadata::from(compute(json!("1")));

        assert_eq!(metadata.provider, CloudProvider::Azure);
        assert_eq!(
            metadata.account.unwrap().id,
            "7657426d-c4c3-44ac-88a2-3b2cd59e6dba"
        );
        assert_eq!(metadata.instance.id, "e11ebedc-019d-427f-84dd-56cd4388d3a8");
        assert_eq!(metadata.instance.name.as_deref(), Some("basepi-test"));
        assert_eq!(
            metadata.project.unwrap().name.as_deref(),
            Some("basepi-testing")
        );
        assert_eq!(metadata.availability_zone.as_deref(), Some("1"));
        assert_eq!(metadata.machine.unwrap().machine_type, "Standard_D2s_v3");
        assert_eq!(metadata.region, "westus2");
    }

    #[test]
    fn test_empty_zone_is_dropped() {
        let metadata = CloudMetadata::from(compute(json!("")));
        assert!(metadata.availability_zone.is_none());
    }

    #[test]
    fn test_null_zone_is_dropped() {
        let metadata = CloudMetadata::from(compute(serde_json::Value::Null));
        assert!(metadata.availability_zone.is_none());
    }

    #[test]
    fn test_api_version() {
        assert!(COMPUTE_PATH.ends_with("api-version=2019-08-15"));
    }
}
