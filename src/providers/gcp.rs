//! GCP metadata implementation.

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::client::{send, MetadataClient};
use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::metadata::{CloudMetadata, Instance, Machine, Project};
use crate::provider::CloudProvider;

/// Recursive metadata document path.
const RECURSIVE_PATH: &str = "/computeMetadata/v1/?recursive=true";

/// Required header for GCP metadata requests.
const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";

/// Required header value for GCP metadata requests.
const METADATA_FLAVOR_VALUE: &str = "Google";

#[derive(Deserialize)]
struct GcpMetadata {
    instance: GcpInstance,
    project: GcpProject,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcpInstance {
    id: serde_json::Value,
    name: String,
    /// `projects/<number>/zones/<zone>`
    zone: String,
    /// `projects/<number>/machineTypes/<type>`
    machine_type: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcpProject {
    project_id: String,
}

impl From<GcpMetadata> for CloudMetadata {
    fn from(metadata: GcpMetadata) -> Self {
        let zone = last_segment(&metadata.instance.zone).to_string();
        let region = match zone.rsplit_once('-') {
            Some((region, _)) => region.to_string(),
            None => zone.clone(),
        };

        CloudMetadata {
            provider: CloudProvider::Gcp,
            account: None,
            project: Some(Project::with_id(metadata.project.project_id)),
            instance: Instance {
                id: stringify_id(&metadata.instance.id),
                name: Some(metadata.instance.name),
            },
            availability_zone: Some(zone),
            region,
            machine: Some(Machine::new(
                last_segment(&metadata.instance.machine_type).to_string(),
            )),
        }
    }
}

/// Probe the GCP metadata server.
#[instrument(skip_all, name = "probe_gcp")]
pub(crate) async fn probe(config: &ProbeConfig) -> Option<CloudMetadata> {
    match fetch(config).await {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            debug!(kind = %err.kind(), error = %err, "gcp metadata not detected");
            None
        }
    }
}

async fn fetch(config: &ProbeConfig) -> Result<CloudMetadata, ProbeError> {
    let client = MetadataClient::new(config.request_timeout, &config.gcp_base_url)?;
    // Resolving first keeps the miss quiet when the hostname does not exist.
    client.resolve(config.request_timeout).await?;

    let body = send(
        client
            .get(RECURSIVE_PATH)
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE),
    )
    .await?;

    let metadata: GcpMetadata = serde_json::from_slice(&body)?;
    Ok(metadata.into())
}

/// Instance ids are served as JSON numbers that may not fit an `i64`.
fn stringify_id(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
