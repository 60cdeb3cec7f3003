//! AWS instance metadata (IMDSv2 with IMDSv1 fallback).

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::client::{send, send_text, MetadataClient};
use crate::config::{ProbeConfig, RetryPolicy};
use crate::error::ProbeError;
use crate::metadata::{Account, CloudMetadata, Instance, Machine};
use crate::provider::CloudProvider;

/// AWS IMDSv2 token endpoint path.
const TOKEN_PATH: &str = "/latest/api/token";

/// Instance identity document path.
const IDENTITY_DOCUMENT_PATH: &str = "/latest/dynamic/instance-identity/document";

/// IMDSv1 flat metadata paths.
const IAM_INFO_PATH: &str = "/latest/meta-data/iam/info";
const INSTANCE_ID_PATH: &str = "/latest/meta-data/instance-id";
const INSTANCE_TYPE_PATH: &str = "/latest/meta-data/instance-type";
const AVAILABILITY_ZONE_PATH: &str = "/latest/meta-data/placement/availability-zone";

/// Token TTL header name.
const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";

/// Requested token lifetime in seconds.
const TOKEN_TTL_SECONDS: &str = "300";

/// Token header name for requests.
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityDocument {
    account_id: String,
    instance_id: String,
    availability_zone: String,
    instance_type: String,
    region: String,
}

impl From<IdentityDocument> for CloudMetadata {
    fn from(doc: IdentityDocument) -> Self {
        CloudMetadata {
            provider: CloudProvider::Aws,
            account: Some(Account { id: doc.account_id }),
            project: None,
            instance: Instance {
                id: doc.instance_id,
                name: None,
            },
            availability_zone: Some(doc.availability_zone),
            region: doc.region,
            machine: Some(Machine::new(doc.instance_type)),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IamInfo {
    instance_profile_arn: String,
}

/// Which IMDS protocol the probe is currently speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImdsState {
    TokenV2,
    LegacyV1,
}

/// Result of one IMDS state.
enum Step {
    Detected(CloudMetadata),
    AuthRejected,
}

/// Terminal state of the probe.
enum Outcome {
    Detected(ImdsState, CloudMetadata),
    Failed(ImdsState, ProbeError),
}

/// Probe the AWS metadata service.
///
/// Returns `None` when the process does not run on EC2 or the metadata
/// service could not be read.
#[instrument(skip_all, name = "probe_aws")]
pub(crate) async fn probe(config: &ProbeConfig) -> Option<CloudMetadata> {
    match run(config).await {
        Outcome::Detected(state, metadata) => {
            debug!(?state, "aws metadata detected");
            Some(metadata)
        }
        Outcome::Failed(state, err) => {
            debug!(?state, kind = %err.kind(), error = %err, "aws metadata not detected");
            None
        }
    }
}

async fn run(config: &ProbeConfig) -> Outcome {
    let client = match MetadataClient::new(config.request_timeout, &config.aws_base_url) {
        Ok(client) => client,
        Err(e) => return Outcome::Failed(ImdsState::TokenV2, e),
    };
    if let Err(e) = client.check_connectivity(config.liveness_timeout).await {
        return Outcome::Failed(ImdsState::TokenV2, e);
    }

    let mut state = ImdsState::TokenV2;
    loop {
        let step = match state {
            ImdsState::TokenV2 => fetch_identity_document(&client).await,
            ImdsState::LegacyV1 => fetch_flat_fields(&client, &config.aws_v1_retry).await,
        };
        match (state, step) {
            (_, Ok(Step::Detected(metadata))) => return Outcome::Detected(state, metadata),
            (ImdsState::TokenV2, Ok(Step::AuthRejected)) => {
                debug!("identity document rejected with 401, falling back to IMDSv1");
                state = ImdsState::LegacyV1;
            }
            (ImdsState::LegacyV1, Ok(Step::AuthRejected)) => {
                return Outcome::Failed(state, ProbeError::Http(401));
            }
            (_, Err(e)) => return Outcome::Failed(state, e),
        }
    }
}

/// Request a session token. A non-2xx answer or an empty body yields no
/// token; transport failures are errors.
async fn get_token(client: &MetadataClient) -> Result<Option<String>, ProbeError> {
    let request = client
        .put(TOKEN_PATH)
        .header(TOKEN_TTL_HEADER, TOKEN_TTL_SECONDS);

    match send_text(request).await {
        Ok(token) if !token.is_empty() => Ok(Some(token)),
        Ok(_) => Ok(None),
        Err(ProbeError::Http(status)) => {
            debug!(status, "no IMDSv2 token issued");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

async fn fetch_identity_document(client: &MetadataClient) -> Result<Step, ProbeError> {
    let token = get_token(client).await?;

    let mut request = client.get(IDENTITY_DOCUMENT_PATH);
    if let Some(token) = &token {
        request = request.header(TOKEN_HEADER, token);
    }

    match send(request).await {
        Ok(body) => {
            let doc: IdentityDocument = serde_json::from_slice(&body)?;
            Ok(Step::Detected(doc.into()))
        }
        Err(ProbeError::Http(401)) => Ok(Step::AuthRejected),
        Err(e) => Err(e),
    }
}

async fn fetch_flat_fields(
    client: &MetadataClient,
    retry: &RetryPolicy,
) -> Result<Step, ProbeError> {
    match read_flat_fields(client, retry).await {
        Ok(metadata) => Ok(Step::Detected(metadata)),
        Err(ProbeError::Http(401)) => Ok(Step::AuthRejected),
        Err(e) => Err(e),
    }
}

async fn read_flat_fields(
    client: &MetadataClient,
    retry: &RetryPolicy,
) -> Result<CloudMetadata, ProbeError> {
    let iam_info = fetch_with_retry(client, IAM_INFO_PATH, retry).await?;
    let instance_id = fetch_with_retry(client, INSTANCE_ID_PATH, retry).await?;
    let instance_type = fetch_with_retry(client, INSTANCE_TYPE_PATH, retry).await?;
    let availability_zone = fetch_with_retry(client, AVAILABILITY_ZONE_PATH, retry).await?;

    Ok(CloudMetadata {
        provider: CloudProvider::Aws,
        account: Some(Account {
            id: account_id_from_iam_info(&iam_info),
        }),
        project: None,
        instance: Instance {
            id: instance_id,
            name: None,
        },
        region: region_from_zone(&availability_zone).to_string(),
        availability_zone: Some(availability_zone),
        machine: Some(Machine::new(instance_type)),
    })
}

/// GET a flat IMDSv1 value, retrying only while the service answers 401.
async fn fetch_with_retry(
    client: &MetadataClient,
    path: &str,
    retry: &RetryPolicy,
) -> Result<String, ProbeError> {
    let mut attempt = 1;
    loop {
        match send_text(client.get(path)).await {
            Err(ProbeError::Http(401)) if attempt < retry.max_attempts => {
                let delay = retry.delay(attempt);
                debug!(path, attempt, ?delay, "IMDSv1 request rejected, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Account id from the `iam/info` document, or the raw body when it is not
/// the expected JSON.
fn account_id_from_iam_info(body: &str) -> String {
    serde_json::from_str::<IamInfo>(body)
        .ok()
        .and_then(|info| {
            // arn:aws:iam::<account>:instance-profile/<name>
            info.instance_profile_arn
                .split(':')
                .nth(4)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Region is the availability zone without its trailing zone letter.
fn region_from_zone(zone: &str) -> &str {
    match zone.char_indices().last() {
        Some((idx, _)) => &zone[..idx],
        None => zone,
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(TOKEN_PATH, "/latest/api/token");
        assert!(INSTANCE_ID_PATH.starts_with("/latest/meta-data/"));
        assert!(AVAILABILITY_ZONE_PATH.starts_with("/latest/meta-data/"));
    }

    #[test]
    fn test_region_from_zone() {
        assert_eq!(region_from_zone("us-east-1a"), "us-east-1");
        assert_eq!(region_from_zone("eu-west-2c"), "eu-west-2");
        assert_eq!(region_from_zone(""), "");
    }

    #[test]
    fn test_identity_document_mapping() {
        let doc: IdentityDocument = serde_json::from_str(
            r#"{
                "accountId": "123456789012",
                "architecture": "x86_64",
                "availabilityZone": "us-east-1a",
                "imageId": "ami-0abc",
                "instanceId": "i-0123456789abcdef0",
                "instanceType": "t3.micro",
                "region": "us-east-1"
            }"#,
        )
        .unwrap();
        let metadata = CloudMetadata::from(doc);

        assert_eq!(metadata.provider, CloudProvider::Aws);
        assert_eq!(metadata.account.unwrap().id, "123456789012");
        assert_eq!(metadata.instance.id, "i-0123456789abcdef0");
        assert_eq!(metadata.availability_zone.as_deref(), Some("us-east-1a"));
        assert_eq!(metadata.machine.unwrap().machine_type, "t3.micro");
        assert_eq!(metadata.region, "us-east-1");
    }

    #[test]
    fn test_identity_document_missing_field() {
        let result = serde_json::from_str::<IdentityDocument>(r#"{"accountId": "1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_account_id_from_instance_profile_arn() {
        let body = r#"{
            "Code": "Success",
            "InstanceProfileArn": "arn:aws:iam::123456789012:instance-profile/web",
            "InstanceProfileId": "AIPAEXAMPLE"
        }"#;
        assert_eq!(account_id_from_iam_info(body), "123456789012");
    }

    #[test]
    fn test_account_id_falls_back_to_raw_body() {
        assert_eq!(account_id_from_iam_info("123456789012"), "123456789012");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unreachable_is_logged_as_connectivity() {
        let config = ProbeConfig::default().with_aws_base_url("http://127.0.0.1:1");
        assert!(probe(&config).await.is_none());
        assert!(logs_contain("aws metadata not detected"));
        assert!(logs_contain("kind=connectivity"));
    }
}
