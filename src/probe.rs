//! MetadataProbe struct and detection order.

use tracing::{debug, warn};

use crate::config::ProbeConfig;
use crate::env::{Environment, ProcessEnv};
use crate::metadata::CloudMetadata;
use crate::provider::{CloudProvider, ProviderSelection};
use crate::providers::{app_service, aws, azure, gcp};

/// Main interface for probing cloud instance metadata.
///
/// Every probe returns `None` when its provider is not detected; no error
/// ever reaches the caller.
///
/// # Example
///
/// ```ignore
/// use cloud_probe::{CloudMetadata, MetadataProbe, ProviderSelection};
///
/// #[tokio::main]
/// async fn main() {
///     let probe = MetadataProbe::new();
///     let metadata = probe.detect(ProviderSelection::Auto).await;
///     println!("{}", CloudMetadata::to_value(metadata.as_ref()));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MetadataProbe<E = ProcessEnv> {
    config: ProbeConfig,
    env: E,
}

impl MetadataProbe {
    /// Probe the production endpoints and the process environment.
    pub fn new() -> Self {
        Self::with_config(ProbeConfig::default())
    }

    /// Probe with custom endpoints or timeouts.
    pub fn with_config(config: ProbeConfig) -> Self {
        Self {
            config,
            env: ProcessEnv,
        }
    }
}

impl Default for MetadataProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Environment> MetadataProbe<E> {
    /// Read App Service variables from `env` instead of the process environment.
    pub fn with_env<F: Environment>(self, env: F) -> MetadataProbe<F> {
        MetadataProbe {
            config: self.config,
            env,
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// AWS EC2 metadata (IMDSv2, falling back to IMDSv1).
    pub async fn aws(&self) -> Option<CloudMetadata> {
        aws::probe(&self.config).await
    }

    /// GCP Compute Engine metadata.
    pub async fn gcp(&self) -> Option<CloudMetadata> {
        gcp::probe(&self.config).await
    }

    /// Azure VM metadata, or App Service metadata when the VM metadata
    /// service is not available.
    pub async fn azure(&self) -> Option<CloudMetadata> {
        azure::probe(&self.config, &self.env).await
    }

    /// Azure App Service metadata from environment variables only.
    pub fn azure_app_service(&self) -> Option<CloudMetadata> {
        app_service::probe(&self.env)
    }

    /// Run a single provider's probe.
    pub async fn provider(&self, provider: CloudProvider) -> Option<CloudMetadata> {
        match provider {
            CloudProvider::Aws => self.aws().await,
            CloudProvider::Gcp => self.gcp().await,
            CloudProvider::Azure => self.azure().await,
        }
    }

    /// Detect the hosting provider.
    ///
    /// With [`ProviderSelection::Auto`] the probes run one after another in the
    /// order aws, gcp, azure, and the first detected result wins.
    pub async fn detect(&self, selection: ProviderSelection) -> Option<CloudMetadata> {
        match selection {
            ProviderSelection::Disabled => {
                debug!("cloud metadata detection disabled");
                None
            }
            ProviderSelection::Only(provider) => {
                let metadata = self.provider(provider).await;
                if metadata.is_none() {
                    warn!(%provider, "cloud provider was set explicitly but no metadata was found");
                }
                metadata
            }
            ProviderSelection::Auto => {
                for provider in [CloudProvider::Aws, CloudProvider::Gcp, CloudProvider::Azure] {
                    if let Some(metadata) = self.provider(provider).await {
                        return Some(metadata);
                    }
                }
                debug!("no cloud provider detected");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn test_default_uses_production_config() {
        let probe = MetadataProbe::default();
        assert_eq!(probe.config(), &ProbeConfig::default());
    }

    #[test]
    fn test_with_env_keeps_config() {
        let config = ProbeConfig::default().with_base_url("http://localhost:8080");
        let probe =
            MetadataProbe::with_config(config.clone()).with_env(HashMap::<String, String>::new());
        assert_eq!(probe.config(), &config);
    }

    #[tokio::test]
    async fn test_disabled_detects_nothing() {
        let env = HashMap::from([
            (
                "WEBSITE_OWNER_NAME".to_string(),
                "sub123+rg1-westus2webspace9f8".to_string(),
            ),
            ("WEBSITE_INSTANCE_ID".to_string(), "i".to_string()),
            ("WEBSITE_SITE_NAME".to_string(), "s".to_string()),
            ("WEBSITE_RESOURCE_GROUP".to_string(), "rg".to_string()),
        ]);
        let probe = MetadataProbe::new().with_env(env);
        assert!(probe.detect(ProviderSelection::Disabled).await.is_none());
        assert!(probe.azure_app_service().is_some());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_missed_explicit_provider_warns() {
        let config = ProbeConfig::default().with_azure_base_url("http://127.0.0.1:1");
        let probe = MetadataProbe::with_config(config).with_env(HashMap::<String, String>::new());

        let metadata = probe
            .detect(ProviderSelection::Only(CloudProvider::Azure))
            .await;

        assert!(metadata.is_none());
        assert!(logs_contain("azure metadata service unavailable"));
        assert!(logs_contain("no metadata was found"));
    }
}
