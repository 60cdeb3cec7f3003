//! Azure App Service detection from platform-injected environment variables.

use tracing::{debug, instrument};

use crate::env::Environment;
use crate::error::{OwnerNameError, ProbeError};
use crate::metadata::{Account, CloudMetadata, Instance, Project};
use crate::provider::CloudProvider;

const WEBSITE_OWNER_NAME: &str = "WEBSITE_OWNER_NAME";
const WEBSITE_INSTANCE_ID: &str = "WEBSITE_INSTANCE_ID";
const WEBSITE_SITE_NAME: &str = "WEBSITE_SITE_NAME";
const WEBSITE_RESOURCE_GROUP: &str = "WEBSITE_RESOURCE_GROUP";

const WEBSPACE_TOKEN: &str = "webspace";

/// Parsed `WEBSITE_OWNER_NAME`, of the form
/// `{subscription id}+{resource group}-{region}webspace{suffix}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerName {
    pub subscription_id: String,
    pub region: String,
}

impl OwnerName {
    pub fn parse(value: &str) -> Result<Self, OwnerNameError> {
        let (subscription_id, rest) = value.split_once('+').ok_or(OwnerNameError::MissingPlus)?;
        let (prefix, _suffix) = rest
            .split_once(WEBSPACE_TOKEN)
            .ok_or(OwnerNameError::MissingWebspace)?;
        let (_resource_group, region) = prefix
            .rsplit_once('-')
            .ok_or(OwnerNameError::MissingRegionDelimiter)?;
        if region.is_empty() {
            return Err(OwnerNameError::EmptyRegion);
        }

        Ok(Self {
            subscription_id: subscription_id.to_string(),
            region: region.to_string(),
        })
    }
}

/// Detect an Azure App Service host from its environment.
#[instrument(skip_all, name = "probe_azure_app_service")]
pub(crate) fn probe<E: Environment>(env: &E) -> Option<CloudMetadata> {
    match detect(env) {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            debug!(kind = %err.kind(), error = %err, "azure app service not detected");
            None
        }
    }
}

fn detect<E: Environment>(env: &E) -> Result<CloudMetadata, ProbeError> {
    let owner_name = required(env, WEBSITE_OWNER_NAME)?;
    let instance_id = required(env, WEBSITE_INSTANCE_ID)?;
    let site_name = required(env, WEBSITE_SITE_NAME)?;
    let resource_group = required(env, WEBSITE_RESOURCE_GROUP)?;

    let owner = OwnerName::parse(&owner_name)?;

    Ok(CloudMetadata {
        provider: CloudProvider::Azure,
        account: Some(Account {
            id: owner.subscription_id,
        }),
        project: Some(Project::with_name(resource_group)),
        instance: Instance {
            id: instance_id,
            name: Some(site_name),
        },
        availability_zone: None,
        region: owner.region,
        machine: None,
    })
}

fn required<E: Environment>(env: &E, key: &'static str) -> Result<String, ProbeError> {
    env.var(key)
        .filter(|value| !value.is_empty())
        .ok_or(ProbeError::MissingVariable(key))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(owner_name: &str) -> HashMap<String, String> {
        HashMap::from([
            (WEBSITE_OWNER_NAME.to_string(), owner_name.to_string()),
            (WEBSITE_INSTANCE_ID.to_string(), "instance-1".to_string()),
            (WEBSITE_SITE_NAME.to_string(), "my-site".to_string()),
            (WEBSITE_RESOURCE_GROUP.to_string(), "my-rg".to_string()),
        ])
    }

    #[test]
    fn test_parse_owner_name() {
        let owner = OwnerName::parse("sub123+rg1-westus2webspace9f8").unwrap();
        assert_eq!(owner.subscription_id, "sub123");
        assert_eq!(owner.region, "westus2");
    }

    #[test]
    fn test_parse_owner_name_region_after_last_dash() {
        let owner =
            OwnerName::parse("f5940f10-2e30-3e4d-a259-63451ba6dae4+elastic-apm-AustraliaEastwebspace")
                .unwrap();
        assert_eq!(owner.subscription_id, "f5940f10-2e30-3e4d-a259-63451ba6dae4");
        assert_eq!(owner.region, "AustraliaEast");
    }

    #[test]
    fn test_parse_owner_name_rejections() {
        assert_eq!(
            OwnerName::parse("sub123rg1-westus2webspace"),
            Err(OwnerNameError::MissingPlus)
        );
        assert_eq!(
            OwnerName::parse("sub123+rg1-westus2"),
            Err(OwnerNameError::MissingWebspace)
        );
        assert_eq!(
            OwnerName::parse("sub123+westus2webspace"),
            Err(OwnerNameError::MissingRegionDelimiter)
        );
        assert_eq!(
            OwnerName::parse("sub123+rg1-webspace"),
            Err(OwnerNameError::EmptyRegion)
        );
    }

    #[test]
    fn test_probe_maps_environment() {
        let metadata = probe(&env("sub123+rg1-westus2webspace9f8")).unwrap();

        assert_eq!(metadata.provider, CloudProvider::Azure);
        assert_eq!(metadata.account.unwrap().id, "sub123");
        assert_eq!(metadata.region, "westus2");
        assert_eq!(metadata.instance.id, "instance-1");
        assert_eq!(metadata.instance.name.as_deref(), Some("my-site"));
        assert_eq!(metadata.project.unwrap().name.as_deref(), Some("my-rg"));
        assert!(metadata.machine.is_none());
        assert!(metadata.availability_zone.is_none());
    }

    #[test]
    fn test_probe_malformed_owner_name() {
        assert!(probe(&env("sub123-westus2webspace")).is_none());
        assert!(probe(&env("sub123+rg1-westus2")).is_none());
    }

    #[test]
    fn test_probe_missing_variable() {
        for key in [
            WEBSITE_OWNER_NAME,
            WEBSITE_INSTANCE_ID,
            WEBSITE_SITE_NAME,
            WEBSITE_RESOURCE_GROUP,
        ] {
            let mut vars = env("sub123+rg1-westus2webspace9f8");
            vars.remove(key);
            assert!(probe(&vars).is_none(), "{key} missing");
        }
    }

    #[test]
    fn test_probe_empty_variable() {
        let mut vars = env("sub123+rg1-westus2webspace9f8");
        vars.insert(WEBSITE_SITE_NAME.to_string(), String::new());
        assert!(matches!(
            detect(&vars),
            Err(ProbeError::MissingVariable(WEBSITE_SITE_NAME))
        ));
    }

    #[test]
    fn test_probe_empty_environment() {
        assert!(probe(&HashMap::<String, String>::new()).is_none());
    }
}
