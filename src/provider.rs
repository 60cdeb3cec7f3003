//! Cloud provider enumeration.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ProviderSelectionError;

/// Supported cloud providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    /// Amazon Web Services
    Aws,
    /// Google Cloud Platform
    Gcp,
    /// Microsoft Azure, including App Service
    Azure,
}

impl CloudProvider {
    /// Name used in the `provider` field of the metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws",
            CloudProvider::Gcp => "gcp",
            CloudProvider::Azure => "azure",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which providers detection should try, as configured by the agent's
/// `cloud_provider` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderSelection {
    /// Try aws, gcp and azure in that order.
    #[default]
    Auto,
    /// Only try the given provider.
    Only(CloudProvider),
    /// Detection is disabled.
    Disabled,
}

impl FromStr for ProviderSelection {
    type Err = ProviderSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "true" => Ok(ProviderSelection::Auto),
            "none" | "false" => Ok(ProviderSelection::Disabled),
            "aws" => Ok(ProviderSelection::Only(CloudProvider::Aws)),
            "gcp" => Ok(ProviderSelection::Only(CloudProvider::Gcp)),
            "azure" => Ok(ProviderSelection::Only(CloudProvider::Azure)),
            _ => Err(ProviderSelectionError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_display() {
        assert_eq!(CloudProvider::Aws.to_string(), "aws");
        assert_eq!(CloudProvider::Gcp.to_string(), "gcp");
        assert_eq!(CloudProvider::Azure.to_string(), "azure");
    }

    #[test]
    fn test_provider_serializes_lowercase() {
        let value = serde_json::to_value(CloudProvider::Gcp).unwrap();
        assert_eq!(value, serde_json::json!("gcp"));
    }

    #[test]
    fn test_selection_parse() {
        let parse = |s: &str| s.parse::<ProviderSelection>().unwrap();
        assert_eq!(parse("auto"), ProviderSelection::Auto);
        assert_eq!(parse("True"), ProviderSelection::Auto);
        assert_eq!(parse("none"), ProviderSelection::Disabled);
        assert_eq!(parse("false"), ProviderSelection::Disabled);
        assert_eq!(parse(" AWS "), ProviderSelection::Only(CloudProvider::Aws));
        assert_eq!(parse("azure"), ProviderSelection::Only(CloudProvider::Azure));
    }

    #[test]
    fn test_selection_parse_unknown() {
        let err = "oracle".parse::<ProviderSelection>().unwrap_err();
        assert_eq!(err, ProviderSelectionError("oracle".to_string()));
    }

    #[test]
    fn test_selection_default_is_auto() {
        assert_eq!(ProviderSelection::default(), ProviderSelection::Auto);
    }
}
