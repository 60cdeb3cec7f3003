//! Error types for cloud metadata probes.
//!
//! None of these reach the caller of a probe: every failure collapses to
//! "not detected". They exist so the reason can be logged.

use std::fmt;

use thiserror::Error;

/// Reasons a single probe step can fail.
#[derive(Debug, Error)]
pub(crate) enum ProbeError {
    /// TCP liveness check was refused or reset.
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    /// Hostname could not be resolved.
    #[error("resolve failed: {0}")]
    Resolve(#[source] std::io::Error),

    /// Liveness check or resolution did not finish in time.
    #[error("timed out")]
    Timeout,

    /// Base URL could not be parsed into host and port.
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),

    /// HTTP error with status code.
    #[error("http {0}")]
    Http(u16),

    /// HTTP request error.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Response was not valid UTF-8.
    #[error("invalid utf-8")]
    Utf8,

    /// JSON deserialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// A required environment variable is unset or empty.
    #[error("environment variable {0} is not set")]
    MissingVariable(&'static str),

    /// WEBSITE_OWNER_NAME did not have the expected shape.
    #[error("malformed owner name: {0}")]
    OwnerName(#[from] OwnerNameError),
}

impl ProbeError {
    pub(crate) fn kind(&self) -> FailureKind {
        match self {
            ProbeError::Connect(_)
            | ProbeError::Resolve(_)
            | ProbeError::Timeout
            | ProbeError::InvalidBaseUrl(_)
            | ProbeError::Request(_) => FailureKind::Connectivity,
            ProbeError::Http(_) => FailureKind::HttpStatus,
            ProbeError::Utf8 | ProbeError::Json(_) => FailureKind::Parse,
            ProbeError::MissingVariable(_) | ProbeError::OwnerName(_) => {
                FailureKind::MalformedInput
            }
        }
    }
}

/// Category of a probe failure, used as a log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureKind {
    Connectivity,
    HttpStatus,
    Parse,
    MalformedInput,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Connectivity => "connectivity",
            FailureKind::HttpStatus => "http_status",
            FailureKind::Parse => "parse",
            FailureKind::MalformedInput => "malformed_input",
        };
        f.write_str(name)
    }
}

/// Rejection reasons for an Azure App Service `WEBSITE_OWNER_NAME` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OwnerNameError {
    /// No `+` between subscription id and the rest.
    #[error("missing '+' delimiter")]
    MissingPlus,

    /// No `webspace` token after the resource group and region.
    #[error("missing 'webspace' token")]
    MissingWebspace,

    /// No `-` in front of the region.
    #[error("missing '-' before region")]
    MissingRegionDelimiter,

    /// The region part is empty.
    #[error("empty region")]
    EmptyRegion,
}

/// Error returned when a cloud provider setting cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown cloud provider setting: {0} (expected auto, aws, gcp, azure, or none)")]
pub struct ProviderSelectionError(pub String);
