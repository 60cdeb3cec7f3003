//! Probe configuration: endpoints, timeouts and the AWS IMDSv1 retry policy.

use std::time::Duration;

/// Link-local metadata address used by AWS and Azure.
pub const LINK_LOCAL_BASE_URL: &str = "http://169.254.169.254";

/// GCP metadata server.
pub const GCP_BASE_URL: &str = "http://metadata.google.internal";

/// Timeout for TCP liveness checks.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_millis(100);

/// Timeout for each metadata request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound for a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Settings shared by all probes.
///
/// The defaults are the production endpoints; the `with_*` methods exist
/// mainly to point probes at mock servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub aws_base_url: String,
    pub gcp_base_url: String,
    pub azure_base_url: String,
    pub liveness_timeout: Duration,
    pub request_timeout: Duration,
    pub aws_v1_retry: RetryPolicy,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            aws_base_url: LINK_LOCAL_BASE_URL.to_string(),
            gcp_base_url: GCP_BASE_URL.to_string(),
            azure_base_url: LINK_LOCAL_BASE_URL.to_string(),
            liveness_timeout: LIVENESS_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
            aws_v1_retry: RetryPolicy::default(),
        }
    }
}

impl ProbeConfig {
    /// Point the AWS probe at a custom base URL.
    pub fn with_aws_base_url(mut self, base_url: &str) -> Self {
        self.aws_base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Point the GCP probe at a custom base URL.
    pub fn with_gcp_base_url(mut self, base_url: &str) -> Self {
        self.gcp_base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Point the Azure probe at a custom base URL.
    pub fn with_azure_base_url(mut self, base_url: &str) -> Self {
        self.azure_base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Point every probe at the same base URL.
    pub fn with_base_url(self, base_url: &str) -> Self {
        self.with_aws_base_url(base_url)
            .with_gcp_base_url(base_url)
            .with_azure_base_url(base_url)
    }

    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_aws_v1_retry(mut self, retry: RetryPolicy) -> Self {
        self.aws_v1_retry = retry;
        self
    }
}

/// Bounded retry with exponential backoff, applied to AWS IMDSv1 requests
/// that are answered with HTTP 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub backoff_factor: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_factor: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps between attempts.
    pub fn without_backoff(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_factor: Duration::ZERO,
        }
    }

    /// Sleep before the `retry`-th retry (1-based).
    ///
    /// The first retry happens immediately, later ones wait
    /// `backoff_factor * 2^(retry - 1)`, capped at two minutes.
    pub fn delay(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return Duration::ZERO;
        }
        let exponent = (retry - 1).min(16);
        self.backoff_factor
            .saturating_mul(1 << exponent)
            .min(MAX_BACKOFF)
    }
}
