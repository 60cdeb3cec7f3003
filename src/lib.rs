//! Detect which cloud provider hosts the current process and normalize its
//! instance metadata for telemetry reports.
//!
//! # Features
//!
//! - AWS EC2 via IMDSv2, falling back to IMDSv1 when the token is rejected
//! - GCP Compute Engine via the recursive metadata document
//! - Azure VMs via the instance metadata service, with Azure App Service
//!   detected from environment variables as fallback
//! - One normalized [`CloudMetadata`] shape for all providers
//!
//! Probes never fail: a provider that is not present, not reachable or
//! answers with something unexpected yields `None`.
//!
//! # Example
//!
//! ```ignore
//! use cloud_probe::{CloudMetadata, MetadataProbe, ProviderSelection};
//!
//! #[tokio::main]
//! async fn main() {
//!     let probe = MetadataProbe::new();
//!
//!     // Try aws, gcp and azure in turn
//!     let metadata = probe.detect(ProviderSelection::Auto).await;
//!
//!     // Or ask a single provider
//!     let aws = probe.aws().await;
//!
//!     println!("{}", CloudMetadata::to_value(metadata.as_ref()));
//! }
//! ```
//!
//! # Normalized fields
//!
//! | Field | AWS | GCP | Azure | App Service |
//! |-------|-----|-----|-------|-------------|
//! | `account.id` | yes | | yes | yes |
//! | `project.id` | | yes | | |
//! | `project.name` | | | yes | yes |
//! | `instance.id` | yes | yes | yes | yes |
//! | `instance.name` | | yes | yes | yes |
//! | `availability_zone` | yes | yes | when not empty | |
//! | `region` | yes | yes | yes | yes |
//! | `machine.type` | yes | yes | yes | |

mod client;
mod config;
mod env;
mod error;
mod metadata;
mod probe;
mod provider;
mod providers;

pub use config::{ProbeConfig, RetryPolicy};
pub use env::{Environment, ProcessEnv};
pub use error::{OwnerNameError, ProviderSelectionError};
pub use metadata::{Account, CloudMetadata, Instance, Machine, Project};
pub use probe::MetadataProbe;
pub use provider::{CloudProvider, ProviderSelection};
pub use providers::app_service::OwnerName;
