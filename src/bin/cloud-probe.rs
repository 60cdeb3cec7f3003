//! CLI binary for cloud-probe crate.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use cloud_probe::{CloudMetadata, CloudProvider, MetadataProbe, ProviderSelection};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cloud-probe")]
#[command(
    author,
    version,
    about = "Detect the hosting cloud provider and print its instance metadata"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pretty-print the JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the current cloud provider and print its metadata
    Detect {
        /// auto, aws, gcp, azure or none
        #[arg(short, long, default_value = "auto", value_parser = parse_selection)]
        provider: ProviderSelection,
    },

    /// Run a single probe
    Probe {
        /// aws, gcp, azure or app-service
        #[arg(value_parser = parse_target)]
        target: Target,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Provider(CloudProvider),
    AppService,
}

fn parse_selection(s: &str) -> Result<ProviderSelection, String> {
    s.parse().map_err(|e: cloud_probe::ProviderSelectionError| e.to_string())
}

fn parse_target(s: &str) -> Result<Target, String> {
    match s.to_lowercase().as_str() {
        "aws" => Ok(Target::Provider(CloudProvider::Aws)),
        "gcp" => Ok(Target::Provider(CloudProvider::Gcp)),
        "azure" => Ok(Target::Provider(CloudProvider::Azure)),
        "app-service" | "appservice" => Ok(Target::AppService),
        _ => Err(format!(
            "unknown probe: {} (expected aws, gcp, azure, or app-service)",
            s
        )),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), serde_json::Error> {
    let probe = MetadataProbe::new();

    let metadata = match cli.command {
        Commands::Detect { provider } => probe.detect(provider).await,
        Commands::Probe {
            target: Target::Provider(provider),
        } => probe.provider(provider).await,
        Commands::Probe {
            target: Target::AppService,
        } => probe.azure_app_service(),
    };

    let value = CloudMetadata::to_value(metadata.as_ref());
    let output = if cli.pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    println!("{}", output);
    Ok(())
}
