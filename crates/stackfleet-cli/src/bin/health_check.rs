//! health-check: fleet health from the registry, or direct probes

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use stackfleet_cli::{CommonArgs, load_settings, output, parse_args};
use stackfleet_client::RegistryClient;
use stackfleet_core::{DirectProbeTable, DirectProber, HealthAggregator, HealthScope};

#[derive(Parser)]
#[command(name = "health-check", version)]
#[command(about = "Report service health across the fleet or for one machine", long_about = None)]
struct Cli {
    /// `all` for the fleet-wide view, or a machine id to probe it directly
    #[arg(default_value = "all")]
    target: String,

    /// Service registry base URL
    #[arg(long, env = "REGISTRY_URL")]
    registry_url: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let scope: HealthScope = cli.target.parse()?;
    let mut settings = load_settings(cli.common.config.as_deref())?;
    if let Some(url) = cli.registry_url {
        settings.registry.url = url;
    }

    let registry = RegistryClient::with_timeout(&settings.registry.url, settings.registry.timeout())?;
    let aggregator = HealthAggregator::new(
        Arc::new(registry),
        Arc::new(DirectProber::new(settings.probe.timeout())),
        DirectProbeTable::standard(&settings.probe.hosts),
    );

    output::health_report(&aggregator.check(scope).await);
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match parse_args::<Cli>() {
        Ok(cli) => cli,
        Err(code) => return code,
    };
    stackfleet_cli::init(cli.common.verbose);
    stackfleet_cli::finish(run(cli).await)
}
