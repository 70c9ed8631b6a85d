//! register-services: one-shot registration with the service registry

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use stackfleet_cli::{CommonArgs, load_settings, output, parse_args};
use stackfleet_client::RegistryClient;
use stackfleet_core::{ServiceRegistrar, parse_services};

#[derive(Parser)]
#[command(name = "register-services", version)]
#[command(about = "Register services with the service registry", long_about = None)]
struct Cli {
    /// JSON array of {name, host, port, ...} entries
    #[arg(long, env = "SERVICES", default_value = "[]")]
    services: String,

    /// Service registry base URL
    #[arg(long, env = "REGISTRY_URL")]
    registry_url: Option<String>,

    /// Sent as X-API-Key
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Registration attempts per service
    #[arg(long, env = "MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Seconds between attempts
    #[arg(long, env = "RETRY_DELAY")]
    retry_delay: Option<u64>,

    #[command(flatten)]
    common: CommonArgs,
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut settings = load_settings(cli.common.config.as_deref())?.registry;
    if let Some(url) = cli.registry_url {
        settings.url = url;
    }
    if let Some(key) = cli.api_key {
        settings.api_key = Some(key);
    }
    if let Some(n) = cli.max_retries {
        settings.max_retries = n;
    }
    if let Some(secs) = cli.retry_delay {
        settings.retry_delay_secs = secs;
    }

    let list = parse_services(&cli.services)?;
    if list.services.is_empty() {
        output::warning("no services defined");
        return Ok(ExitCode::SUCCESS);
    }

    let mut client = RegistryClient::with_timeout(&settings.url, settings.timeout())?;
    if let Some(key) = &settings.api_key {
        client = client.with_api_key(key);
    }

    let summary = ServiceRegistrar::new(Arc::new(client), &settings)
        .register_all(&list.services)
        .await?;

    for name in &summary.registered {
        output::success(&format!("registered {name}"));
    }
    if summary.is_success() {
        return Ok(ExitCode::SUCCESS);
    }
    output::fatal(&eyre::eyre!(
        "failed to register: {}",
        summary.failed.join(", ")
    ));
    Ok(ExitCode::FAILURE)
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
