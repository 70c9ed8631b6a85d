//! fleet-deploy: roll the whole fleet out phase by phase

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use stackfleet_cli::{CommonArgs, DefaultExecutorFactory, load_settings, output, parse_args};
use stackfleet_core::{FleetRollout, RolloutOptions};

#[derive(Parser)]
#[command(name = "fleet-deploy", version)]
#[command(about = "Deploy every machine in phases over SSH", long_about = None)]
struct Cli {
    /// Environment file, relative to each host's workdir
    #[arg(short, long, default_value = ".env")]
    env: String,

    #[arg(long)]
    skip_pull: bool,

    #[arg(long)]
    skip_build: bool,

    /// Print the phases and commands without running anything
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    common: CommonArgs,
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = load_settings(cli.common.config.as_deref())?;
    let options = RolloutOptions {
        env_file: cli.env,
        skip_pull: cli.skip_pull,
        skip_build: cli.skip_build,
    };
    let rollout = FleetRollout::new(settings.fleet, Arc::new(DefaultExecutorFactory), options);

    if cli.dry_run {
        output::fleet_plan(&rollout.plan()?, rollout.options());
        return Ok(ExitCode::SUCCESS);
    }

    let report = rollout.run().await?;
    output::fleet_report(&report);
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
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
