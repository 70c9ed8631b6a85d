//! deploy: run one action against one machine's service bundle

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use stackfleet_cli::{CommonArgs, TerminalConfirmation, load_settings, output, parse_args};
use stackfleet_compose::DockerCompose;
use stackfleet_core::{
    ActionOutcome, DeployAction, DeploymentOptions, DirectoryOwner, Orchestrator,
};
use stackfleet_exec::LocalExecutor;

#[derive(Parser)]
#[command(name = "deploy", version)]
#[command(about = "Deploy, stop, restart or inspect a machine's service bundle", long_about = None)]
struct Cli {
    /// Machine id (core-db, inference-nvidia, inference-amd, edge-gateway, monitoring, local-dev)
    machine: String,

    /// deploy, stop, restart, status or logs
    #[arg(short, long, default_value = "deploy")]
    action: DeployAction,

    /// Environment file handed to compose
    #[arg(short, long, default_value = ".env")]
    env: PathBuf,

    /// Replace a running bundle without asking
    #[arg(short, long)]
    force: bool,

    #[arg(long)]
    skip_pull: bool,

    #[arg(long)]
    skip_build: bool,

    #[command(flatten)]
    common: CommonArgs,
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = load_settings(cli.common.config.as_deref())?;
    let options = DeploymentOptions {
        env_file: cli.env,
        force: cli.force,
        skip_pull: cli.skip_pull,
        skip_build: cli.skip_build,
    };

    let runtime = Arc::new(DockerCompose::new(Arc::new(LocalExecutor::new())));
    let owner = DirectoryOwner::from_ids(
        std::env::var("SUDO_UID").ok().as_deref(),
        std::env::var("SUDO_GID").ok().as_deref(),
    );
    let orchestrator = Orchestrator::new(settings.deploy, runtime, Arc::new(TerminalConfirmation))
        .with_owner(owner);

    let outcome = if cli.action == DeployAction::Logs {
        tokio::select! {
            result = orchestrator.run(&cli.machine, cli.action, &options) => result?,
            _ = tokio::signal::ctrl_c() => ActionOutcome::LogsEnded,
        }
    } else {
        orchestrator.run(&cli.machine, cli.action, &options).await?
    };

    output::action_outcome(&cli.machine, &outcome);
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
