//! Arguments shared by every binary

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser};

#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Settings file (default: ./stackfleet.toml, /etc/stackfleet, user config dir)
    #[arg(long, global = true, env = "STACKFLEET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Parse arguments; malformed input exits 1, `--help`/`--version` exit 0.
///
/// # Errors
/// The exit code to return when parsing did not produce arguments
pub fn parse_args<T: Parser>() -> Result<T, ExitCode> {
    T::try_parse().map_err(|e| {
        let failed = e.use_stderr();
        let _ = e.print();
        if failed {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    })
}
