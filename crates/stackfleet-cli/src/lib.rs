//! stackfleet-cli: shared plumbing for the stackfleet binaries
//!
//! Settings loading, logging setup, terminal output and the bits that bind
//! core traits to real terminals and hosts.

use std::process::ExitCode;

pub mod args;
pub mod config;
pub mod factory;
pub mod logging;
pub mod output;
pub mod prompt;

pub use args::{CommonArgs, parse_args};
pub use config::load_settings;
pub use factory::DefaultExecutorFactory;
pub use prompt::TerminalConfirmation;

/// Install error reporting and logging for a binary
pub fn init(verbose: bool) {
    if let Err(e) = color_eyre::install() {
        eprintln!("{e}");
    }
    logging::init(verbose);
}

/// Exit code for a binary's result; failures are printed first
pub fn finish(result: eyre::Result<ExitCode>) -> ExitCode {
    result.unwrap_or_else(|e| {
        output::fatal(&e);
        ExitCode::FAILURE
    })
}
