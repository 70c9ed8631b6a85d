//! Core error types for stackfleet-core

use std::path::PathBuf;

use thiserror::Error;

/// Deployment steps that can fail, in execution order for `deploy`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    Bootstrap,
    Networks,
    Render,
    Provision,
    Pull,
    Build,
    Start,
    Stop,
    Restart,
    Status,
    Logs,
}

impl std::fmt::Display for DeployStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeployStep::Bootstrap => "bootstrap",
            DeployStep::Networks => "networks",
            DeployStep::Render => "render",
            DeployStep::Provision => "provision",
            DeployStep::Pull => "pull",
            DeployStep::Build => "build",
            DeployStep::Start => "start",
            DeployStep::Stop => "stop",
            DeployStep::Restart => "restart",
            DeployStep::Status => "status",
            DeployStep::Logs => "logs",
        };
        f.write_str(s)
    }
}

/// How a failure should be reported to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; nothing was touched
    Validation,
    /// Missing tooling or inputs; nothing was touched
    Prerequisite,
    /// A mutating step failed; earlier steps stay applied
    StepFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorKind::Validation => "validation error",
            ErrorKind::Prerequisite => "prerequisite missing",
            ErrorKind::StepFailure => "step failed",
        })
    }
}

/// Errors that abort an orchestrator, rollout or registrar action
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error("unknown machine '{id}' (known machines: {known})")]
    UnknownMachine {
        id: String,
        /// Comma separated list of valid ids
        known: String,
    },

    #[error("unknown action '{0}' (expected deploy, stop, restart, status or logs)")]
    UnknownAction(String),

    #[error("bundle file not found: {}", .0.display())]
    MissingBundleFile(PathBuf),

    #[error("environment file not found: {}", .0.display())]
    MissingEnvFile(PathBuf),

    #[error("required tooling not found: {0}")]
    MissingTooling(String),

    #[error("template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("{step} failed: {message}")]
    Step {
        step: DeployStep,
        message: String,
    },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("service registry unavailable at {0}")]
    RegistryUnavailable(String),
}

impl CoreError {
    /// Wrap a lower-level failure as a failure of `step`
    pub fn step(step: DeployStep, err: impl std::fmt::Display) -> Self {
        CoreError::Step {
            step,
            message: err.to_string(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::UnknownMachine { .. }
            | CoreError::UnknownAction(_)
            | CoreError::MissingBundleFile(_)
            | CoreError::ConfigError(_) => ErrorKind::Validation,
            CoreError::MissingEnvFile(_)
            | CoreError::MissingTooling(_)
            | CoreError::RegistryUnavailable(_) => ErrorKind::Prerequisite,
            CoreError::TemplateNotFound(_) | CoreError::Step { .. } => ErrorKind::StepFailure,
        }
    }

    /// What the operator can do about it, where there is something obvious
    #[must_use]
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            CoreError::UnknownMachine { .. } | CoreError::UnknownAction(_) => {
                Some("run with --help for usage")
            }
            CoreError::MissingEnvFile(_) => {
                Some("create it from .env.example or pass --env <path>")
            }
            CoreError::MissingTooling(_) => {
                Some("install Docker Engine with the compose plugin and make sure the daemon is running")
            }
            CoreError::MissingBundleFile(_) => Some("check deploy.root in stackfleet.toml"),
            CoreError::RegistryUnavailable(_) => {
                Some("deploy core-db first or point --registry-url at a running registry")
            }
            _ => None,
        }
    }
}
