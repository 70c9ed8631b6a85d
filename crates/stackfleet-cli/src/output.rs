//! Operator-facing terminal output
//!
//! Results go to stdout, fatal errors to stderr. Glyphs: ✓ healthy/ok,
//! ✗ failed, ? unknown, ⚠ advisory.

use crossterm::style::Stylize;
use stackfleet_api::{HealthStatus, ServiceHealthRecord};
use stackfleet_compose::{ContainerHealth, NetworkCreation, ServiceState};
use stackfleet_core::fleet::{FleetReport, PlannedMachine, RolloutOptions, remote_command};
use stackfleet_core::health::{MachineProbeResults, ProbeStatus};
use stackfleet_core::provision::{SkipReason, StepStatus};
use stackfleet_core::{ActionOutcome, CoreError, DeploySummary, HealthReport, RolloutStatus};

pub fn success(message: &str) {
    println!("{} {message}", "✓".green());
}

pub fn warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message.yellow());
}

pub fn notice(message: &str) {
    println!("{} {message}", "→".cyan());
}

/// Error text prefixed with its kind when it is a known failure
#[must_use]
pub fn fatal_message(err: &eyre::Report) -> String {
    match err.downcast_ref::<CoreError>() {
        Some(core) => format!("{}: {err:#}", core.kind()),
        None => format!("{err:#}"),
    }
}

/// Print a fatal error and, for known failures, what to do about it
pub fn fatal(err: &eyre::Report) {
    eprintln!("{} {}", "✗".red().bold(), fatal_message(err).red());
    if let Some(hint) = err.downcast_ref::<CoreError>().and_then(CoreError::remediation) {
        eprintln!("  {} {hint}", "hint:".dim());
    }
}

/// Registry timings are in seconds: `12ms` below one second, `1.50s` above,
/// `-` when the registry has no measurement
#[must_use]
pub fn response_time(secs: Option<f64>) -> String {
    match secs {
        None => "-".to_string(),
        Some(v) if v < 1.0 => format!("{:.0}ms", v * 1000.0),
        Some(v) => format!("{v:.2}s"),
    }
}

fn record_line(record: &ServiceHealthRecord) -> String {
    let glyph = match record.status {
        HealthStatus::Healthy => "✓".green(),
        HealthStatus::Unhealthy => "✗".red(),
        HealthStatus::Unknown => "?".yellow(),
    };
    format!(
        "  {glyph} {:<24} {}:{:<6} {:<10} {}",
        record.name,
        record.host,
        record.port,
        record.status,
        response_time(record.response_time_secs)
    )
}

fn machine_block(machine: &MachineProbeResults) {
    println!("{}", machine.machine.as_str().bold());
    if machine.results.is_empty() {
        println!("  (no probes configured)");
    }
    for result in &machine.results {
        match &result.status {
            ProbeStatus::Healthy => println!(
                "  {} {:<20} {}",
                "✓".green(),
                result.service,
                result.target.to_string().dim()
            ),
            ProbeStatus::Unhealthy(reason) => println!(
                "  {} {:<20} {} ({reason})",
                "✗".red(),
                result.service,
                result.target.to_string().dim()
            ),
        }
    }
}

/// Registry path prints records and the totals line; direct probes print
/// per-machine groups only.
pub fn health_report(report: &HealthReport) {
    match report {
        HealthReport::FromRegistry(summary) => {
            println!("{}", "Service registry".bold());
            for record in &summary.records {
                println!("{}", record_line(record));
            }
            println!();
            println!("{}", summary.totals);
        }
        HealthReport::FromDirectProbe {
            machines,
            fallback_notice,
        } => {
            if let Some(text) = fallback_notice {
                warning(text);
                println!();
            }
            for machine in machines {
                machine_block(machine);
            }
        }
    }
}

fn health_cell(health: Option<ContainerHealth>) -> String {
    health.map_or_else(|| "-".to_string(), |h| h.to_string())
}

/// Fixed-width table of `compose ps` rows
#[must_use]
pub fn status_table(services: &[ServiceState]) -> String {
    let width = |f: fn(&ServiceState) -> usize, header: &str| {
        services.iter().map(f).max().unwrap_or(0).max(header.len())
    };
    let svc_w = width(|s| s.service.len(), "SERVICE");
    let state_w = width(|s| s.state.to_string().len(), "STATE");
    let health_w = width(|s| health_cell(s.health).len(), "HEALTH");

    let mut out = format!(
        "{:<svc_w$}  {:<state_w$}  {:<health_w$}  STATUS\n",
        "SERVICE", "STATE", "HEALTH"
    );
    for s in services {
        out.push_str(&format!(
            "{:<svc_w$}  {:<state_w$}  {:<health_w$}  {}\n",
            s.service,
            s.state.to_string(),
            health_cell(s.health),
            s.status
        ));
    }
    out
}

fn deploy_summary(machine: &str, summary: &DeploySummary) {
    let created = summary
        .directories
        .iter()
        .filter(|d| matches!(d, stackfleet_core::DirectoryOutcome::Created(_)))
        .count();
    success(&format!(
        "directories ready ({created} created, {} present)",
        summary.directories.len() - created
    ));
    for network in &summary.networks {
        let state = match network.creation {
            NetworkCreation::Created => "created",
            NetworkCreation::AlreadyExists => "present",
        };
        success(&format!("network {} {state}", network.name));
    }
    for output in &summary.rendered {
        success(&format!("rendered {}", output.display()));
    }
    for step in &summary.provision {
        match step.status {
            StepStatus::Completed => success(&format!("{} done", step.step)),
            StepStatus::Skipped(SkipReason::Disabled) => {
                notice(&format!("{} skipped", step.step));
            }
            StepStatus::Skipped(SkipReason::NothingToBuild) => {
                notice(&format!("{} skipped, no build directives", step.step));
            }
        }
    }
    if !summary.replaced.is_empty() {
        notice(&format!("replaced running services: {}", summary.replaced.join(", ")));
    }
    success(&format!("{machine} started"));

    let report = &summary.report;
    println!();
    println!(
        "{} {}",
        "Post-deploy check".bold(),
        report.checked_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().dim()
    );
    if !report.services.is_empty() {
        print!("{}", status_table(&report.services));
    }
    for w in &report.warnings {
        warning(w);
    }
    if report.is_clean() {
        success("all services settled");
    }
    println!();
    println!("{}", "Next steps".bold());
    for hint in report.hints {
        println!("  - {hint}");
    }
}

pub fn action_outcome(machine: &str, outcome: &ActionOutcome) {
    match outcome {
        ActionOutcome::Deployed(summary) => deploy_summary(machine, summary),
        ActionOutcome::Cancelled { running } => {
            warning(&format!(
                "cancelled: {machine} left as is ({} running)",
                running.join(", ")
            ));
        }
        ActionOutcome::Stopped => success(&format!("{machine} stopped")),
        ActionOutcome::Restarted => success(&format!("{machine} restarted")),
        ActionOutcome::Status(services) if services.is_empty() => {
            notice(&format!("{machine}: no containers"));
        }
        ActionOutcome::Status(services) => print!("{}", status_table(services)),
        ActionOutcome::LogsEnded => notice("log stream closed"),
    }
}

pub fn fleet_plan(phases: &[Vec<PlannedMachine>], options: &RolloutOptions) {
    for (i, phase) in phases.iter().enumerate() {
        println!("{}", format!("Phase {}", i + 1).bold());
        for planned in phase {
            println!(
                "  {} {}@{}: {}",
                planned.machine,
                planned.host.user,
                planned.host.addr,
                remote_command(&planned.host, planned.machine, options).dim()
            );
        }
    }
}

pub fn fleet_report(report: &FleetReport) {
    for (i, phase) in report.phases.iter().enumerate() {
        println!("{}", format!("Phase {}", i + 1).bold());
        for rollout in phase {
            let elapsed = format!("{:.1}s", rollout.elapsed.as_secs_f64());
            match &rollout.status {
                RolloutStatus::Succeeded => println!(
                    "  {} {} on {} {}",
                    "✓".green(),
                    rollout.machine,
                    rollout.host,
                    elapsed.dim()
                ),
                RolloutStatus::Failed(reason) => println!(
                    "  {} {} on {}: {}",
                    "✗".red(),
                    rollout.machine,
                    rollout.host,
                    reason.as_str().red()
                ),
            }
        }
    }
    if let Some(phase) = report.halted_at {
        warning(&format!("rollout halted after phase {}", phase + 1));
    }
}
