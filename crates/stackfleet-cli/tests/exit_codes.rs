use std::path::Path;
use std::process::{Command, Output};

fn run(bin: &str, args: &[&str], config: &Path) -> Output {
    Command::new(bin)
        .args(args)
        .env("STACKFLEET_CONFIG", config)
        .env_remove("REGISTRY_URL")
        .env_remove("SERVICES")
        .output()
        .unwrap()
}

fn settings(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("stackfleet.toml");
    std::fs::write(
        &path,
        format!(
            "[deploy]\nroot = {:?}\ngrace_period_secs = 0\n\n[registry]\nurl = \"http://127.0.0.1:9\"\ntimeout_secs = 1\n",
            dir.display().to_string()
        ),
    )
    .unwrap();
    path
}

#[test]
fn test_deploy_unknown_machine_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings(dir.path());

    let out = run(env!("CARGO_BIN_EXE_deploy"), &["ghost-machine"], &config);

    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("validation error: unknown machine 'ghost-machine'"),
        "{stderr}"
    );
    assert!(!dir.path().join("data").exists());
}

#[test]
fn test_deploy_unknown_action_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings(dir.path());

    let out = run(
        env!("CARGO_BIN_EXE_deploy"),
        &["core-db", "--action", "obliterate"],
        &config,
    );
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn test_deploy_missing_env_file_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings(dir.path());
    let bundle = dir.path().join("stacks/core-db/docker-compose.yml");
    std::fs::create_dir_all(bundle.parent().unwrap()).unwrap();
    std::fs::write(&bundle, "services: {}\n").unwrap();
    let env = dir.path().join("absent.env");

    let out = run(
        env!("CARGO_BIN_EXE_deploy"),
        &["core-db", "--env", env.to_str().unwrap()],
        &config,
    );

    assert_eq!(out.status.code(), Some(1));
    assert!(
        String::from_utf8_lossy(&out.stderr)
            .contains("prerequisite missing: environment file not found")
    );
}

#[test]
fn test_help_exits_0() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings(dir.path());
    for bin in [
        env!("CARGO_BIN_EXE_deploy"),
        env!("CARGO_BIN_EXE_health-check"),
        env!("CARGO_BIN_EXE_fleet-deploy"),
        env!("CARGO_BIN_EXE_register-services"),
    ] {
        assert_eq!(run(bin, &["--help"], &config).status.code(), Some(0), "{bin}");
    }
}

#[test]
fn test_health_check_unknown_machine_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings(dir.path());

    let out = run(env!("CARGO_BIN_EXE_health-check"), &["ghost-machine"], &config);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn test_register_services_empty_list_exits_0() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings(dir.path());

    let out = run(env!("CARGO_BIN_EXE_register-services"), &[], &config);
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn test_fleet_dry_run_requires_hosts() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings(dir.path());

    let out = run(env!("CARGO_BIN_EXE_fleet-deploy"), &["--dry-run"], &config);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("no [[fleet.host]] entry for core-db"));
}
