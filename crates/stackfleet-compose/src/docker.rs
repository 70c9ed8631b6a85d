//! Docker Compose bundle management

use std::sync::Arc;

use async_trait::async_trait;
use stackfleet_exec::{CommandResult, RemoteExecutor, shell_quote};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::error::ComposeError;
use crate::traits::ContainerRuntime;
use crate::types::{
    BundleRef, ComposeFlavor, NetworkCreation, NetworkSpec, ServiceState, parse_ps_output,
};

/// Exit status of a process stopped by Ctrl-C
const SIGINT_STATUS: i32 = 130;

/// `docker inspect` template emitting one `compose ps --format json` row per
/// container, for compose v1 which has no `--format`
const INSPECT_ROW_FORMAT: &str = concat!(
    r#"{"Service":{{json (index .Config.Labels "com.docker.compose.service")}},"#,
    r#""Name":{{json .Name}},"State":{{json .State.Status}},"#,
    r#""Health":{{if .State.Health}}{{json .State.Health.Status}}{{else}}""{{end}},"#,
    r#""Status":{{json .State.Status}}}"#,
);

/// Drives bundles through the docker compose CLI
pub struct DockerCompose {
    executor: Arc<dyn RemoteExecutor>,
    /// Detected on first use
    flavor: OnceCell<ComposeFlavor>,
}

impl DockerCompose {
    #[must_use]
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            executor,
            flavor: OnceCell::new(),
        }
    }

    /// Prefer the v2 plugin, fall back to standalone v1
    async fn flavor(&self) -> Result<ComposeFlavor, ComposeError> {
        self.flavor
            .get_or_try_init(|| async {
                for flavor in [ComposeFlavor::V2, ComposeFlavor::V1] {
                    let probe = format!("{} version", flavor.command());
                    if self.executor.run(&probe).await.is_ok_and(|r| r.success()) {
                        debug!(?flavor, "detected compose flavor");
                        return Ok(flavor);
                    }
                }
                Err(ComposeError::ComposeNotFound)
            })
            .await
            .copied()
    }

    fn compose_cmd(flavor: ComposeFlavor, bundle: &BundleRef, args: &str) -> String {
        format!(
            "{} -p {} -f {} --env-file {} {args}",
            flavor.command(),
            shell_quote(&bundle.project),
            shell_quote(&bundle.compose_file.display().to_string()),
            shell_quote(&bundle.env_file.display().to_string()),
        )
    }

    /// Run a compose subcommand, turning a non-zero exit into an error
    async fn compose(&self, bundle: &BundleRef, args: &str) -> Result<CommandResult, ComposeError> {
        let cmd = Self::compose_cmd(self.flavor().await?, bundle, args);
        let result = self.executor.run(&cmd).await?;
        if !result.success() {
            return Err(failed(&format!("compose {args}"), &result));
        }
        Ok(result)
    }

    /// v1 fallback: container ids from `ps -a -q`, rows from `docker inspect`
    async fn inspect_states(&self, bundle: &BundleRef) -> Result<Vec<ServiceState>, ComposeError> {
        let ids = self.compose(bundle, "ps -a -q").await?;
        let ids: Vec<String> = ids.stdout_lines().map(shell_quote).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let cmd = format!(
            "docker inspect --format {} {}",
            shell_quote(INSPECT_ROW_FORMAT),
            ids.join(" ")
        );
        let result = self.executor.run(&cmd).await?;
        if !result.success() {
            return Err(failed("inspect", &result));
        }

        let mut states = parse_ps_output(&result.stdout)?;
        for state in &mut states {
            state.container = state.container.trim_start_matches('/').to_string();
        }
        Ok(states)
    }
}

fn failed(command: &str, result: &CommandResult) -> ComposeError {
    ComposeError::CommandFailed {
        command: command.to_string(),
        status: result.status,
        message: result.failure_message(),
    }
}

#[async_trait]
impl ContainerRuntime for DockerCompose {
    async fn is_available(&self) -> bool {
        self.flavor().await.is_ok()
    }

    #[instrument(skip(self, bundle), fields(project = %bundle.project))]
    async fn running_services(&self, bundle: &BundleRef) -> Result<Vec<String>, ComposeError> {
        let result = self
            .compose(bundle, "ps --services --filter status=running")
            .await?;
        Ok(result.stdout_lines().map(String::from).collect())
    }

    #[instrument(skip(self, bundle), fields(project = %bundle.project))]
    async fn pull(&self, bundle: &BundleRef) -> Result<(), ComposeError> {
        info!("pulling bundle images");
        self.compose(bundle, "pull").await.map(drop)
    }

    #[instrument(skip(self, bundle), fields(project = %bundle.project))]
    async fn build(&self, bundle: &BundleRef) -> Result<(), ComposeError> {
        info!("building bundle images");
        self.compose(bundle, "build").await.map(drop)
    }

    #[instrument(skip(self, bundle), fields(project = %bundle.project))]
    async fn up(&self, bundle: &BundleRef) -> Result<(), ComposeError> {
        info!("starting bundle");
        self.compose(bundle, "up -d").await.map(drop)
    }

    #[instrument(skip(self, bundle), fields(project = %bundle.project))]
    async fn down(&self, bundle: &BundleRef) -> Result<(), ComposeError> {
        info!("stopping bundle");
        self.compose(bundle, "down").await.map(drop)
    }

    #[instrument(skip(self, bundle), fields(project = %bundle.project))]
    async fn restart(&self, bundle: &BundleRef) -> Result<(), ComposeError> {
        info!("restarting bundle");
        self.compose(bundle, "restart").await.map(drop)
    }

    #[instrument(skip(self, bundle), fields(project = %bundle.project))]
    async fn service_states(&self, bundle: &BundleRef) -> Result<Vec<ServiceState>, ComposeError> {
        match self.flavor().await? {
            ComposeFlavor::V2 => {
                let result = self.compose(bundle, "ps --all --format json").await?;
                parse_ps_output(&result.stdout)
            }
            ComposeFlavor::V1 => self.inspect_states(bundle).await,
        }
    }

    #[instrument(skip(self, bundle), fields(project = %bundle.project))]
    async fn follow_logs(&self, bundle: &BundleRef, tail: u32) -> Result<(), ComposeError> {
        let args = format!("logs -f --tail={tail}");
        let cmd = Self::compose_cmd(self.flavor().await?, bundle, &args);
        match self.executor.stream(&cmd).await? {
            0 | SIGINT_STATUS => Ok(()),
            status => Err(ComposeError::CommandFailed {
                command: format!("compose {args}"),
                status,
                message: "log stream ended with an error".to_string(),
            }),
        }
    }

    #[instrument(skip(self))]
    async fn network_exists(&self, name: &str) -> Result<bool, ComposeError> {
        let cmd = format!("docker network inspect {}", shell_quote(name));
        Ok(self.executor.run(&cmd).await?.success())
    }

    #[instrument(skip(self, spec), fields(network = %spec.name))]
    async fn create_network(&self, spec: &NetworkSpec) -> Result<NetworkCreation, ComposeError> {
        let cmd = format!(
            "docker network create --driver bridge --subnet {} --gateway {} {}",
            shell_quote(&spec.subnet),
            shell_quote(&spec.gateway),
            shell_quote(&spec.name)
        );
        let result = self.executor.run(&cmd).await?;

        if result.success() {
            info!("created network");
            return Ok(NetworkCreation::Created);
        }
        // lost a race with a concurrent bootstrap
        if result.stderr.contains("already exists") {
            warn!("network appeared concurrently");
            return Ok(NetworkCreation::AlreadyExists);
        }
        Err(failed("network create", &result))
    }

    fn runtime_type(&self) -> &'static str {
        "docker-compose"
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    use stackfleet_exec::ExecError;

    use super::*;
    use crate::types::{ContainerHealth, ContainerState};

    /// Answers commands by substring match and records what it ran
    struct ScriptedExecutor {
        replies: Vec<(&'static str, i32, &'static str, &'static str)>,
        log: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn new(replies: Vec<(&'static str, i32, &'static str, &'static str)>) -> Arc<Self> {
            Arc::new(Self {
                replies,
                log: Mutex::new(Vec::new()),
            })
        }

        fn commands(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteExecutor for ScriptedExecutor {
        async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
            self.log.lock().unwrap().push(cmd.to_string());
            let (status, stdout, stderr) = self
                .replies
                .iter()
                .find(|(pat, ..)| cmd.contains(pat))
                .map_or((127, "", "not found"), |&(_, s, o, e)| (s, o, e));
            Ok(CommandResult {
                status,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                duration: Duration::ZERO,
            })
        }

        async fn run_with_timeout(
            &self,
            cmd: &str,
            _timeout: Duration,
        ) -> Result<CommandResult, ExecError> {
            self.run(cmd).await
        }

        async fn stream(&self, cmd: &str) -> Result<i32, ExecError> {
            Ok(self.run(cmd).await?.status)
        }

        fn executor_type(&self) -> &'static str {
            "scripted"
        }
    }

    fn bundle() -> BundleRef {
        BundleRef {
            project: "stackfleet-core-db".to_string(),
            compose_file: PathBuf::from("/srv/fleet/stacks/core-db/docker-compose.yml"),
            env_file: PathBuf::from("/srv/fleet/.env"),
        }
    }

    #[test]
    fn test_compose_cmd_v2() {
        let cmd = DockerCompose::compose_cmd(ComposeFlavor::V2, &bundle(), "up -d");
        assert_eq!(
            cmd,
            "docker compose -p stackfleet-core-db -f /srv/fleet/stacks/core-db/docker-compose.yml \
             --env-file /srv/fleet/.env up -d"
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_v1_and_caches() {
        let exec = ScriptedExecutor::new(vec![
            ("docker-compose version", 0, "1.29.2", ""),
            ("ps --services", 0, "postgres\nredis\n", ""),
        ]);
        let runtime = DockerCompose::new(exec.clone());

        let running = runtime.running_services(&bundle()).await.unwrap();
        assert_eq!(running, vec!["postgres", "redis"]);
        runtime.running_services(&bundle()).await.unwrap();

        let probes = exec
            .commands()
            .iter()
            .filter(|c| c.ends_with("version"))
            .count();
        assert_eq!(probes, 2, "v2 probe, v1 probe, then cached");
        assert!(exec.commands().last().unwrap().starts_with("docker-compose -p"));
    }

    #[tokio::test]
    async fn test_v1_states_come_from_inspect() {
        let exec = ScriptedExecutor::new(vec![
            ("docker-compose version", 0, "1.29.2", ""),
            ("ps -a -q", 0, "3f2a91c\n8b7e004\n", ""),
            (
                "docker inspect",
                0,
                concat!(
                    r#"{"Service":"postgres","Name":"/stackfleet-core-db_postgres_1","State":"running","Health":"healthy","Status":"running"}"#,
                    "\n",
                    r#"{"Service":"redis","Name":"/stackfleet-core-db_redis_1","State":"restarting","Health":"","Status":"restarting"}"#,
                    "\n",
                ),
                "",
            ),
        ]);
        let states = DockerCompose::new(exec.clone())
            .service_states(&bundle())
            .await
            .unwrap();

        assert_eq!(states.len(), 2);
        assert_eq!(states[0].container, "stackfleet-core-db_postgres_1");
        assert_eq!(states[0].health, Some(ContainerHealth::Healthy));
        assert_eq!(states[1].state, ContainerState::Restarting);

        let commands = exec.commands();
        assert!(commands.iter().all(|c| !c.contains("--format json")));
        assert_eq!(
            commands[2],
            "docker-compose -p stackfleet-core-db -f /srv/fleet/stacks/core-db/docker-compose.yml \
             --env-file /srv/fleet/.env ps -a -q"
        );
        assert!(commands[3].starts_with("docker inspect --format '{\"Service\""));
        assert!(commands[3].ends_with("}' 3f2a91c 8b7e004"));
    }

    #[tokio::test]
    async fn test_v1_no_containers_skips_inspect() {
        let exec = ScriptedExecutor::new(vec![
            ("docker-compose version", 0, "1.29.2", ""),
            ("ps -a -q", 0, "", ""),
        ]);
        let states = DockerCompose::new(exec.clone())
            .service_states(&bundle())
            .await
            .unwrap();
        assert!(states.is_empty());
        assert!(exec.commands().iter().all(|c| !c.contains("inspect")));
    }

    #[tokio::test]
    async fn test_missing_tooling() {
        let runtime = DockerCompose::new(ScriptedExecutor::new(vec![]));
        assert!(!runtime.is_available().await);
        assert!(matches!(
            runtime.up(&bundle()).await,
            Err(ComposeError::ComposeNotFound)
        ));
    }

    #[tokio::test]
    async fn test_pull_failure_reports_stderr() {
        let exec = ScriptedExecutor::new(vec![
            ("docker compose version", 0, "v2.29.1", ""),
            (" pull", 1, "", "manifest unknown"),
        ]);
        let err = DockerCompose::new(exec).pull(&bundle()).await.unwrap_err();
        match err {
            ComposeError::CommandFailed {
                command, message, ..
            } => {
                assert_eq!(command, "compose pull");
                assert_eq!(message, "manifest unknown");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_network_race_is_success() {
        let exec = ScriptedExecutor::new(vec![(
            "network create",
            1,
            "",
            "Error response from daemon: network with name stackfleet-backend already exists",
        )]);
        let spec = NetworkSpec {
            name: "stackfleet-backend".to_string(),
            subnet: "172.29.0.0/16".to_string(),
            gateway: "172.29.0.1".to_string(),
        };
        let outcome = DockerCompose::new(exec.clone())
            .create_network(&spec)
            .await
            .unwrap();
        assert_eq!(outcome, NetworkCreation::AlreadyExists);
        assert_eq!(
            exec.commands()[0],
            "docker network create --driver bridge --subnet 172.29.0.0/16 \
             --gateway 172.29.0.1 stackfleet-backend"
        );
    }

    #[tokio::test]
    async fn test_logs_interrupted_is_ok() {
        let exec = ScriptedExecutor::new(vec![
            ("docker compose version", 0, "v2", ""),
            ("logs -f --tail=50", 130, "", ""),
        ]);
        DockerCompose::new(exec)
            .follow_logs(&bundle(), 50)
            .await
            .unwrap();
    }
}
