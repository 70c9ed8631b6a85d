//! SSH command execution using russh
//!
//! Used by the fleet rollout to run `deploy` on each machine's host.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key};
use russh::{ChannelMsg, Disconnect, client};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::error::ExecError;
use crate::keys::{KeySource, ResolvedKey};
use crate::result::{CommandResult, ConnectionInfo};
use crate::traits::RemoteExecutor;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug)]
struct FleetHostHandler;

impl client::Handler for FleetHostHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // TODO: verify against ~/.ssh/known_hosts once fleet hosts publish their keys
        Ok(true)
    }
}

/// Where channel output goes
enum Sink<'a> {
    Capture {
        stdout: &'a mut Vec<u8>,
        stderr: &'a mut Vec<u8>,
    },
    Terminal,
}

/// Tracks how an exec channel ends.
///
/// Servers may send `exit-status` before or after EOF, so the channel is
/// finished only once both have arrived, or on close.
#[derive(Debug, Default)]
struct ExitTracker {
    status: Option<i32>,
    eof: bool,
}

impl ExitTracker {
    /// Record `msg`; true once no more messages are needed
    fn observe(&mut self, msg: &ChannelMsg) -> bool {
        match msg {
            ChannelMsg::ExitStatus { exit_status } => {
                self.status = Some(exit_status.cast_signed());
                self.eof
            }
            ChannelMsg::ExitSignal { signal_name, .. } => {
                debug!(signal = ?signal_name, "remote command killed by signal");
                self.status = Some(-1);
                self.eof
            }
            ChannelMsg::Eof => {
                self.eof = true;
                self.status.is_some()
            }
            ChannelMsg::Close => true,
            _ => false,
        }
    }

    /// Exit status, -1 when the server never reported one
    fn status(&self) -> i32 {
        self.status.unwrap_or(-1)
    }
}

/// Runs commands on one fleet host over a lazily opened SSH session
pub struct SshExecutor {
    conn_info: ConnectionInfo,
    key: ResolvedKey,
    session: Mutex<Option<client::Handle<FleetHostHandler>>>,
}

impl std::fmt::Debug for SshExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshExecutor")
            .field("conn_info", &self.conn_info)
            .field("key", &self.key)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl SshExecutor {
    /// # Errors
    /// Returns `ExecError::SshKeyError` if the key cannot be resolved
    pub fn new(conn_info: ConnectionInfo, key_source: &KeySource) -> Result<Self, ExecError> {
        let key = key_source
            .resolve()
            .map_err(|e| ExecError::SshKeyError(e.to_string()))?;

        Ok(Self {
            conn_info,
            key,
            session: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.conn_info
    }

    #[instrument(skip(self), fields(host = %self.conn_info))]
    async fn connect(&self) -> Result<(), ExecError> {
        let mut guard = self.session.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let Some(key_path) = self.key.path() else {
            return Err(ExecError::AuthenticationFailed(
                "ssh-agent authentication is not supported, configure ssh_key".to_string(),
            ));
        };

        info!(host = %self.conn_info, "connecting over SSH");

        let connecting = client::connect(
            Arc::new(client::Config::default()),
            (self.conn_info.host.as_str(), self.conn_info.port),
            FleetHostHandler,
        );
        let mut session = timeout(CONNECT_TIMEOUT, connecting)
            .await
            .map_err(|_| ExecError::Timeout {
                timeout: CONNECT_TIMEOUT,
            })?
            .map_err(|e| ExecError::ConnectionFailed {
                host: self.conn_info.host.clone(),
                reason: e.to_string(),
            })?;

        let key_pair =
            load_secret_key(key_path, None).map_err(|e| ExecError::SshKeyError(e.to_string()))?;
        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        let auth = session
            .authenticate_publickey(
                &self.conn_info.user,
                PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
            )
            .await
            .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?;

        if !auth.success() {
            return Err(ExecError::AuthenticationFailed(format!(
                "public key rejected for {}",
                self.conn_info
            )));
        }

        *guard = Some(session);
        Ok(())
    }

    /// Run `cmd` on an exec channel, sending output to `sink`
    async fn exec(&self, cmd: &str, sink: &mut Sink<'_>) -> Result<i32, ExecError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(ExecError::NotConnected)?;

        debug!(command = %cmd, "executing remote command");

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;
        channel
            .exec(true, cmd)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let mut exit = ExitTracker::default();
        let mut out = tokio::io::stdout();
        let mut err = tokio::io::stderr();

        while let Some(msg) = channel.wait().await {
            match (&msg, &mut *sink) {
                (ChannelMsg::Data { data }, Sink::Capture { stdout, .. }) => {
                    stdout.extend_from_slice(data);
                }
                (ChannelMsg::ExtendedData { data, ext: 1 }, Sink::Capture { stderr, .. }) => {
                    stderr.extend_from_slice(data);
                }
                (ChannelMsg::Data { data }, Sink::Terminal) => {
                    out.write_all(data)
                        .await
                        .map_err(|e| ExecError::IoError(e.to_string()))?;
                }
                (ChannelMsg::ExtendedData { data, ext: 1 }, Sink::Terminal) => {
                    err.write_all(data)
                        .await
                        .map_err(|e| ExecError::IoError(e.to_string()))?;
                }
                _ => {}
            }
            if exit.observe(&msg) {
                break;
            }
        }

        Ok(exit.status())
    }

    async fn capture(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        let start = Instant::now();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut sink = Sink::Capture {
            stdout: &mut stdout,
            stderr: &mut stderr,
        };
        let status = self.exec(cmd, &mut sink).await?;

        let result = CommandResult {
            status,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            duration: start.elapsed(),
        };
        debug!(status = result.status, duration = ?result.duration, "remote command completed");
        Ok(result)
    }

    /// Close the session if one is open
    ///
    /// # Errors
    /// Returns `ExecError::IoError` if the disconnect message cannot be sent
    pub async fn disconnect(&self) -> Result<(), ExecError> {
        if let Some(session) = self.session.lock().await.take() {
            session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            info!(host = %self.conn_info, "SSH disconnected");
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    #[instrument(skip(self), fields(host = %self.conn_info))]
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.connect().await?;
        self.capture(cmd).await
    }

    #[instrument(skip(self), fields(host = %self.conn_info))]
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout_duration: Duration,
    ) -> Result<CommandResult, ExecError> {
        self.connect().await?;

        match timeout(timeout_duration, self.capture(cmd)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(command = %cmd, timeout = ?timeout_duration, "remote command timed out");
                Err(ExecError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }

    #[instrument(skip(self), fields(host = %self.conn_info))]
    async fn stream(&self, cmd: &str) -> Result<i32, ExecError> {
        self.connect().await?;
        self.exec(cmd, &mut Sink::Terminal).await
    }

    fn is_connected(&self) -> bool {
        self.session
            .try_lock()
            .map(|s| s.is_some())
            .unwrap_or(false)
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }
}

/// Builder for `SshExecutor`
pub struct SshExecutorBuilder {
    conn_info: ConnectionInfo,
    key_source: KeySource,
}

impl SshExecutorBuilder {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            conn_info: ConnectionInfo::new(host, user),
            key_source: KeySource::Agent,
        }
    }

    #[must_use]
    pub fn with_key_source(mut self, key_source: KeySource) -> Self {
        self.key_source = key_source;
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.conn_info.port = port;
        self
    }

    /// # Errors
    /// Returns `ExecError::SshKeyError` if the key cannot be resolved
    pub fn build(self) -> Result<SshExecutor, ExecError> {
        SshExecutor::new(self.conn_info, &self.key_source)
    }
}

#[cfg(test)]
mod tests {
    use russh::CryptoVec;

    use super::*;

    fn data(bytes: &[u8]) -> ChannelMsg {
        ChannelMsg::Data {
            data: CryptoVec::from(bytes),
        }
    }

    #[test]
    fn test_exit_status_after_eof_is_read() {
        let mut exit = ExitTracker::default();
        assert!(!exit.observe(&data(b"stackfleet-core-db started\n")));
        assert!(!exit.observe(&ChannelMsg::Eof));
        assert!(exit.observe(&ChannelMsg::ExitStatus { exit_status: 0 }));
        assert_eq!(exit.status(), 0);
    }

    #[test]
    fn test_exit_status_before_eof() {
        let mut exit = ExitTracker::default();
        assert!(!exit.observe(&ChannelMsg::ExitStatus { exit_status: 3 }));
        assert!(exit.observe(&ChannelMsg::Eof));
        assert_eq!(exit.status(), 3);
    }

    #[test]
    fn test_close_without_status() {
        let mut exit = ExitTracker::default();
        assert!(!exit.observe(&ChannelMsg::Eof));
        assert!(exit.observe(&ChannelMsg::Close));
        assert_eq!(exit.status(), -1);
    }

    #[tokio::test]
    async fn test_agent_only_is_rejected_before_dialing() {
        let executor = SshExecutorBuilder::new("192.0.2.10", "deploy")
            .with_port(2222)
            .build()
            .unwrap();

        assert!(!executor.is_connected());
        assert_eq!(executor.connection_info().port, 2222);

        let err = executor.run("true").await.unwrap_err();
        assert!(matches!(err, ExecError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_missing_key_fails_build() {
        let err = SshExecutorBuilder::new("192.0.2.10", "deploy")
            .with_key_source(KeySource::Path("/nonexistent/key".into()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ExecError::SshKeyError(_)));
    }
}
