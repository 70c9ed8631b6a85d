//! SSH identity resolution for fleet hosts
//!
//! A host entry names its key as a file path, as `env:VAR` (base64-encoded
//! private key in an environment variable), or not at all (ssh-agent).

use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Where the private key for a fleet host comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Key file on disk
    Path(PathBuf),
    /// ssh-agent
    Agent,
    /// Base64-encoded key held in the named environment variable
    Env(String),
}

impl KeySource {
    /// Interpret the `ssh_key` field of a host entry
    #[must_use]
    pub fn from_config(ssh_key: Option<&str>) -> Self {
        match ssh_key.map(str::trim) {
            None | Some("") => KeySource::Agent,
            Some(value) => match value.strip_prefix("env:") {
                Some(var) => KeySource::Env(var.to_string()),
                None => KeySource::Path(PathBuf::from(value)),
            },
        }
    }

    /// Turn the source into something the SSH client can load.
    ///
    /// `Env` keys are decoded into a 0600 temp file that is removed when the
    /// returned `ResolvedKey` is dropped.
    ///
    /// # Errors
    /// Returns `KeyError` when the file is missing or too permissive, or the
    /// variable is unset or not valid base64.
    pub fn resolve(&self) -> Result<ResolvedKey, KeyError> {
        match self {
            KeySource::Path(path) => {
                check_permissions(path)?;
                Ok(ResolvedKey::Path(path.clone()))
            }
            KeySource::Agent => Ok(ResolvedKey::Agent),
            KeySource::Env(var) => {
                let encoded = env::var(var).map_err(|_| KeyError::EnvNotSet(var.clone()))?;
                let key = decode(&encoded)?;
                Ok(ResolvedKey::Temp(write_temp_key(var, &key)?))
            }
        }
    }
}

/// A key ready for use
#[derive(Debug)]
pub enum ResolvedKey {
    Path(PathBuf),
    Agent,
    /// Decoded from the environment; deleted on drop
    Temp(PathBuf),
}

impl ResolvedKey {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ResolvedKey::Path(p) | ResolvedKey::Temp(p) => Some(p),
            ResolvedKey::Agent => None,
        }
    }

    #[must_use]
    pub fn use_agent(&self) -> bool {
        matches!(self, ResolvedKey::Agent)
    }
}

impl Drop for ResolvedKey {
    fn drop(&mut self) {
        if let ResolvedKey::Temp(path) = self
            && let Err(e) = std::fs::remove_file(&*path)
        {
            warn!(path = %path.display(), error = %e, "failed to remove temp key");
        }
    }
}

/// Key resolution errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("key file not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn decode(input: &str) -> Result<Vec<u8>, KeyError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(input.trim())
        .map_err(|_| KeyError::InvalidBase64)
}

fn check_permissions(path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => KeyError::NotFound(path.display().to_string()),
        _ => KeyError::Io(e),
    })?;

    // group/other bits must be clear
    if metadata.permissions().mode() & 0o077 != 0 {
        return Err(KeyError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

fn write_temp_key(var: &str, key: &[u8]) -> Result<PathBuf, KeyError> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let path = env::temp_dir().join(format!(
        "stackfleet_{}_{}",
        var.to_lowercase(),
        std::process::id()
    ));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&path)?;
    file.write_all(key)?;

    debug!(path = %path.display(), "wrote temporary SSH key");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        assert_eq!(KeySource::from_config(None), KeySource::Agent);
        assert_eq!(KeySource::from_config(Some("  ")), KeySource::Agent);
        assert_eq!(
            KeySource::from_config(Some("env:FLEET_SSH_KEY")),
            KeySource::Env("FLEET_SSH_KEY".to_string())
        );
        assert_eq!(
            KeySource::from_config(Some("/home/ops/.ssh/id_ed25519")),
            KeySource::Path(PathBuf::from("/home/ops/.ssh/id_ed25519"))
        );
    }

    #[test]
    fn test_missing_key_file() {
        let source = KeySource::Path(PathBuf::from("/nonexistent/stackfleet/id_rsa"));
        assert!(matches!(source.resolve(), Err(KeyError::NotFound(_))));
    }

    #[test]
    fn test_unset_env_key() {
        let source = KeySource::Env("STACKFLEET_TEST_KEY_NEVER_SET".to_string());
        assert!(matches!(source.resolve(), Err(KeyError::EnvNotSet(_))));
    }

    #[test]
    fn test_agent_has_no_path() {
        let key = KeySource::Agent.resolve().unwrap();
        assert!(key.use_agent());
        assert!(key.path().is_none());
    }

    #[test]
    fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_ed25519");
        std::fs::write(&path, "not really a key").unwrap();

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        let source = KeySource::Path(path.clone());
        assert!(matches!(source.resolve(), Err(KeyError::BadPermissions(_))));

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
        let key = source.resolve().unwrap();
        assert_eq!(key.path(), Some(path.as_path()));
    }
}
