//! Directory and network bootstrapping
//!
//! Everything here is create-if-absent. Concurrent callers may race on the
//! same directory or network; "already exists" always counts as success.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use stackfleet_compose::{ContainerRuntime, NetworkCreation, NetworkSpec};
use tracing::{debug, info, instrument, warn};

use crate::error::{CoreError, DeployStep};
use crate::profile::MachineProfile;

/// Owner assigned to directories the bootstrapper creates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryOwner {
    pub uid: u32,
    pub gid: u32,
}

impl DirectoryOwner {
    /// Build from `SUDO_UID`/`SUDO_GID` style values; both must parse
    #[must_use]
    pub fn from_ids(uid: Option<&str>, gid: Option<&str>) -> Option<Self> {
        Some(Self {
            uid: uid?.trim().parse().ok()?,
            gid: gid?.trim().parse().ok()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryOutcome {
    Created(PathBuf),
    Existing(PathBuf),
}

impl DirectoryOutcome {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            DirectoryOutcome::Created(p) | DirectoryOutcome::Existing(p) => p,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkOutcome {
    pub name: String,
    pub creation: NetworkCreation,
}

/// `dir` and each parent that does not exist yet, outermost first
async fn missing_ancestors(dir: &Path) -> Vec<PathBuf> {
    let mut missing = Vec::new();
    for path in dir.ancestors().filter(|p| !p.as_os_str().is_empty()) {
        if tokio::fs::metadata(path).await.is_ok() {
            break;
        }
        missing.push(path.to_path_buf());
    }
    missing.reverse();
    missing
}

/// Ensures a machine's directories and the shared networks exist
pub struct ResourceBootstrapper {
    runtime: Arc<dyn ContainerRuntime>,
    owner: Option<DirectoryOwner>,
}

impl ResourceBootstrapper {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            owner: None,
        }
    }

    /// Hand newly created directories to `owner` instead of the process user
    #[must_use]
    pub fn with_owner(mut self, owner: Option<DirectoryOwner>) -> Self {
        self.owner = owner;
        self
    }

    /// Create `base_dirs` then the profile's required directories, in order.
    ///
    /// # Errors
    /// Bootstrap step failure on the first directory that cannot be created
    /// or handed over
    #[instrument(skip_all, fields(machine = %profile.id))]
    pub async fn ensure(
        &self,
        profile: &MachineProfile,
        base_dirs: &[PathBuf],
    ) -> Result<Vec<DirectoryOutcome>, CoreError> {
        let mut outcomes = Vec::new();
        for dir in base_dirs.iter().chain(&profile.required_directories) {
            outcomes.push(self.ensure_dir(dir).await?);
        }
        Ok(outcomes)
    }

    async fn ensure_dir(&self, dir: &Path) -> Result<DirectoryOutcome, CoreError> {
        let fail = |e: std::io::Error| {
            CoreError::step(DeployStep::Bootstrap, format!("{}: {e}", dir.display()))
        };

        if tokio::fs::metadata(dir).await.is_ok_and(|m| m.is_dir()) {
            return Ok(DirectoryOutcome::Existing(dir.to_path_buf()));
        }

        let created = missing_ancestors(dir).await;
        tokio::fs::create_dir_all(dir).await.map_err(fail)?;
        if let Some(owner) = self.owner {
            for path in &created {
                std::os::unix::fs::chown(path, Some(owner.uid), Some(owner.gid)).map_err(fail)?;
            }
        }
        debug!(dir = %dir.display(), "created directory");
        Ok(DirectoryOutcome::Created(dir.to_path_buf()))
    }

    /// Make sure every network in `specs` exists.
    ///
    /// # Errors
    /// Networks step failure if the runtime cannot inspect or create a network
    #[instrument(skip_all)]
    pub async fn ensure_networks(
        &self,
        specs: &[NetworkSpec],
    ) -> Result<Vec<NetworkOutcome>, CoreError> {
        let mut outcomes = Vec::with_capacity(specs.len());
        for spec in specs {
            let exists = self
                .runtime
                .network_exists(&spec.name)
                .await
                .map_err(|e| CoreError::step(DeployStep::Networks, e))?;

            let creation = if exists {
                NetworkCreation::AlreadyExists
            } else {
                let creation = self
                    .runtime
                    .create_network(spec)
                    .await
                    .map_err(|e| CoreError::step(DeployStep::Networks, e))?;
                if creation == NetworkCreation::AlreadyExists {
                    warn!(network = %spec.name, "network appeared concurrently");
                } else {
                    info!(network = %spec.name, subnet = %spec.subnet, "created network");
                }
                creation
            };

            outcomes.push(NetworkOutcome {
                name: spec.name.clone(),
                creation,
            });
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_from_ids() {
        assert_eq!(
            DirectoryOwner::from_ids(Some("1000"), Some("100")),
            Some(DirectoryOwner { uid: 1000, gid: 100 })
        );
        assert_eq!(DirectoryOwner::from_ids(Some("1000"), None), None);
        assert_eq!(DirectoryOwner::from_ids(Some("root"), Some("0")), None);
    }

    #[tokio::test]
    async fn test_missing_ancestors_outermost_first() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("data/nginx/cache");
        assert_eq!(
            missing_ancestors(&dir).await,
            vec![
                root.path().join("data"),
                root.path().join("data/nginx"),
                dir.clone()
            ]
        );

        tokio::fs::create_dir_all(root.path().join("data")).await.unwrap();
        assert_eq!(
            missing_ancestors(&dir).await,
            vec![root.path().join("data/nginx"), dir.clone()]
        );

        tokio::fs::create_dir_all(&dir).await.unwrap();
        assert!(missing_ancestors(&dir).await.is_empty());
    }

    #[test]
    fn test_outcome_path() {
        let created = DirectoryOutcome::Created(PathBuf::from("data"));
        assert_eq!(created.path(), Path::new("data"));
    }
}
