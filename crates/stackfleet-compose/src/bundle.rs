//! Bundle descriptor inspection

use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::error::ComposeError;

/// One service entry of a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleService {
    pub name: String,
    /// Whether the service carries a `build` directive
    pub builds: bool,
}

/// The parts of a compose file the provisioner cares about
#[derive(Debug, Clone)]
pub struct BundleDescriptor {
    path: PathBuf,
    services: Vec<BundleService>,
}

impl BundleDescriptor {
    /// Read and inspect the compose file at `path`
    ///
    /// # Errors
    /// `BundleNotFound` if the file is missing, `InvalidBundle` if it does not parse
    pub async fn load(path: &Path) -> Result<Self, ComposeError> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ComposeError::BundleNotFound(path.to_path_buf())
            } else {
                ComposeError::InvalidBundle {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            }
        })?;
        Self::parse(path, &text)
    }

    /// Inspect compose YAML already in memory
    ///
    /// # Errors
    /// `InvalidBundle` if `text` is not YAML
    pub fn parse(path: &Path, text: &str) -> Result<Self, ComposeError> {
        let doc: Value = serde_yaml::from_str(text).map_err(|e| ComposeError::InvalidBundle {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let services = doc
            .get("services")
            .and_then(Value::as_mapping)
            .map(|services| {
                services
                    .iter()
                    .filter_map(|(name, body)| {
                        Some(BundleService {
                            name: name.as_str()?.to_string(),
                            builds: body.get("build").is_some_and(|b| !b.is_null()),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            services,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn services(&self) -> &[BundleService] {
        &self.services
    }

    /// Whether any service declares inline build instructions
    #[must_use]
    pub fn has_build_directive(&self) -> bool {
        self.services.iter().any(|s| s.builds)
    }

    /// Names of the services with a build directive, in file order
    #[must_use]
    pub fn build_services(&self) -> Vec<&str> {
        self.services
            .iter()
            .filter(|s| s.builds)
            .map(|s| s.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EDGE: &str = r#"
services:
  nginx:
    image: nginx:1.27-alpine
    ports: ["80:80", "443:443"]
  context7:
    build:
      context: ../../openapi-servers/context7
    image: stackfleet/context7:latest
networks:
  default:
    name: stackfleet-frontend
    external: true
"#;

    #[test]
    fn test_detects_build_directive() {
        let bundle = BundleDescriptor::parse(Path::new("edge.yml"), EDGE).unwrap();
        assert!(bundle.has_build_directive());
        assert_eq!(bundle.services().len(), 2);
        assert!(!bundle.services()[0].builds);
        assert_eq!(bundle.build_services(), vec!["context7"]);
    }

    #[test]
    fn test_image_only_bundle() {
        let yaml = "services:\n  postgres:\n    image: postgres:16\n  redis:\n    image: redis:7\n";
        let bundle = BundleDescriptor::parse(Path::new("db.yml"), yaml).unwrap();
        assert!(!bundle.has_build_directive());
        assert!(bundle.build_services().is_empty());
    }

    #[test]
    fn test_invalid_yaml() {
        let err = BundleDescriptor::parse(Path::new("bad.yml"), "services: [unclosed").unwrap_err();
        assert!(matches!(err, ComposeError::InvalidBundle { .. }));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BundleDescriptor::load(&dir.path().join("missing.yml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::BundleNotFound(_)));
    }
}
