//! Configuration template rendering

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::error::{CoreError, DeployStep};

/// The only token substituted in templates
pub const DOMAIN_PLACEHOLDER: &str = "${DOMAIN}";

/// Domain used when neither the environment file nor settings name one
pub const DEFAULT_DOMAIN: &str = ".local";

/// Pick the deployment domain: `DOMAIN` from the environment file, then the
/// configured fallback, then [`DEFAULT_DOMAIN`]. Blank values count as unset.
#[must_use]
pub fn resolve_domain(env: &HashMap<String, String>, configured: Option<&str>) -> String {
    fn non_blank(v: &str) -> Option<&str> {
        Some(v.trim()).filter(|d| !d.is_empty())
    }
    env.get("DOMAIN")
        .and_then(|v| non_blank(v))
        .or_else(|| configured.and_then(non_blank))
        .unwrap_or(DEFAULT_DOMAIN)
        .to_string()
}

/// Replace every occurrence of [`DOMAIN_PLACEHOLDER`] with `domain`
#[must_use]
pub fn substitute(template: &str, domain: &str) -> String {
    template.replace(DOMAIN_PLACEHOLDER, domain)
}

/// Backup path written before an existing output is overwritten
#[must_use]
pub fn backup_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Renders configuration artifacts for one domain
#[derive(Debug, Clone)]
pub struct TemplateProcessor {
    domain: String,
}

impl TemplateProcessor {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    /// Render `template` into `output`, keeping the previous output as `<output>.bak`.
    ///
    /// # Errors
    /// `TemplateNotFound` if the template is missing; any other I/O failure is
    /// a render step failure
    #[instrument(skip(self), fields(domain = %self.domain))]
    pub async fn render(&self, template: &Path, output: &Path) -> Result<(), CoreError> {
        let text = tokio::fs::read_to_string(template).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::TemplateNotFound(template.to_path_buf())
            } else {
                CoreError::step(DeployStep::Render, format!("{}: {e}", template.display()))
            }
        })?;

        let io_err = |path: &Path, e: std::io::Error| {
            CoreError::step(DeployStep::Render, format!("{}: {e}", path.display()))
        };

        if tokio::fs::try_exists(output).await.unwrap_or(false) {
            let backup = backup_path(output);
            tokio::fs::copy(output, &backup)
                .await
                .map_err(|e| io_err(&backup, e))?;
            debug!(backup = %backup.display(), "previous output backed up");
        }

        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }

        tokio::fs::write(output, substitute(&text, &self.domain))
            .await
            .map_err(|e| io_err(output, e))?;
        debug!(output = %output.display(), "template rendered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_only_domain() {
        let out = substitute(
            "server_name ${DOMAIN} api.${DOMAIN}; root ${ROOT};",
            "fleet.example.com",
        );
        assert_eq!(
            out,
            "server_name fleet.example.com api.fleet.example.com; root ${ROOT};"
        );
    }

    #[test]
    fn test_resolve_domain_precedence() {
        let mut env = HashMap::new();
        assert_eq!(resolve_domain(&env, None), ".local");
        assert_eq!(resolve_domain(&env, Some("cfg.example")), "cfg.example");

        env.insert("DOMAIN".to_string(), "env.example".to_string());
        assert_eq!(resolve_domain(&env, Some("cfg.example")), "env.example");

        env.insert("DOMAIN".to_string(), "  ".to_string());
        assert_eq!(resolve_domain(&env, Some("cfg.example")), "cfg.example");
        assert_eq!(resolve_domain(&env, None), ".local");
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(
            backup_path(Path::new("config/nginx/nginx.conf")),
            PathBuf::from("config/nginx/nginx.conf.bak")
        );
    }

    #[tokio::test]
    async fn test_render_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let processor = TemplateProcessor::new("example.com");
        let err = processor
            .render(&dir.path().join("nope.template"), &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::TemplateNotFound(_)));
        assert!(!dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_render_creates_parent_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("nginx.conf.template");
        let output = dir.path().join("conf/nginx.conf");
        std::fs::write(&template, "server_name ${DOMAIN};\n").unwrap();

        let processor = TemplateProcessor::new("a.example");
        processor.render(&template, &output).await.unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "server_name a.example;\n");
        assert!(!backup_path(&output).exists());

        TemplateProcessor::new("b.example")
            .render(&template, &output)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "server_name b.example;\n");
        assert_eq!(
            std::fs::read_to_string(backup_path(&output)).unwrap(),
            "server_name a.example;\n"
        );
    }
}
