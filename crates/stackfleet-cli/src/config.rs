//! Settings file discovery and loading

use std::path::{Path, PathBuf};

use eyre::WrapErr;
use stackfleet_core::Settings;

/// Read settings from one file
///
/// # Errors
/// Returns error if the file cannot be read or parsed
pub fn load(path: &Path) -> eyre::Result<Settings> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&content).wrap_err_with(|| format!("invalid settings in {}", path.display()))
}

/// Files tried when no path is given, in order
#[must_use]
pub fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("stackfleet.toml"),
        PathBuf::from("/etc/stackfleet/stackfleet.toml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("stackfleet/stackfleet.toml"));
    }
    paths
}

/// Load `explicit` if given (it must exist), else the first default path
/// that exists, else built-in defaults.
///
/// # Errors
/// Returns error if the chosen file cannot be read or parsed
pub fn load_settings(explicit: Option<&Path>) -> eyre::Result<Settings> {
    if let Some(path) = explicit {
        return load(path);
    }

    match default_paths().into_iter().find(|p| p.is_file()) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading settings");
            load(&path)
        }
        None => {
            tracing::debug!("no settings file found, using defaults");
            Ok(Settings::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.toml");
        std::fs::write(
            &path,
            "[deploy]\nroot = \"/srv/stackfleet\"\n\n[registry]\nmax_retries = 2\n",
        )
        .unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.deploy.root, PathBuf::from("/srv/stackfleet"));
        assert_eq!(settings.registry.max_retries, 2);
        assert_eq!(settings.registry.url, "http://localhost:8090");
    }

    #[test]
    fn test_explicit_missing_or_invalid() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_settings(Some(&dir.path().join("nope.toml"))).is_err());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[deploy\n").unwrap();
        assert!(load_settings(Some(&bad)).is_err());
    }
}
