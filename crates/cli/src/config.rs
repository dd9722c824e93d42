//! Configuration file discovery for the CLI

use anyhow::{Context, Result};
use scoring_lib::ScoringConfig;
use std::path::{Path, PathBuf};

/// Default configuration file location (`~/.config/churn/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".config").join("churn").join("config.toml"))
}

/// Load scoring configuration
///
/// An explicit path must exist. Without one, the default location is used
/// when present; otherwise only built-in defaults and `CHURN__*`
/// environment variables apply.
pub fn load(explicit: Option<&Path>) -> Result<ScoringConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|p| p.is_file()),
    };

    ScoringConfig::load(path.as_deref()).with_context(|| match &path {
        Some(p) => format!("Failed to load config from {}", p.display()),
        None => "Failed to load config from environment".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_path_shape() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with(".config/churn/config.toml"));
        }
    }

    #[test]
    fn test_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "models_dir = \"/srv/churn/models\"").unwrap();
        writeln!(file, "output_file_name = \"scored.csv\"").unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.models_dir, PathBuf::from("/srv/churn/models"));
        assert_eq!(config.output_file_name, "scored.csv");
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        assert!(load(Some(Path::new("/nonexistent/churn.toml"))).is_err());
    }
}
