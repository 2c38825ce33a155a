//! File-based configuration loading
//!
//! The format follows the file extension. An absent file means "use the
//! defaults"; an extension nothing can parse is an error rather than a guess.

use super::ConvoyConfig;
use crate::error::{ConvoyError, ConvoyResult};
use std::fs;
use std::path::Path;

/// Serialization formats a configuration file may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
    Yaml,
}

impl Format {
    fn of(path: &Path) -> ConvoyResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            other => Err(ConvoyError::config_with_context(
                format!(
                    "unsupported configuration format {:?}; use .json, .toml, .yaml or .yml",
                    other.unwrap_or("")
                ),
                format!("loading configuration from '{}'", path.display()),
            )),
        }
    }

    fn parse(self, content: &str) -> Result<ConvoyConfig, String> {
        match self {
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

/// Load configuration from a JSON, TOML or YAML file
pub fn load_from_file(path: &Path) -> ConvoyResult<ConvoyConfig> {
    let format = Format::of(path)?;
    let context = || format!("loading configuration from '{}'", path.display());

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ConvoyConfig::default()),
        Err(e) => return Err(ConvoyError::config_with_context(format!("cannot read file: {}", e), context())),
    };
    format
        .parse(&content)
        .map_err(|e| ConvoyError::config_with_context(format!("invalid {:?} configuration: {}", format, e), context()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_json_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("convoy.json");
        fs::write(
            &config_path,
            r#"{"presence": {"heartbeat_interval": "500ms", "staleness_window": "2s"}}"#,
        )
        .unwrap();

        let config = load_from_file(&config_path).unwrap();
        assert_eq!(config.presence.heartbeat_interval, Duration::from_millis(500));
        assert_eq!(config.presence.staleness_window, Duration::from_secs(2));
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("convoy.toml");
        fs::write(
            &config_path,
            "[hooks]\ntimeout = \"30s\"\nstate_dir = \"/var/lib/convoy\"\n",
        )
        .unwrap();

        let config = load_from_file(&config_path).unwrap();
        assert_eq!(config.hooks.timeout, Duration::from_secs(30));
        assert_eq!(config.hooks.state_dir, Path::new("/var/lib/convoy"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_from_file(&temp_dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, ConvoyConfig::default());
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("convoy.yaml");
        fs::write(&config_path, "presence: [not, a, map]").unwrap();

        let err = load_from_file(&config_path).unwrap_err();
        assert!(matches!(err, ConvoyError::Config { .. }));
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("convoy.ini");
        fs::write(&config_path, "{}").unwrap();

        let err = load_from_file(&config_path).unwrap_err();
        assert!(matches!(err, ConvoyError::Config { .. }));
        assert!(err.to_string().contains("unsupported configuration format"));
    }
}
