//! Configuration loading for rpv.
//!
//! Configuration is loaded from a TOML file: `--config <path>` if given,
//! otherwise `rpv.toml` in the platform config directory. A missing default
//! file means built-in defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration for rpv.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Report output.
    #[serde(default)]
    pub output: OutputConfig,
    /// Log filtering.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Case runner.
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Report output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Print JSON reports instead of text (default: false).
    #[serde(default = "default_json")]
    pub json: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter used when neither `-v` nor `RUST_LOG` is set
    /// (default: "warn").
    #[serde(default = "default_level")]
    pub level: String,
}

/// Runner configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Stop at the first failing volume or case (default: false).
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,
    /// Snapshot used when `--snapshot` is omitted.
    pub snapshot: Option<PathBuf>,
}

fn default_json() -> bool {
    false
}

fn default_level() -> String {
    "warn".to_string()
}

fn default_fail_fast() -> bool {
    false
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json: default_json(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            fail_fast: default_fail_fast(),
            snapshot: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `explicit` if given, else the default file if it exists, else
    /// defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// `rpv.toml` in the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "rpv", "rpv").map(|dirs| dirs.config_dir().join("rpv.toml"))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(!config.output.json);
        assert_eq!(config.logging.level, "warn");
        assert!(!config.runner.fail_fast);
        assert!(config.runner.snapshot.is_none());
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[output]
json = true

[logging]
level = "rpv_core=debug,info"

[runner]
fail_fast = true
snapshot = "/data/cluster.json"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.output.json);
        assert_eq!(config.logging.level, "rpv_core=debug,info");
        assert!(config.runner.fail_fast);
        assert_eq!(
            config.runner.snapshot,
            Some(PathBuf::from("/data/cluster.json"))
        );
    }

    #[test]
    fn sections_are_optional() {
        let config: Config = toml::from_str("[runner]\nfail_fast = true\n").unwrap();
        assert!(config.runner.fail_fast);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn unknown_section_rejected() {
        assert!(toml::from_str::<Config>("[server]\nport = 1\n").is_err());
    }

    #[test]
    fn from_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\njson = \"yes\"").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
