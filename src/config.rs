//! Fleet dispatch configuration.
//!
//! Loaded from `~/.fleet-dispatch/config.toml` when present, or from an
//! explicit `--config` path. Every key is optional.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result};
use crate::manifest::Manifest;
use crate::telemetry::LogFormat;

/// Default GitHub REST API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Fleet dispatch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// REST API root. Overridden in tests and for GitHub Enterprise.
    pub api_url: String,

    /// Per-request timeout.
    pub timeout_secs: u64,

    /// Extra attempts after a transport error. Zero sends each request once.
    pub transport_retries: u32,

    /// Delay before the first retry; later retries wait proportionally longer.
    pub retry_backoff_ms: u64,

    /// Exit non-zero when any target fails.
    pub fail_on_error: bool,

    /// Fleet manifest to use instead of the built-in one.
    pub manifest: Option<PathBuf>,

    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 30,
            transport_retries: 0,
            retry_backoff_ms: 500,
            fail_on_error: false,
            manifest: None,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Load config from `explicit`, or from the default path if it exists.
    ///
    /// A missing default file yields the defaults. A missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let Some(path) = Self::path() else {
            return Ok(Self::default());
        };

        match Self::load_from(&path) {
            Err(ConfigurationError::Read { source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Read and parse a config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigurationError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no request could be sent with.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ConfigurationError::InvalidSetting {
                key: "timeout-secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The config file path: `~/.fleet-dispatch/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".fleet-dispatch").join("config.toml"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// The manifest named by `explicit`, else by the config, else the built-in fleet.
    pub fn manifest(&self, explicit: Option<&Path>) -> Result<Manifest> {
        match explicit.or(self.manifest.as_deref()) {
            Some(path) => Manifest::load(path),
            None => Ok(Manifest::confluence()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "timeout-secs = 5\nfail-on-error = true\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(config.fail_on_error);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.transport_retries, 0);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigurationError::Read { .. }));
    }

    #[test]
    fn invalid_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "timeout-secs = \"soon\"").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse { .. }));
    }

    #[test]
    fn zero_timeout_is_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "timeout-secs = 0\n").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidSetting { key: "timeout-secs", .. }
        ));
    }

    #[test]
    fn log_format_parses_kebab_case() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "log-format = \"json\"").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().log_format, LogFormat::Json);
    }

    #[test]
    fn builtin_manifest_without_override() {
        let manifest = Config::default().manifest(None).unwrap();
        assert_eq!(manifest, Manifest::confluence());
    }

    #[test]
    fn explicit_manifest_beats_configured_one() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fleet.toml");
        fs::write(
            &path,
            "version = 1\nowner = \"acme\"\ninfrastructure = \"infra\"\ncontainers = []\nmodules = []\n",
        )
        .unwrap();

        let config = Config {
            manifest: Some(dir.path().join("missing.toml")),
            ..Config::default()
        };
        assert_eq!(config.manifest(Some(&path)).unwrap().owner, "acme");
    }
}
