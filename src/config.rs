//! Run configuration
//!
//! Values come from three layers, highest priority first: command-line
//! flags, an optional `depimpact.toml`, and built-in defaults.

use crate::error::ConfigError;
use crate::fixer::{
    DEFAULT_API_KEY_ENV, DEFAULT_FIXER_ENDPOINT, DEFAULT_FIXER_MODEL,
    DEFAULT_MAX_FIXES_PER_PACKAGE,
};
use crate::registry::PYPI_API_URL;
use crate::stream::{DEFAULT_CONCURRENCY, DEFAULT_POLL_INTERVAL};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Config file looked up in the repository root when `--config` is absent
pub const CONFIG_FILE_NAME: &str = "depimpact.toml";

/// Parse a duration string such as `30s`, `5m` or `1h`
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration {
        value: s.to_string(),
    };

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 60 * 60)
    } else {
        return Err(invalid());
    };

    let num: u64 = num_str.trim().parse().map_err(|_| invalid())?;
    if num == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs(num * multiplier))
}

/// `[fixer]` table of the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixerFileConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub max_fixes_per_package: Option<usize>,
}

/// Contents of `depimpact.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub exclude_dirs: Option<Vec<String>>,
    pub poll_interval: Option<String>,
    pub concurrency: Option<usize>,
    pub registry_url: Option<String>,
    pub fixer: Option<FixerFileConfig>,
}

impl FileConfig {
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(path, &content)
    }

    /// Loads `explicit` if given (it must exist), otherwise `depimpact.toml`
    /// in `root` when present
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Option<Self>, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path).map(Some);
        }
        let candidate = root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            debug!("Using config file {}", candidate.display());
            return Self::load(&candidate).map(Some);
        }
        Ok(None)
    }
}

/// Values given on the command line; `None` means not given
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub exclude_dirs: Vec<String>,
    pub poll_interval: Option<Duration>,
    pub concurrency: Option<usize>,
    pub registry_url: Option<String>,
}

/// Resolved fixer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixerSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub max_fixes_per_package: usize,
}

impl Default for FixerSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_FIXER_ENDPOINT.to_string(),
            model: DEFAULT_FIXER_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            max_fixes_per_package: DEFAULT_MAX_FIXES_PER_PACKAGE,
        }
    }
}

/// Fully resolved settings for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory names skipped in addition to the scanner defaults
    pub exclude_dirs: Vec<String>,
    pub poll_interval: Duration,
    pub concurrency: usize,
    pub registry_url: String,
    pub fixer: FixerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exclude_dirs: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            concurrency: DEFAULT_CONCURRENCY,
            registry_url: PYPI_API_URL.to_string(),
            fixer: FixerSettings::default(),
        }
    }
}

impl Settings {
    /// Layers `overrides` over `file` over defaults and validates the result
    ///
    /// Exclusion lists from the file and the command line are combined.
    pub fn resolve(overrides: &Overrides, file: Option<FileConfig>) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        let mut exclude_dirs = file.exclude_dirs.unwrap_or_default();
        exclude_dirs.extend(overrides.exclude_dirs.iter().cloned());

        let poll_interval = match (overrides.poll_interval, file.poll_interval.as_deref()) {
            (Some(interval), _) => interval,
            (None, Some(raw)) => parse_duration(raw)?,
            (None, None) => defaults.poll_interval,
        };

        let concurrency = overrides
            .concurrency
            .or(file.concurrency)
            .unwrap_or(defaults.concurrency);
        if concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "concurrency".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let registry_url = overrides
            .registry_url
            .clone()
            .or(file.registry_url)
            .unwrap_or(defaults.registry_url);
        validate_url("registry_url", &registry_url)?;

        let fixer_file = file.fixer.unwrap_or_default();
        let fixer = FixerSettings {
            endpoint: fixer_file.endpoint.unwrap_or(defaults.fixer.endpoint),
            model: fixer_file.model.unwrap_or(defaults.fixer.model),
            api_key_env: fixer_file.api_key_env.unwrap_or(defaults.fixer.api_key_env),
            max_fixes_per_package: fixer_file
                .max_fixes_per_package
                .unwrap_or(defaults.fixer.max_fixes_per_package),
        };
        validate_url("fixer.endpoint", &fixer.endpoint)?;

        Ok(Self {
            exclude_dirs,
            poll_interval,
            concurrency,
            registry_url,
            fixer,
        })
    }
}

fn validate_url(key: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{}' is not an http(s) URL", url),
        })
    }
}

/// Checks that the repository path is an existing directory
pub fn validate_repository(path: &Path) -> Result<PathBuf, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::InvalidPath {
            path: path.to_path_buf(),
            message: "does not exist".to_string(),
        });
    }
    if !path.is_dir() {
        return Err(ConfigError::InvalidPath {
            path: path.to_path_buf(),
            message: "is not a directory".to_string(),
        });
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration(" 10s ").unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_duration_invalid() {
        for value in ["", "30", "abc", "5d", "-5s", "0s", "1.5m"] {
            assert!(
                matches!(parse_duration(value), Err(ConfigError::InvalidDuration { .. })),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn test_file_config_parse_full() {
        let content = r#"
exclude_dirs = ["migrations"]
poll_interval = "1m"
concurrency = 4
registry_url = "https://mirror.example/pypi"

[fixer]
endpoint = "http://localhost:8080/v1/chat/completions"
model = "local-model"
api_key_env = "LOCAL_KEY"
max_fixes_per_package = 3
"#;
        let config = FileConfig::parse(Path::new("depimpact.toml"), content).unwrap();
        assert_eq!(config.exclude_dirs, Some(vec!["migrations".to_string()]));
        assert_eq!(config.concurrency, Some(4));
        assert_eq!(config.fixer.unwrap().model.as_deref(), Some("local-model"));
    }

    #[test]
    fn test_file_config_rejects_unknown_keys() {
        let result = FileConfig::parse(Path::new("depimpact.toml"), "colour = true\n");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_resolve_defaults() {
        let settings = Settings::resolve(&Overrides::default(), None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(settings.registry_url, PYPI_API_URL);
    }

    #[test]
    fn test_resolve_cli_over_file_over_defaults() {
        let file = FileConfig {
            exclude_dirs: Some(vec!["migrations".to_string()]),
            poll_interval: Some("2m".to_string()),
            concurrency: Some(4),
            registry_url: None,
            fixer: Some(FixerFileConfig {
                model: Some("m".to_string()),
                ..Default::default()
            }),
        };
        let overrides = Overrides {
            exclude_dirs: vec!["fixtures".to_string()],
            poll_interval: Some(Duration::from_secs(10)),
            concurrency: None,
            registry_url: Some("http://localhost:3141/pypi".to_string()),
        };
        let settings = Settings::resolve(&overrides, Some(file)).unwrap();
        assert_eq!(settings.exclude_dirs, vec!["migrations", "fixtures"]);
        assert_eq!(settings.poll_interval, Duration::from_secs(10));
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.registry_url, "http://localhost:3141/pypi");
        assert_eq!(settings.fixer.model, "m");
        assert_eq!(settings.fixer.endpoint, DEFAULT_FIXER_ENDPOINT);
    }

    #[test]
    fn test_resolve_file_interval() {
        let file = FileConfig {
            poll_interval: Some("1h".to_string()),
            ..Default::default()
        };
        let settings = Settings::resolve(&Overrides::default(), Some(file)).unwrap();
        assert_eq!(settings.poll_interval, Duration::from_secs(3600));
    }

    #[test]
    fn test_resolve_rejects_bad_values() {
        let zero = Overrides {
            concurrency: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            Settings::resolve(&zero, None),
            Err(ConfigError::InvalidValue { .. })
        ));

        let bad_url = Overrides {
            registry_url: Some("ftp://example".to_string()),
            ..Default::default()
        };
        assert!(Settings::resolve(&bad_url, None).is_err());

        let bad_interval = FileConfig {
            poll_interval: Some("soon".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            Settings::resolve(&Overrides::default(), Some(bad_interval)),
            Err(ConfigError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_discover_root_file() {
        let dir = TempDir::new().unwrap();
        assert!(FileConfig::discover(dir.path(), None).unwrap().is_none());
        fs::write(dir.path().join(CONFIG_FILE_NAME), "concurrency = 2\n").unwrap();
        let config = FileConfig::discover(dir.path(), None).unwrap().unwrap();
        assert_eq!(config.concurrency, Some(2));
    }

    #[test]
    fn test_discover_explicit_missing_is_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            FileConfig::discover(dir.path(), Some(&missing)),
            Err(ConfigError::ReadError { .. })
        ));
    }

    #[test]
    fn test_validate_repository() {
        let dir = TempDir::new().unwrap();
        assert!(validate_repository(dir.path()).is_ok());
        let file = dir.path().join("f.txt");
        fs::write(&file, "").unwrap();
        assert!(matches!(
            validate_repository(&file),
            Err(ConfigError::InvalidPath { .. })
        ));
        assert!(validate_repository(&dir.path().join("missing")).is_err());
    }
}
