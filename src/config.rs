use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_REFRESH_SECS: f64 = 2.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file {path} does not exist")]
    Missing { path: PathBuf },

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 900.0,
            height: 600.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub auto_refresh: bool,
    pub refresh_interval_secs: f64,
    pub window: WindowConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            auto_refresh: true,
            refresh_interval_secs: DEFAULT_REFRESH_SECS,
            window: WindowConfig::default(),
        }
    }
}

impl Config {
    /// Loads `path`, or the file in the home config directory when no path is given.
    /// Any problem with the file is logged and the defaults are used instead. Only an
    /// explicitly requested file is expected to exist.
    pub fn load(path: Option<&Path>) -> Config {
        let explicit = path.is_some();
        let path = path.map(Path::to_path_buf).unwrap_or_else(get_home_config);
        match Config::load_from(&path) {
            Ok(config) => config,
            Err(ConfigError::Missing { path }) if !explicit => {
                info!(path = %path.display(), "no config file, using defaults");
                Config::default()
            }
            Err(e) => {
                warn!(error = %e, "using default configuration");
                Config::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Missing {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str::<Config>(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn refresh_interval(&self) -> Duration {
        match Duration::try_from_secs_f64(self.refresh_interval_secs) {
            Ok(interval) if !interval.is_zero() => interval,
            _ => {
                warn!(
                    refresh_interval_secs = self.refresh_interval_secs,
                    "invalid refresh interval, using default"
                );
                Duration::from_secs_f64(DEFAULT_REFRESH_SECS)
            }
        }
    }
}

fn get_home_config() -> PathBuf {
    //home directory
    if let Some(mut dir) = dirs::home_dir() {
        dir.push(".config");
        dir.push("taskman");
        dir.push("config.toml");
        return dir;
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_reported_and_load_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Missing { .. })
        ));
        assert_eq!(Config::load(Some(&path)), Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "auto_refresh = false\n[window]\nwidth = 1200.0\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(!config.auto_refresh);
        assert_eq!(config.refresh_interval(), Duration::from_secs(2));
        assert_eq!(config.window.width, 1200.0);
        assert_eq!(config.window.height, 600.0);
    }

    #[test]
    fn invalid_file_is_a_parse_error_and_load_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "refresh_interval_secs = \"soon\"").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert_eq!(Config::load(Some(&path)), Config::default());
    }

    #[test]
    fn non_positive_interval_falls_back() {
        let config = Config {
            refresh_interval_secs: -1.0,
            ..Config::default()
        };
        assert_eq!(config.refresh_interval(), Duration::from_secs(2));

        let config = Config {
            refresh_interval_secs: 0.5,
            ..Config::default()
        };
        assert_eq!(config.refresh_interval(), Duration::from_millis(500));
    }
}
