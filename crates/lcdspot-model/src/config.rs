use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use super::platform;

/// Largest HD44780 geometry in common use (4x40 modules are two controllers
/// and are not supported).
pub const MAX_ROWS: usize = 4;
pub const MAX_WIDTH: usize = 40;

/// Accepted range for `daemon.poll_interval_secs`.
pub const POLL_INTERVAL_RANGE: std::ops::RangeInclusive<f64> = 0.1..=86_400.0;
/// Upper bound for `daemon.splash_secs`.
pub const MAX_SPLASH_SECS: u64 = 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("missing Spotify credential `{0}` (set it in config.toml or the environment)")]
    MissingCredential(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,
    /// How long the host/IP screen stays up after start-up. 0 disables it.
    #[serde(default = "default_splash_secs")]
    pub splash_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayDriver {
    /// HD44780 behind a PCF8574 I2C backpack.
    #[default]
    Hd44780,
    /// Logs frames instead of driving hardware.
    Log,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub driver: DisplayDriver,
    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: u8,
    #[serde(default = "default_address")]
    pub address: u8,
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_rows")]
    pub rows: usize,
    /// Initial backlight preference, toggled at runtime with SIGUSR1.
    #[serde(default = "default_backlight")]
    pub backlight: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default = "default_token_cache")]
    pub token_cache: PathBuf,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: f64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_accounts_base")]
    pub accounts_base: String,
}

/// Credentials resolved from config and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            splash_secs: default_splash_secs(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            driver: DisplayDriver::default(),
            i2c_bus: default_i2c_bus(),
            address: default_address(),
            width: default_width(),
            rows: default_rows(),
            backlight: default_backlight(),
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            token_cache: default_token_cache(),
            request_timeout_secs: default_request_timeout_secs(),
            api_base: default_api_base(),
            accounts_base: default_accounts_base(),
        }
    }
}

fn default_poll_interval_secs() -> f64 {
    2.0
}

fn default_splash_secs() -> u64 {
    10
}

fn default_i2c_bus() -> u8 {
    1
}

fn default_address() -> u8 {
    0x27
}

fn default_width() -> usize {
    16
}

fn default_rows() -> usize {
    2
}

fn default_backlight() -> bool {
    true
}

fn default_token_cache() -> PathBuf {
    platform::data_dir().join("spotify-token.json")
}

fn default_request_timeout_secs() -> f64 {
    1.5
}

fn default_api_base() -> String {
    "https://api.spotify.com".to_string()
}

fn default_accounts_base() -> String {
    "https://accounts.spotify.com".to_string()
}

impl Config {
    /// Loads the config from `path`, or from the default location. A missing
    /// default config is created with default values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
                path: config_path.clone(),
                source,
            })?;
            Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
                path: config_path.clone(),
                source,
            })?
        } else if path.is_some() {
            return Err(ConfigError::Io {
                path: config_path,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        } else {
            let config = Self::default();
            config.save(&config_path)?;
            info!("Wrote default config to {:?}", config_path);
            config
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn save(&self, config_path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content).map_err(|source| ConfigError::Io {
            path: config_path.to_path_buf(),
            source,
        })
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Overrides credentials from `SPOTIPY_*` variables, the names the
    /// original launcher scripts exported.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = [
            ("SPOTIPY_CLIENT_ID", &mut self.spotify.client_id),
            ("SPOTIPY_CLIENT_SECRET", &mut self.spotify.client_secret),
            ("SPOTIPY_REDIRECT_URI", &mut self.spotify.redirect_uri),
        ];
        for (key, slot) in vars {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = Some(value);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let poll = self.daemon.poll_interval_secs;
        if !POLL_INTERVAL_RANGE.contains(&poll) {
            return Err(ConfigError::Invalid(format!(
                "daemon.poll_interval_secs must be between {} and {}, got {}",
                POLL_INTERVAL_RANGE.start(),
                POLL_INTERVAL_RANGE.end(),
                poll
            )));
        }
        if self.daemon.splash_secs > MAX_SPLASH_SECS {
            return Err(ConfigError::Invalid(format!(
                "daemon.splash_secs must be at most {}, got {}",
                MAX_SPLASH_SECS, self.daemon.splash_secs
            )));
        }

        let timeout = self.spotify.request_timeout_secs;
        if !timeout.is_finite() || timeout <= 0.0 || timeout >= poll {
            return Err(ConfigError::Invalid(format!(
                "spotify.request_timeout_secs must be positive and shorter than the poll interval ({}s), got {}",
                poll, timeout
            )));
        }

        let display = &self.display;
        if display.width == 0 || display.width > MAX_WIDTH {
            return Err(ConfigError::Invalid(format!(
                "display.width must be between 1 and {}, got {}",
                MAX_WIDTH, display.width
            )));
        }
        if display.rows == 0 || display.rows > MAX_ROWS {
            return Err(ConfigError::Invalid(format!(
                "display.rows must be between 1 and {}, got {}",
                MAX_ROWS, display.rows
            )));
        }
        if display.address > 0x7f {
            return Err(ConfigError::Invalid(format!(
                "display.address {:#x} is not a 7-bit I2C address",
                display.address
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.daemon.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.spotify.request_timeout_secs)
    }

    pub fn splash_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.daemon.splash_secs)
    }
}

impl SpotifyConfig {
    pub fn credentials(&self) -> Result<SpotifyCredentials, ConfigError> {
        fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(ConfigError::MissingCredential(name))
        }

        Ok(SpotifyCredentials {
            client_id: required(&self.client_id, "client_id")?,
            client_secret: required(&self.client_secret, "client_secret")?,
            redirect_uri: required(&self.redirect_uri, "redirect_uri")?,
        })
    }
}
