//! Client configuration.
//!
//! Plain `key=value` lines, `#` comments, optional quotes around values.
//! Precedence: CLI flags and environment > `--config` file > default file > defaults.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::UserId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("invalid config line: {0}")]
    InvalidLine(String),
    #[error("invalid boolean value for {key}: {value}")]
    InvalidBool { key: String, value: String },
    #[error("invalid integer value for {key}: {value}")]
    InvalidInt { key: String, value: String },
    #[error("invalid URL for {key}: {value}")]
    InvalidUrl { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the SkillSwap API, including the `/api` prefix.
    pub api_url: String,
    /// Bearer token passed through to the API.
    pub token: Option<String>,
    /// The signed-in user; required for role-gated operations.
    pub user_id: Option<UserId>,
    /// Per-request timeout; must be positive.
    pub request_timeout_sec: u64,
    /// Caller-side cap on session notes.
    pub notes_max_chars: usize,
    /// Open (or show) the session right after accepting a request.
    pub accept_opens_session: bool,
}

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            user_id: None,
            request_timeout_sec: 30,
            notes_max_chars: crate::validate::MAX_NOTES_CHARS,
            accept_opens_session: false,
        }
    }
}

impl Config {
    /// `~/.config/skillswap/config` (platform equivalent via `dirs`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("skillswap").join("config"))
    }

    /// Load config from a file, merging with defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.load_file(path)?;
        Ok(config)
    }

    /// Load the explicit file if given, else the default file when it exists.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Load and merge values from a config file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        self.parse_content(&content)
    }

    fn parse_content(&mut self, content: &str) -> Result<(), ConfigError> {
        for line in content.lines() {
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine(line.to_string()));
            };

            let key = key.trim();
            let value = Self::unquote(value.trim());

            self.apply_value(key, &value)?;
        }
        Ok(())
    }

    fn unquote(value: &str) -> String {
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            return value[1..value.len() - 1].to_string();
        }
        value.to_string()
    }

    fn apply_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "api_url" => {
                if url::Url::parse(value).is_err() {
                    return Err(ConfigError::InvalidUrl {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
                self.api_url = value.trim_end_matches('/').to_string();
            }
            "token" => {
                self.token = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "user_id" => {
                self.user_id = Some(UserId(Self::parse_int(key, value)?));
            }
            "request_timeout_sec" => {
                let secs: u64 = Self::parse_int(key, value)?;
                if secs == 0 {
                    return Err(ConfigError::InvalidInt {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
                self.request_timeout_sec = secs;
            }
            "notes_max_chars" => self.notes_max_chars = Self::parse_int(key, value)?,
            "accept_opens_session" => self.accept_opens_session = Self::parse_bool(key, value)?,
            _ => {
                // Unknown keys are tolerated so older clients can share a file.
                eprintln!("Warning: unknown config key: {key}");
            }
        }
        Ok(())
    }

    fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
        value.parse().map_err(|_| ConfigError::InvalidInt {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "y" | "on" => Ok(true),
            "false" | "0" | "no" | "n" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }
}
