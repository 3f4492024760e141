//! Configuration management for the TextLift client

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::session::SessionMode;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub file: PathBuf,
    pub mode: SessionMode,
    /// Session lifetime used when the server does not report one
    pub ttl_secs: u64,
    pub skew_ms: u64,
    pub clear_on_forbidden: bool,
    pub login_path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig {
                base_url: "http://localhost:8080".to_string(),
                timeout_secs: 60,
            },
            session: SessionConfig {
                file: default_session_file(),
                mode: SessionMode::Token,
                ttl_secs: 3600,
                skew_ms: 30_000,
                clear_on_forbidden: true,
                login_path: "/login".to_string(),
            },
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn skew(&self) -> Duration {
        Duration::from_millis(self.skew_ms)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            api: ApiConfig {
                base_url: env::var("TEXTLIFT_API_URL").unwrap_or(defaults.api.base_url),
                timeout_secs: parse_var("TEXTLIFT_TIMEOUT_SECS", defaults.api.timeout_secs)?,
            },
            session: SessionConfig {
                file: env::var("TEXTLIFT_SESSION_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.session.file),
                mode: match env::var("TEXTLIFT_SESSION_MODE") {
                    Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: "TEXTLIFT_SESSION_MODE",
                        value,
                    })?,
                    Err(_) => defaults.session.mode,
                },
                ttl_secs: parse_var("TEXTLIFT_SESSION_TTL_SECS", defaults.session.ttl_secs)?,
                skew_ms: parse_var("TEXTLIFT_SKEW_MS", defaults.session.skew_ms)?,
                clear_on_forbidden: parse_var(
                    "TEXTLIFT_CLEAR_ON_FORBIDDEN",
                    defaults.session.clear_on_forbidden,
                )?,
                login_path: env::var("TEXTLIFT_LOGIN_PATH").unwrap_or(defaults.session.login_path),
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(default),
    }
}

fn default_session_file() -> PathBuf {
    env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir())
        .join(".textlift")
        .join("session.json")
}
