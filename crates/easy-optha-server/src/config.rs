//! Service configuration.
//!
//! Loaded from an optional TOML file, then overlaid with `EASY_OPTHA_`
//! environment variables. Nested keys use `__`, e.g.
//! `EASY_OPTHA_SERVER__PORT=8080` or `EASY_OPTHA_LOG__FORMAT=structured`.

use std::fmt::Display;
use std::io::IsTerminal;
use std::net::SocketAddr;
use std::time::Duration;

use clap::ValueEnum;
use config::{Config as ConfigBuilder, Environment, File};
use serde::Deserialize;

use crate::error::ServerError;

pub const ENV_PREFIX: &str = "EASY_OPTHA";
pub const DEFAULT_CONFIG_FILE: &str = "easy-optha.toml";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub inference: InferenceConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,

    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,

    /// Front-end origin allowed to call with credentials
    #[serde(default = "ServerConfig::default_allowed_origin")]
    pub allowed_origin: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "DatabaseConfig::default_path")]
    pub path: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "InferenceConfig::default_fundus_url")]
    pub fundus_url: String,

    #[serde(default = "InferenceConfig::default_oct_url")]
    pub oct_url: String,

    #[serde(default = "InferenceConfig::default_history_url")]
    pub history_url: String,

    /// Per-call timeout; none when unset
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LogConfig {
    #[serde(default = "LogConfig::default_log_level")]
    pub level: LogLevel,

    #[serde(default = "LogConfig::default_log_format")]
    pub format: LogFormat,

    #[serde(default = "LogConfig::default_ansi_enabled")]
    pub ansi_enabled: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[serde(alias = "Pretty", alias = "PRETTY")]
    Pretty,
    #[serde(alias = "Structured", alias = "STRUCTURED", alias = "json")]
    Structured,
    #[serde(alias = "Text", alias = "TEXT")]
    Text,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[serde(alias = "Error", alias = "ERROR")]
    Error,
    #[serde(alias = "Warn", alias = "WARN")]
    Warn,
    #[serde(alias = "Info", alias = "INFO")]
    Info,
    #[serde(alias = "Debug", alias = "DEBUG")]
    Debug,
    #[serde(alias = "Trace", alias = "TRACE")]
    Trace,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        write!(f, "{s}")
    }
}

impl Config {
    /// Load from `path` (missing file is fine) and the environment.
    pub fn build(path: &str) -> Result<Self, ServerError> {
        let env_source = Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .separator("__")
            .prefix_separator("_");

        let config: Self = ConfigBuilder::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(env_source)
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load, then apply command-line overrides.
    pub fn load(
        path: &str,
        log_level: Option<LogLevel>,
        log_format: Option<LogFormat>,
    ) -> Result<Self, ServerError> {
        let mut config = Self::build(path)?;

        if let Some(level) = log_level {
            config.log.level = level;
        }
        if let Some(format) = log_format {
            config.log.format = format;
        }

        Ok(config)
    }
}

impl ServerConfig {
    pub fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    pub const fn default_port() -> u16 {
        3000
    }

    pub fn default_allowed_origin() -> String {
        "http://localhost:5173".to_string()
    }

    pub fn address(&self) -> Result<SocketAddr, ServerError> {
        let address = format!("{}:{}", self.host, self.port);
        address
            .parse()
            .map_err(|_| ServerError::InvalidAddress(address))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            allowed_origin: Self::default_allowed_origin(),
        }
    }
}

impl DatabaseConfig {
    pub fn default_path() -> String {
        "easy-optha.db".to_string()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

impl InferenceConfig {
    pub fn default_fundus_url() -> String {
        "http://localhost:5000/predict".to_string()
    }

    pub fn default_oct_url() -> String {
        "http://localhost:5001/predict-oct".to_string()
    }

    pub fn default_history_url() -> String {
        "http://localhost:3000".to_string()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            fundus_url: Self::default_fundus_url(),
            oct_url: Self::default_oct_url(),
            history_url: Self::default_history_url(),
            timeout_ms: None,
        }
    }
}

impl LogConfig {
    pub fn with_level(level: LogLevel) -> Self {
        Self {
            level,
            format: Self::default_log_format(),
            ansi_enabled: Self::default_ansi_enabled(),
        }
    }

    pub const fn default_log_level() -> LogLevel {
        LogLevel::Info
    }

    pub fn default_log_format() -> LogFormat {
        if std::io::stdout().is_terminal() {
            LogFormat::Pretty
        } else {
            LogFormat::Structured
        }
    }

    pub fn default_ansi_enabled() -> bool {
        std::io::stdout().is_terminal()
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::with_level(Self::default_log_level())
    }
}
