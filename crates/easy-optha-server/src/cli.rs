use std::path::PathBuf;

use clap::{Args, Parser};

use crate::{
    config::{Config, LogFormat, LogLevel, DEFAULT_CONFIG_FILE},
    error::ServerError,
};

/// Options shared by every binary.
#[derive(Clone, Debug, Args)]
pub struct ConfigArgs {
    /// Optional path to a configuration file.
    ///
    /// Environment variables prefixed `EASY_OPTHA_` override values in the file.
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    pub config_file_path: String,

    /// Log level (overrides the configuration file).
    #[arg(short, long, value_enum, env = "EASY_OPTHA_LOG__LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Log format (overrides the configuration file).
    #[arg(short = 'f', long, value_enum, env = "EASY_OPTHA_LOG__FORMAT", global = true)]
    pub log_format: Option<LogFormat>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<Config, ServerError> {
        Config::load(&self.config_file_path, self.log_level, self.log_format)
    }
}

/// Easy Optha patient history service.
#[derive(Clone, Debug, Parser)]
#[command(version, about)]
pub struct ServerArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Port to listen on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Path to the history database.
    #[arg(long)]
    pub database: Option<String>,
}

impl ServerArgs {
    pub fn load(&self) -> Result<Config, ServerError> {
        let mut config = self.config.load()?;
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(path) = &self.database {
            config.database.path = path.clone();
        }
        Ok(config)
    }
}

/// Classify fundus photos and, when eligible, OCT scans for one patient.
#[derive(Clone, Debug, Parser)]
#[command(version, about)]
pub struct ScanArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Patient identifier.
    #[arg(short = 'p', long)]
    pub patient_id: String,

    /// Fundus photos to classify.
    #[arg(long, required = true, num_args = 1..)]
    pub fundus: Vec<PathBuf>,

    /// OCT scans to classify if the fundus diagnosis unlocks the OCT stage.
    #[arg(long, num_args = 1..)]
    pub oct: Vec<PathBuf>,

    /// Session cookie forwarded to the services.
    #[arg(long, env = "EASY_OPTHA_SESSION_COOKIE", hide_env_values = true)]
    pub cookie: Option<String>,

    /// Record diagnoses with the history service.
    #[arg(long)]
    pub record: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_args() {
        let args = ScanArgs::try_parse_from([
            "easy-optha-scan",
            "--patient-id",
            "P123",
            "--fundus",
            "left.jpg",
            "right.jpg",
            "--oct",
            "scan.png",
            "--record",
        ])
        .unwrap();

        assert_eq!(args.patient_id, "P123");
        assert_eq!(args.fundus.len(), 2);
        assert_eq!(args.oct, vec![PathBuf::from("scan.png")]);
        assert!(args.record);
        assert_eq!(args.config.config_file_path, DEFAULT_CONFIG_FILE);
    }

    #[test]
    fn test_scan_args_require_fundus() {
        assert!(ScanArgs::try_parse_from(["easy-optha-scan", "--patient-id", "P1"]).is_err());
    }

    #[test]
    fn test_server_overrides() {
        let args = ServerArgs::try_parse_from([
            "easy-optha-server",
            "-c",
            "missing.toml",
            "--port",
            "9000",
            "--database",
            "/tmp/history.db",
            "--log-level",
            "debug",
        ])
        .unwrap();

        let config = args.load().unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.path, "/tmp/history.db");
        assert_eq!(config.log.level, LogLevel::Debug);
    }
}
