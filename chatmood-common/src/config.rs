//! Configuration loading
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Clap covers tiers 1 and 2 in each binary; this module supplies tiers 3
//! and 4. A missing config file is not an error: the process logs a notice and
//! runs on defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CHATMOOD_CONFIG";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_BATCH_SAVE_SECONDS: f64 = 5.0;
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 10_000;
pub const DEFAULT_ANALYSIS_WORKERS: usize = 4;
pub const DEFAULT_INTAKE_BACKLOG: usize = 1024;
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_POINTER_FILE: &str = "current_stream.txt";
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerSection,
    pub bot: BotSection,
}

/// `[server]` section; also used to carry CLI overrides
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub batch_save_seconds: Option<f64>,
    pub max_queue_size: Option<usize>,
    pub analysis_workers: Option<usize>,
    pub intake_backlog: Option<usize>,
    pub classifier_command: Option<String>,
    pub pointer_file: Option<PathBuf>,
}

/// `[bot]` section; also used to carry CLI overrides
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotSection {
    pub server_url: Option<String>,
    pub pointer_file: Option<PathBuf>,
    pub api_base: Option<String>,
}

impl ServerSection {
    /// Fill unset fields from a lower-priority section
    pub fn or(self, lower: ServerSection) -> ServerSection {
        ServerSection {
            host: self.host.or(lower.host),
            port: self.port.or(lower.port),
            data_dir: self.data_dir.or(lower.data_dir),
            batch_save_seconds: self.batch_save_seconds.or(lower.batch_save_seconds),
            max_queue_size: self.max_queue_size.or(lower.max_queue_size),
            analysis_workers: self.analysis_workers.or(lower.analysis_workers),
            intake_backlog: self.intake_backlog.or(lower.intake_backlog),
            classifier_command: self.classifier_command.or(lower.classifier_command),
            pointer_file: self.pointer_file.or(lower.pointer_file),
        }
    }
}

impl BotSection {
    /// Fill unset fields from a lower-priority section
    pub fn or(self, lower: BotSection) -> BotSection {
        BotSection {
            server_url: self.server_url.or(lower.server_url),
            pointer_file: self.pointer_file.or(lower.pointer_file),
            api_base: self.api_base.or(lower.api_base),
        }
    }
}

/// Fully resolved server settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub batch_save_seconds: f64,
    pub max_queue_size: usize,
    pub analysis_workers: usize,
    pub intake_backlog: usize,
    pub classifier_command: Option<String>,
    pub pointer_file: Option<PathBuf>,
}

impl ServerSettings {
    /// Apply compiled defaults and validate
    pub fn from_section(section: ServerSection) -> Result<Self> {
        let settings = Self {
            host: section.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: section.port.unwrap_or(DEFAULT_PORT),
            data_dir: section
                .data_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            batch_save_seconds: section
                .batch_save_seconds
                .unwrap_or(DEFAULT_BATCH_SAVE_SECONDS),
            max_queue_size: section.max_queue_size.unwrap_or(DEFAULT_MAX_QUEUE_SIZE),
            analysis_workers: section
                .analysis_workers
                .unwrap_or(DEFAULT_ANALYSIS_WORKERS),
            intake_backlog: section.intake_backlog.unwrap_or(DEFAULT_INTAKE_BACKLOG),
            classifier_command: section
                .classifier_command
                .filter(|cmd| !cmd.trim().is_empty()),
            pointer_file: section.pointer_file,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if !(self.batch_save_seconds.is_finite() && self.batch_save_seconds > 0.0) {
            return Err(Error::Config(format!(
                "batch_save_seconds must be positive, got {}",
                self.batch_save_seconds
            )));
        }
        if self.max_queue_size == 0 {
            return Err(Error::Config("max_queue_size must be at least 1".to_string()));
        }
        if self.analysis_workers == 0 {
            return Err(Error::Config("analysis_workers must be at least 1".to_string()));
        }
        if self.intake_backlog == 0 {
            return Err(Error::Config("intake_backlog must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Dataset file used before any session has been started
    pub fn default_dataset_path(&self) -> PathBuf {
        self.data_dir.join("chat_data.csv")
    }
}

/// Fully resolved bot settings
#[derive(Debug, Clone, PartialEq)]
pub struct BotSettings {
    pub server_url: String,
    pub pointer_file: PathBuf,
    pub api_base: String,
}

impl BotSettings {
    pub fn from_section(section: BotSection) -> Result<Self> {
        let server_url = section
            .server_url
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        if !(server_url.starts_with("http://") || server_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "server_url must be an http(s) URL, got {}",
                server_url
            )));
        }

        Ok(Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            pointer_file: section
                .pointer_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_POINTER_FILE)),
            api_base: section
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// Load the TOML config
///
/// An explicit path (CLI or [`CONFIG_ENV_VAR`]) must exist and parse. The
/// platform default location is optional.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return parse_config_file(path);
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return parse_config_file(Path::new(&path));
    }

    match default_config_path() {
        Some(path) if path.exists() => parse_config_file(&path),
        Some(path) => {
            info!("No config file at {} (using defaults)", path.display());
            Ok(TomlConfig::default())
        }
        None => {
            warn!("Could not determine config directory (using defaults)");
            Ok(TomlConfig::default())
        }
    }
}

/// Parse a config file that must exist
pub fn parse_config_file(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let config = toml::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;
    info!("Loaded config file {}", path.display());
    Ok(config)
}

/// `<config_dir>/chatmood/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chatmood").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let settings = ServerSettings::from_section(ServerSection::default()).unwrap();
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.data_dir, PathBuf::from("data"));
        assert_eq!(settings.batch_save_seconds, 5.0);
        assert_eq!(settings.max_queue_size, 10_000);
        assert_eq!(settings.classifier_command, None);
        assert_eq!(settings.default_dataset_path(), PathBuf::from("data/chat_data.csv"));
    }

    #[test]
    fn test_higher_priority_section_wins() {
        let cli = ServerSection {
            port: Some(9000),
            ..Default::default()
        };
        let toml = ServerSection {
            port: Some(7000),
            max_queue_size: Some(50),
            ..Default::default()
        };
        let settings = ServerSettings::from_section(cli.or(toml)).unwrap();
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.max_queue_size, 50);
    }

    #[test]
    fn test_invalid_server_values_rejected() {
        let zero_queue = ServerSection {
            max_queue_size: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            ServerSettings::from_section(zero_queue),
            Err(Error::Config(_))
        ));

        let bad_interval = ServerSection {
            batch_save_seconds: Some(0.0),
            ..Default::default()
        };
        assert!(ServerSettings::from_section(bad_interval).is_err());
    }

    #[test]
    fn test_blank_classifier_command_means_none() {
        let section = ServerSection {
            classifier_command: Some("   ".into()),
            ..Default::default()
        };
        let settings = ServerSettings::from_section(section).unwrap();
        assert!(settings.classifier_command.is_none());
    }

    #[test]
    fn test_bot_defaults_and_trailing_slash() {
        let settings = BotSettings::from_section(BotSection {
            server_url: Some("http://localhost:8080/".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(settings.server_url, "http://localhost:8080");
        assert_eq!(settings.pointer_file, PathBuf::from("current_stream.txt"));
        assert_eq!(settings.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_bot_rejects_non_http_server_url() {
        let section = BotSection {
            server_url: Some("localhost:8080".into()),
            ..Default::default()
        };
        assert!(BotSettings::from_section(section).is_err());
    }
}
