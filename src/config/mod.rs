//! Configuration management for clickpath
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Collection used when a command is not given `--collection`
    #[serde(default = "default_collection")]
    pub default_collection: String,

    /// Sessionization settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Raw access log settings
    #[serde(default)]
    pub log: LogConfig,

    /// CSV export mapping
    #[serde(default)]
    pub csv: CsvConfig,

    /// Statistics settings
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Feature encoding settings
    #[serde(default)]
    pub encoding: EncodingConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Sessionization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds of inactivity after which a new session starts
    #[serde(default = "default_session_time_limit")]
    pub time_limit_secs: i64,
}

/// Access log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Apache-style format string (`%h %l %u %t "%r" %>s %b ...`)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// strftime format of the `%t` field, without brackets
    #[serde(default = "default_log_timestamp_format")]
    pub timestamp_format: String,
}

/// Column mapping for CSV exports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CsvConfig {
    /// Single-character field separator
    #[serde(default = "default_csv_separator")]
    pub separator: String,

    #[serde(default = "default_csv_timestamp_column")]
    pub timestamp_column: String,

    #[serde(default = "default_csv_timestamp_format")]
    pub timestamp_format: String,

    /// Column whose value becomes the request URL
    #[serde(default = "default_csv_action_column")]
    pub action_column: String,

    /// Column whose value becomes the client identifier
    #[serde(default = "default_csv_session_id_column")]
    pub session_id_column: String,
}

impl CsvConfig {
    /// Separator as the byte the CSV reader expects
    pub fn separator_byte(&self) -> Result<u8> {
        let bytes = self.separator.as_bytes();
        if bytes.len() != 1 || !bytes[0].is_ascii() {
            return Err(Error::Config(format!(
                "csv.separator must be a single ASCII character, got {:?}",
                self.separator
            )));
        }
        Ok(bytes[0])
    }
}

/// Analytics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Entries shown by top/bottom listings
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

/// Frequent subsequence encoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Minimum fraction of traces that must contain a subsequence (0, 1]
    #[serde(default = "default_min_support")]
    pub min_support: f64,

    #[serde(default = "default_min_length")]
    pub min_length: usize,

    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for clickpath data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_collection: default_collection(),
            session: SessionConfig::default(),
            log: LogConfig::default(),
            csv: CsvConfig::default(),
            analytics: AnalyticsConfig::default(),
            encoding: EncodingConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: default_session_time_limit(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            timestamp_format: default_log_timestamp_format(),
        }
    }
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            separator: default_csv_separator(),
            timestamp_column: default_csv_timestamp_column(),
            timestamp_format: default_csv_timestamp_format(),
            action_column: default_csv_action_column(),
            session_id_column: default_csv_session_id_column(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            min_support: default_min_support(),
            min_length: default_min_length(),
            max_length: default_max_length(),
        }
    }
}

impl Config {
    /// Get the default base directory for clickpath (~/.clickpath)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".clickpath")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("clickpath.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("clickpath.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if clickpath is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_collection.trim().is_empty() {
            return Err(Error::Config(
                "default_collection must not be empty".to_string(),
            ));
        }

        if self.session.time_limit_secs <= 0 {
            return Err(Error::Config(
                "session.time_limit_secs must be positive".to_string(),
            ));
        }

        self.csv.separator_byte()?;

        for (name, value) in [
            ("csv.timestamp_column", &self.csv.timestamp_column),
            ("csv.action_column", &self.csv.action_column),
            ("csv.session_id_column", &self.csv.session_id_column),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", name)));
            }
        }

        if self.analytics.top_n == 0 {
            return Err(Error::Config("analytics.top_n must be >= 1".to_string()));
        }

        if !(self.encoding.min_support > 0.0 && self.encoding.min_support <= 1.0) {
            return Err(Error::Config(
                "encoding.min_support must be in (0.0, 1.0]".to_string(),
            ));
        }

        if self.encoding.min_length == 0 {
            return Err(Error::Config(
                "encoding.min_length must be >= 1".to_string(),
            ));
        }

        if self.encoding.max_length < self.encoding.min_length {
            return Err(Error::Config(
                "encoding.max_length must be >= encoding.min_length".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_collection, "default");
        assert_eq!(config.session.time_limit_secs, 3600);
        assert_eq!(config.csv.separator, ";");
        assert_eq!(config.analytics.top_n, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.default_collection = "gallica_2023".to_string();
        config.session.time_limit_secs = 1800;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.default_collection, "gallica_2023");
        assert_eq!(loaded.session.time_limit_secs, 1800);
        assert_eq!(loaded.paths.db_file, tmp.path().join("clickpath.db"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[csv]\nseparator = \",\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.csv.separator, ",");
        assert_eq!(config.csv.action_column, "action");
        assert_eq!(config.session.time_limit_secs, 3600);
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = Config::load(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.session.time_limit_secs = 0;
        assert!(config.validate().is_err());
        config.session.time_limit_secs = 60;
        assert!(config.validate().is_ok());

        config.csv.separator = ";;".to_string();
        assert!(config.validate().is_err());
        config.csv.separator = "\t".to_string();
        assert!(config.validate().is_ok());

        config.encoding.min_support = 0.0;
        assert!(config.validate().is_err());
        config.encoding.min_support = 1.0;
        assert!(config.validate().is_ok());

        config.encoding.max_length = 1;
        assert!(config.validate().is_err());
    }
}
