//! TOML-based configuration for fims-query.
//!
//! Supports a config file (fims-query.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [query]
//! network_id = 1
//! default_limit = 100
//! max_limit = 10000
//! only_public_expeditions = false
//! column_resolution = "declaration_order"
//!
//! [project]
//! path = "${FIMS_HOME}/projects/amphibians.json"
//!
//! [logging]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::planner::ColumnResolution;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub query: QuerySettings,
    pub project: ProjectSettings,
    pub logging: LoggingSettings,
}

/// Defaults applied to every compiled query.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Network whose schema (`network_<id>`) holds the entity tables.
    pub network_id: u32,

    /// Page size used when a request does not specify one.
    pub default_limit: Option<u64>,

    /// Upper bound for any requested page size.
    pub max_limit: u64,

    /// Restrict results to public expeditions unless a request overrides it.
    pub only_public_expeditions: bool,

    /// How bare column names shared by several entities are resolved.
    pub column_resolution: ColumnResolution,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            network_id: 1,
            default_limit: None,
            max_limit: 10_000,
            only_public_expeditions: false,
            column_resolution: ColumnResolution::default(),
        }
    }
}

/// Location of the project schema document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Path to the schema JSON (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl ProjectSettings {
    /// Get the schema path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter level (error, warn, info, debug, trace, off).
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl LoggingSettings {
    pub fn level_filter(&self) -> Result<log::LevelFilter, SettingsError> {
        log::LevelFilter::from_str(&self.level)
            .map_err(|_| SettingsError::InvalidConfig(format!("unknown log level '{}'", self.level)))
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `FIMS_QUERY_CONFIG`
    /// 2. `./fims-query.toml`
    /// 3. `~/.config/fims-query/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        // Check environment variable first
        if let Ok(path) = env::var("FIMS_QUERY_CONFIG") {
            return Self::from_file(&path);
        }

        // Check local directory
        let local_config = PathBuf::from("fims-query.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        // Check user config directory
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("fims-query").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.query.max_limit == 0 {
            return Err(SettingsError::InvalidConfig(
                "query.max_limit must be greater than 0".into(),
            ));
        }
        if self.query.default_limit == Some(0) {
            return Err(SettingsError::InvalidConfig(
                "query.default_limit must be greater than 0".into(),
            ));
        }
        self.logging.level_filter()?;
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                var_name.push(ch);
            }
            if !closed {
                return Err(SettingsError::InvalidConfig(format!(
                    "unterminated variable in '{}'",
                    s
                )));
            }
        } else {
            // $VAR (ends at non-alphanumeric/underscore)
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                var_name.push(ch);
            }
            if var_name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
        }

        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
