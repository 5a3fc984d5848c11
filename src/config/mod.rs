//! Configuration module for fims-query.
//!
//! Handles the settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, LoggingSettings, ProjectSettings, QuerySettings, Settings, SettingsError,
};
