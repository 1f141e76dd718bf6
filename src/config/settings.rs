//! Settings loading from `inventory.toml`.
//!
//! Every key is optional. A missing file means all defaults, and `DATABASE_URL` in the
//! environment takes precedence over the file.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Default settings file, relative to the working directory
pub const DEFAULT_PATH: &str = "inventory.toml";

/// Runtime settings for the inventory store
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SeaORM connection URL
    pub database_url: String,
    /// Log every SQL statement through sqlx
    pub sqlx_logging: bool,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/inventory.sqlite?mode=rwc".to_string(),
            sqlx_logging: false,
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Parses settings from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config {
            message: format!("Failed to parse settings: {e}"),
        })
    }

    /// Replaces the database URL when an override is given.
    #[must_use]
    pub fn with_database_url(mut self, database_url: Option<String>) -> Self {
        if let Some(url) = database_url {
            self.database_url = url;
        }
        self
    }
}

/// Loads settings from `path`, falling back to defaults when the file does not exist,
/// then applies the `DATABASE_URL` environment override.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let settings = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Settings::from_toml(&contents)?
    } else {
        Settings::default()
    };

    Ok(settings.with_database_url(std::env::var("DATABASE_URL").ok()))
}

/// Loads settings from [`DEFAULT_PATH`].
pub fn load_default_settings() -> Result<Settings> {
    load_settings(DEFAULT_PATH)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_full_settings() {
        let toml_str = r#"
            database_url = "sqlite::memory:"
            sqlx_logging = true
            log_filter = "inventory_core=debug"
        "#;

        let settings = Settings::from_toml(toml_str).unwrap();
        assert_eq!(settings.database_url, "sqlite::memory:");
        assert!(settings.sqlx_logging);
        assert_eq!(settings.log_filter, "inventory_core=debug");
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let settings = Settings::from_toml("sqlx_logging = true").unwrap();
        assert_eq!(settings.database_url, Settings::default().database_url);
        assert_eq!(settings.log_filter, "info");
    }

    #[test]
    fn test_malformed_settings_rejected() {
        let err = Settings::from_toml("sqlx_logging = \"sometimes\"").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_database_url_override() {
        let settings = Settings::default().with_database_url(Some("sqlite::memory:".to_string()));
        assert_eq!(settings.database_url, "sqlite::memory:");

        let unchanged = Settings::default().with_database_url(None);
        assert_eq!(unchanged, Settings::default());
    }

    #[test]
    fn test_missing_file_means_defaults() {
        let settings = load_settings("does/not/exist/inventory.toml").unwrap();
        assert_eq!(settings.sqlx_logging, Settings::default().sqlx_logging);
    }
}
