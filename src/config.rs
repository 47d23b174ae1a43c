//! Service settings: defaults, an optional TOML file, then environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "bookrent.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {name}: {value}")]
    Env { name: &'static str, value: String },
    #[error("invalid setting {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind: String,
    pub database_path: PathBuf,
    pub token_secret: String,
    pub token_ttl_secs: i64,
    pub bcrypt_cost: u32,
    pub reminder_interval_secs: u64,
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
    pub seed_demo_books: bool,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            database_path: PathBuf::from("bookstore.db"),
            token_secret: "super_secret_key_change_me".to_string(),
            token_ttl_secs: 24 * 60 * 60,
            bcrypt_cost: 8,
            reminder_interval_secs: 60 * 60, // hourly
            admin_name: "Admin".to_string(),
            admin_email: "admin@admin.com".to_string(),
            admin_password: "admin123".to_string(),
            seed_demo_books: true,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Reads `BOOKRENT_CONFIG` (or `bookrent.toml` when it exists) and applies
    /// `BOOKRENT_*` environment overrides on top.
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = match std::env::var("BOOKRENT_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            Err(_) => Self::default(),
        };
        settings.apply_overrides(|name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks the merged settings, whichever layer each value came from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reminder_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "reminder_interval_secs",
                reason: "must be greater than zero",
            });
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Invalid {
                field: "bcrypt_cost",
                reason: "must be between 4 and 31",
            });
        }
        if self.token_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                field: "token_ttl_secs",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("BOOKRENT_BIND") {
            self.bind = value;
        }
        if let Some(value) = lookup("BOOKRENT_DB") {
            self.database_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("BOOKRENT_SECRET") {
            self.token_secret = value;
        }
        if let Some(value) = lookup("BOOKRENT_REMINDER_INTERVAL_SECS") {
            self.reminder_interval_secs = match value.trim().parse() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::Env {
                        name: "BOOKRENT_REMINDER_INTERVAL_SECS",
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup("BOOKRENT_LOG") {
            self.log_level = value;
        }
        Ok(())
    }
}
