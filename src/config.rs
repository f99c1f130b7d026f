use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

pub const DB_URL_ENV: &str = "READBOT_DB_URL";
pub const TOKEN_ENV: &str = "DISCORD_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default, skip_serializing)]
    pub discord_token: Option<String>,

    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    #[serde(default = "default_channel_name")]
    pub channel_name: String,

    #[serde(default = "default_channel_category")]
    pub channel_category: String,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_minutes: u64,

    #[serde(default = "default_duration_days")]
    pub default_duration_days: u32,

    #[serde(default = "default_reminder_hour")]
    pub reminder_hour: u32,
}

/// Where the SQLite database lives, resolved from `database_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

fn default_database_url() -> String {
    "sqlite:///readbot.db".to_string()
}

fn default_command_prefix() -> String {
    "!".to_string()
}

fn default_channel_name() -> String {
    "tech_read".to_string()
}

fn default_channel_category() -> String {
    "Text Channels".to_string()
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_duration_days() -> u32 {
    7
}

fn default_reminder_hour() -> u32 {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            discord_token: None,
            command_prefix: default_command_prefix(),
            channel_name: default_channel_name(),
            channel_category: default_channel_category(),
            sweep_interval_minutes: default_sweep_interval(),
            default_duration_days: default_duration_days(),
            reminder_hour: default_reminder_hour(),
        }
    }
}

impl Config {
    /// Loads the optional config file, then applies `.env` and environment
    /// overrides on top of it.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(DB_URL_ENV).filter(|s| !s.trim().is_empty()) {
            self.database_url = url;
        }
        if let Some(token) = lookup(TOKEN_ENV).filter(|s| !s.trim().is_empty()) {
            self.discord_token = Some(token);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.reminder_hour > 23 {
            return Err(AppError::Config(format!(
                "reminder_hour must be between 0 and 23, got {}",
                self.reminder_hour
            )));
        }
        if self.sweep_interval_minutes == 0 {
            return Err(AppError::Config(
                "sweep_interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.command_prefix.is_empty() {
            return Err(AppError::Config("command_prefix must not be empty".to_string()));
        }
        self.database_location()?;
        Ok(())
    }

    pub fn database_location(&self) -> Result<DatabaseLocation> {
        let rest = self.database_url.strip_prefix("sqlite://").ok_or_else(|| {
            AppError::Config(format!(
                "unsupported database url '{}', expected sqlite:///<path>",
                self.database_url
            ))
        })?;

        match rest {
            "" | "/:memory:" | ":memory:" => Ok(DatabaseLocation::Memory),
            // sqlite:///relative.db and sqlite:////absolute.db
            path => match path.strip_prefix('/') {
                Some(path) if !path.is_empty() => Ok(DatabaseLocation::File(PathBuf::from(path))),
                _ => Err(AppError::Config(format!(
                    "database url '{}' has no file path",
                    self.database_url
                ))),
            },
        }
    }

    pub fn require_token(&self) -> Result<&str> {
        self.discord_token
            .as_deref()
            .ok_or_else(|| AppError::Config(format!("{} not found in environment variables", TOKEN_ENV)))
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("readbot")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_local_file() {
        let config = Config::default();
        assert_eq!(
            config.database_location().unwrap(),
            DatabaseLocation::File(PathBuf::from("readbot.db"))
        );
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.channel_name, "tech_read");
        assert_eq!(config.sweep_interval_minutes, 60);
    }

    #[test]
    fn absolute_and_memory_urls() {
        let mut config = Config::default();
        config.database_url = "sqlite:////var/lib/readbot/db.sqlite".to_string();
        assert_eq!(
            config.database_location().unwrap(),
            DatabaseLocation::File(PathBuf::from("/var/lib/readbot/db.sqlite"))
        );

        config.database_url = "sqlite://".to_string();
        assert_eq!(config.database_location().unwrap(), DatabaseLocation::Memory);

        config.database_url = "sqlite:///:memory:".to_string();
        assert_eq!(config.database_location().unwrap(), DatabaseLocation::Memory);
    }

    #[test]
    fn non_sqlite_url_is_rejected() {
        let mut config = Config::default();
        config.database_url = "postgres://localhost/readbot".to_string();
        assert!(matches!(config.database_location(), Err(AppError::Config(_))));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::default();
        config.apply_env(env(&[
            (DB_URL_ENV, "sqlite:///other.db"),
            (TOKEN_ENV, "abc.def.ghi"),
        ]));
        assert_eq!(config.database_url, "sqlite:///other.db");
        assert_eq!(config.require_token().unwrap(), "abc.def.ghi");
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let mut config = Config::default();
        config.apply_env(env(&[(TOKEN_ENV, "   ")]));
        assert!(config.require_token().is_err());
    }

    #[test]
    fn toml_file_fills_missing_fields_with_defaults() {
        let config: Config = toml::from_str("channel_name = \"book-club\"\nreminder_hour = 9\n").unwrap();
        assert_eq!(config.channel_name, "book-club");
        assert_eq!(config.reminder_hour, 9);
        assert_eq!(config.default_duration_days, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn out_of_range_hour_fails_validation() {
        let mut config = Config::default();
        config.reminder_hour = 24;
        assert!(config.validate().is_err());
    }
}
