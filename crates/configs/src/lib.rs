//! # configs
//!
//! Layered application configuration: built-in defaults, then an optional
//! `anonlog.toml`, then `ANONLOG__*` environment variables (`.env` is loaded
//! first). Nested keys use `__`, e.g. `ANONLOG__FEED__COOLDOWN_SECS=5`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use al_core::{FeedSettings, Limits};
use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use tracing::debug;

pub const ENV_PREFIX: &str = "ANONLOG";
pub const DEFAULT_CONFIG_FILE: &str = "anonlog.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub auth: AuthConfig,
    pub session: SessionConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub cooldown_secs: u64,
    pub max_tag_length: usize,
    pub max_title_length: usize,
    pub max_content_length: usize,
    pub popular_tags_limit: usize,
    pub messages_collection: String,
    pub bans_collection: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        let settings = FeedSettings::default();
        Self {
            cooldown_secs: settings.cooldown.as_secs(),
            max_tag_length: settings.limits.max_tag_length,
            max_title_length: settings.limits.max_title_length,
            max_content_length: settings.limits.max_content_length,
            popular_tags_limit: settings.popular_tags_limit,
            messages_collection: settings.messages_collection,
            bans_collection: settings.bans_collection,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Verified emails granted moderation rights.
    pub admin_emails: Vec<String>,
    #[serde(deserialize_with = "secret_string")]
    pub name_salt: SecretString,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { admin_emails: Vec::new(), name_salt: SecretString::from("anonlog".to_string()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { path: PathBuf::from(".anonlog/session.json") }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { format: LogFormat::default(), filter: "info".to_string() }
    }
}

fn secret_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

impl AppConfig {
    /// Loads `.env`, then `anonlog.toml` from the working directory, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE), None)
    }

    /// `env` replaces the process environment when given.
    pub fn load_from(file: &Path, env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let environment = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("auth.admin_emails")
            .source(env);

        let config: AppConfig = Config::builder()
            .add_source(File::from(file).required(false))
            .add_source(environment)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        debug!(file = %file.display(), "configuration loaded");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let feed = &self.feed;
        if feed.max_tag_length < 2 {
            return Err(ConfigError::Invalid("feed.max_tag_length must be at least 2".into()));
        }
        if feed.max_title_length == 0 || feed.max_content_length == 0 {
            return Err(ConfigError::Invalid("feed length limits must be positive".into()));
        }
        if feed.messages_collection.is_empty() || feed.bans_collection.is_empty() {
            return Err(ConfigError::Invalid("collection names must not be empty".into()));
        }
        if feed.messages_collection == feed.bans_collection {
            return Err(ConfigError::Invalid("messages and bans must be separate collections".into()));
        }
        Ok(())
    }

    /// Settings handed to the feed engine.
    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            cooldown: Duration::from_secs(self.feed.cooldown_secs),
            limits: Limits {
                max_tag_length: self.feed.max_tag_length,
                max_title_length: self.feed.max_title_length,
                max_content_length: self.feed.max_content_length,
            },
            popular_tags_limit: self.feed.popular_tags_limit,
            messages_collection: self.feed.messages_collection.clone(),
            bans_collection: self.feed.bans_collection.clone(),
            admin_emails: self.auth.admin_emails.iter().map(|e| e.trim().to_string()).collect(),
            name_salt: self.auth.name_salt.expose_secret().to_string(),
        }
    }
}
