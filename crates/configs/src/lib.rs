//! # configs
//!
//! Layered settings for comfyboard: `config/default.toml`, then
//! `config/local.toml`, then `COMFY__*` environment variables (after `.env`
//! is loaded). Every layer is optional; unset keys fall back to defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub media: MediaSettings,
    pub board: BoardSettings,
    pub cooldowns: CooldownSettings,
    pub sessions: SessionSettings,
    pub identity: IdentitySettings,
    pub log: LogSettings,
    /// Treat every caller as an admin. Never enable in production.
    pub dev_mode: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { url: "sqlite://comfyboard.db".into(), max_connections: 4 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    pub full_dir: PathBuf,
    pub thumb_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub ffmpeg: PathBuf,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            full_dir: "web/static/media/posts/full".into(),
            thumb_dir: "web/static/media/posts/thumb".into(),
            max_upload_bytes: 10 << 20,
            ffmpeg: "ffmpeg".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BoardSettings {
    /// Unpinned threads kept per board before the oldest is pruned
    pub max_threads: u64,
    pub max_subject_len: usize,
    pub max_body_len: usize,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self { max_threads: 50, max_subject_len: 50, max_body_len: 3000 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CooldownSettings {
    pub thread_secs: u64,
    pub post_secs: u64,
}

impl Default for CooldownSettings {
    fn default() -> Self {
        Self { thread_secs: 120, post_secs: 15 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { ttl_secs: 3600, sweep_interval_secs: 10 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    /// Mixed into every identity hash
    #[serde(deserialize_with = "secret_string")]
    pub salt: SecretString,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self { salt: SecretString::from(String::new()) }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { filter: "info".into(), format: LogFormat::Pretty }
    }
}

fn secret_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

impl Settings {
    /// Loads `.env`, then layers `config/` files and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        // a missing .env is fine
        let _ = dotenvy::dotenv();
        Self::load_from(Path::new("config"), None)
    }

    /// Loads from `dir`. `env` replaces the process environment when given.
    pub fn load_from(
        dir: &Path,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let environment = Environment::with_prefix("COMFY")
            .separator("__")
            .try_parsing(true)
            .source(env);

        let settings: Settings = Config::builder()
            .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
            .add_source(File::with_name(&dir.join("local").to_string_lossy()).required(false))
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("database.max_connections", u64::from(self.database.max_connections)),
            ("board.max_threads", self.board.max_threads),
            ("board.max_subject_len", self.board.max_subject_len as u64),
            ("board.max_body_len", self.board.max_body_len as u64),
            ("media.max_upload_bytes", self.media.max_upload_bytes as u64),
            ("cooldowns.thread_secs", self.cooldowns.thread_secs),
            ("cooldowns.post_secs", self.cooldowns.post_secs),
            ("sessions.ttl_secs", self.sessions.ttl_secs),
            ("sessions.sweep_interval_secs", self.sessions.sweep_interval_secs),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{key} must be greater than zero")));
        }

        if self.identity.salt.expose_secret().is_empty() {
            if !self.dev_mode {
                return Err(ConfigError::Invalid(
                    "identity.salt must be set (COMFY__IDENTITY__SALT)".into(),
                ));
            }
            tracing::warn!("identity.salt is empty; identity hashes are unsalted");
        }
        Ok(())
    }
}
