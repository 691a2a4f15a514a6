//! Startup configuration read from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Which `TodoStore` backs the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Memory,
    Mongo { uri: String, database: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub production: bool,
    pub store: StoreConfig,
    pub cors_origin: String,
    pub static_dir: PathBuf,
    pub store_timeout: Duration,
    pub log_json: bool,
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(default),
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// `ENV=production` switches on static serving and skips `.env` loading.
pub fn is_production() -> bool {
    env::var("ENV").map(|v| v == "production").unwrap_or(false)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let store = match env_or("TODO_STORE", "mongo").to_ascii_lowercase().as_str() {
            "memory" => StoreConfig::Memory,
            "mongo" | "mongodb" => StoreConfig::Mongo {
                uri: env::var("MONGODB_URI")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .ok_or(ConfigError::Missing("MONGODB_URI"))?,
                database: env_or("MONGODB_DATABASE", "todo_db"),
            },
            other => {
                return Err(ConfigError::Invalid {
                    name: "TODO_STORE",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            port: env_parse("PORT", 5000)?,
            production: is_production(),
            store,
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            static_dir: PathBuf::from(env_or("STATIC_DIR", "./client/dist")),
            store_timeout: Duration::from_millis(env_parse("STORE_TIMEOUT_MS", 10_000u64)?),
            log_json: env_bool("LOG_JSON", false),
        })
    }
}
