use std::env;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::ConfigError;

const DEFAULT_SNAPSHOT_PATH: &str = "data/health_insights.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub snapshot_path: PathBuf,
    pub window_size: Option<i64>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL");
        if database_url.is_none() {
            debug!("DATABASE_URL not set, database commands are unavailable");
        }

        let snapshot_path = lookup("HEALTH_SNAPSHOT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                info!("HEALTH_SNAPSHOT_PATH not set, using default: {DEFAULT_SNAPSHOT_PATH}");
                PathBuf::from(DEFAULT_SNAPSHOT_PATH)
            });

        let window_size = match lookup("HEALTH_WINDOW_SIZE") {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| ConfigError::InvalidEnv {
                key: "HEALTH_WINDOW_SIZE",
                value: raw.clone(),
            })?),
            None => None,
        };

        Ok(Self {
            database_url,
            snapshot_path,
            window_size,
        })
    }
}
