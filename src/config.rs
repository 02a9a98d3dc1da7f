use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;
use thiserror::Error;

use crate::services::CatalogSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    pub store_timeout: Duration,
    pub trending_staleness: TimeDelta,
    pub write_retries: u32,
    /// Zero disables the background refresh loop.
    pub refresh_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://course_catalog.db".to_string());
        let max_connections = parse_var("DATABASE_MAX_CONNECTIONS", 5u32)?;
        let bind_addr = parse_var("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?;
        let store_timeout_ms = parse_var("STORE_TIMEOUT_MS", 5_000u64)?;
        let staleness_hours = parse_var("TRENDING_STALENESS_HOURS", 6i64)?;
        let write_retries = parse_var("WRITE_RETRIES", 3u32)?;
        let refresh_interval_secs = parse_var("REFRESH_INTERVAL_SECS", 900u64)?;

        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }
        if staleness_hours < 0 {
            return Err(ConfigError::Invalid {
                key: "TRENDING_STALENESS_HOURS",
                value: staleness_hours.to_string(),
            });
        }

        Ok(Self {
            database_url,
            max_connections,
            bind_addr,
            store_timeout: Duration::from_millis(store_timeout_ms),
            trending_staleness: TimeDelta::hours(staleness_hours),
            write_retries,
            refresh_interval_secs,
        })
    }

    pub fn catalog_settings(&self) -> CatalogSettings {
        CatalogSettings {
            store_timeout: self.store_timeout,
            trending_staleness: self.trending_staleness,
            write_retries: self.write_retries,
        }
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_falls_back_to_default() {
        let value = parse_var("COURSE_CATALOG_TEST_UNSET_VARIABLE", 42u32).unwrap();
        assert_eq!(value, 42);
    }
}
