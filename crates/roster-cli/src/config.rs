use std::time::Duration;

use roster_core::constants::{
    DEFAULT_APP_NAME, DEFAULT_BROKER_ADDRESS, DEFAULT_BROKER_CAPACITY, DEFAULT_CONSUMER_GROUP,
    DEFAULT_CONTEXT_TIMEOUT, DEFAULT_DATABASE_PATH, DEFAULT_ENVIRONMENT, DEFAULT_LOG_LEVEL,
    DEFAULT_OBJECT_STORAGE_BUCKET, PRODUCTION_ENVIRONMENT, SUBJECT_CREATE_TOPIC,
};
use roster_core::{Error, Result};
use roster_service::ObjectStorage;
use roster_storage::DatabaseConfig;

const DEFAULT_OBJECT_STORAGE_ENDPOINT: &str = "http://localhost:9000";

/// Process configuration, read from the environment.
///
/// | Variable | Default |
/// |----------|---------|
/// | `APP` | `roster` |
/// | `ENVIRONMENT` | `develop` (`production` switches logs to JSON) |
/// | `LOG_LEVEL` | `debug` (overridden by `RUST_LOG`) |
/// | `CONTEXT_TIMEOUT` | `30s` |
/// | `DATABASE_PATH` | `roster.db` |
/// | `DATABASE_MAX_CONNECTIONS` | `10` |
/// | `BROKER_ADDRESS` | `localhost:29092` (comma-separated) |
/// | `BROKER_CAPACITY` | `256` |
/// | `SUBJECT_CREATE_TOPIC` | `api.user.create` |
/// | `CONSUMER_GROUP_ID` | `1` |
/// | `OBJECT_STORAGE_ENDPOINT` | `http://localhost:9000` |
/// | `OBJECT_STORAGE_BUCKET` | `user` |
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub app: String,
    pub environment: String,
    pub log_level: String,
    pub context_timeout: Duration,
    pub database_path: String,
    pub database_max_connections: u32,
    pub broker_addresses: Vec<String>,
    pub broker_capacity: usize,
    pub subject_create_topic: String,
    pub consumer_group: String,
    pub object_storage: ObjectStorage,
}

impl ServiceConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let context_timeout = match lookup("CONTEXT_TIMEOUT").filter(|v| !v.trim().is_empty()) {
            Some(raw) => parse_duration(&raw)?,
            None => DEFAULT_CONTEXT_TIMEOUT,
        };

        let database_max_connections = get("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                Error::Config("DATABASE_MAX_CONNECTIONS must be a positive integer".to_string())
            })?;

        let broker_capacity = get("BROKER_CAPACITY", &DEFAULT_BROKER_CAPACITY.to_string())
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| Error::Config("BROKER_CAPACITY must be a positive integer".to_string()))?;

        let broker_addresses: Vec<String> = get("BROKER_ADDRESS", DEFAULT_BROKER_ADDRESS)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if broker_addresses.is_empty() {
            return Err(Error::MissingConfig("BROKER_ADDRESS".to_string()));
        }

        Ok(Self {
            app: get("APP", DEFAULT_APP_NAME),
            environment: get("ENVIRONMENT", DEFAULT_ENVIRONMENT),
            log_level: get("LOG_LEVEL", DEFAULT_LOG_LEVEL),
            context_timeout,
            database_path: get("DATABASE_PATH", DEFAULT_DATABASE_PATH),
            database_max_connections,
            broker_addresses,
            broker_capacity,
            subject_create_topic: get("SUBJECT_CREATE_TOPIC", SUBJECT_CREATE_TOPIC),
            consumer_group: get("CONSUMER_GROUP_ID", DEFAULT_CONSUMER_GROUP),
            object_storage: ObjectStorage::new(
                get("OBJECT_STORAGE_ENDPOINT", DEFAULT_OBJECT_STORAGE_ENDPOINT),
                get("OBJECT_STORAGE_BUCKET", DEFAULT_OBJECT_STORAGE_BUCKET),
            ),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case(PRODUCTION_ENVIRONMENT)
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_path.clone())
            .max_connections(self.database_max_connections)
            .min_connections(1)
            .auto_migrate(true)
    }
}

/// Parse `<number><unit>` with unit `ms`, `s`, `m` or `h`. A bare number is seconds.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let invalid = |reason: &str| Error::InvalidDuration {
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    if digits.is_empty() {
        return Err(invalid("missing number"));
    }
    let amount: u64 = digits.parse().map_err(|_| invalid("number out of range"))?;

    let duration = match unit {
        "ms" => Duration::from_millis(amount),
        "" | "s" => Duration::from_secs(amount),
        "m" => Duration::from_secs(amount.saturating_mul(60)),
        "h" => Duration::from_secs(amount.saturating_mul(3600)),
        _ => return Err(invalid("unknown unit")),
    };

    if duration.is_zero() {
        return Err(invalid("must be greater than zero"));
    }
    Ok(duration)
}
