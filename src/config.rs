use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Selects how much failure detail reaches clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Production,
    Development,
}

impl OperatingMode {
    pub fn is_production(self) -> bool {
        self == OperatingMode::Production
    }
}

impl FromStr for OperatingMode {
    type Err = std::convert::Infallible;

    // Anything that is not "production" counts as a verbose mode.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("production") {
            Ok(OperatingMode::Production)
        } else {
            Ok(OperatingMode::Development)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(ConfigError::Invalid {
                key: "STORAGE_BACKEND",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: OperatingMode,
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mode = get("APP_ENV")
            .and_then(|v| v.parse::<OperatingMode>().ok())
            .unwrap_or(OperatingMode::Development);
        let backend = get("STORAGE_BACKEND")
            .map(|v| v.parse::<StorageBackend>())
            .transpose()?
            .unwrap_or(StorageBackend::Postgres);
        let database_url = get("DATABASE_URL");
        if backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        let max_connections = parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), 10)?;
        let port = parse_or("APP_PORT", get("APP_PORT"), 8080)?;
        let host = get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());

        Ok(Self {
            mode,
            backend,
            database_url,
            max_connections,
            host,
            port,
        })
    }

    #[cfg(test)]
    pub fn for_tests(mode: OperatingMode) -> Self {
        Self {
            mode,
            backend: StorageBackend::Memory,
            database_url: None,
            max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
        }
    }
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
