use crate::config::{AppConfig, StorageBackend};
use crate::storage::{memory::InMemoryStore, postgres::PgStore, GuestbookStore};
use anyhow::Context;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn GuestbookStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match config.backend {
            StorageBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL must be set")?;
                Arc::new(PgStore::connect(url, config.max_connections).await?)
                    as Arc<dyn GuestbookStore>
            }
            StorageBackend::Memory => {
                tracing::warn!("using in-memory storage; data is lost on restart");
                Arc::new(InMemoryStore::new()) as Arc<dyn GuestbookStore>
            }
        };

        Ok(Self::from_parts(config, store))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn GuestbookStore>) -> Self {
        Self { config, store }
    }

    #[cfg(test)]
    pub fn fake(mode: crate::config::OperatingMode) -> Self {
        Self::from_parts(
            Arc::new(AppConfig::for_tests(mode)),
            Arc::new(InMemoryStore::new()),
        )
    }
}
