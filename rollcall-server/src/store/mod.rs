//! Storage backend selection
//!
//! PostgreSQL when `DATABASE_URL` is configured, otherwise the in-memory
//! store from `rollcall-core`.

mod postgres;

pub use postgres::PostgresStore;

use std::sync::Arc;

use rollcall_core::{AttendanceStore, MemoryStore, StorageError};

use crate::config::Config;

/// Open the configured backend, running migrations for PostgreSQL.
pub async fn open_store(config: &Config) -> Result<Arc<dyn AttendanceStore>, StorageError> {
    match &config.database_url {
        Some(url) => {
            tracing::info!("Using PostgreSQL attendance storage");
            let store = PostgresStore::connect(
                url,
                config.database_max_connections,
                config.database_min_connections,
            )
            .await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set, using in-memory storage - attendance will be lost on restart!"
            );
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
