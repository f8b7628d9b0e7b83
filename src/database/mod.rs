pub mod fixture;
pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use fixture::{Fixture, FixtureError, SeedReport};
pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{Commit, GradebookStore, RecordFilter, RecordWrite, StoreError, StoreResult};

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::config::{DatabaseConfig, StoreBackend};

/// Build the configured backend. Postgres gets its schema applied; the
/// memory backend is seeded from the fixture file when one is set.
pub async fn open_store(config: &DatabaseConfig) -> anyhow::Result<Arc<dyn GradebookStore>> {
    match config.backend {
        StoreBackend::Postgres => {
            let store = PgStore::connect(config)
                .await
                .context("connecting to Postgres")?;
            store.migrate().await.context("applying schema")?;
            info!("Using postgres store");
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            let store = match &config.fixture_path {
                Some(path) => Fixture::load(path)?.into_store().await?,
                None => MemoryStore::new(),
            };
            info!("Using in-memory store");
            Ok(Arc::new(store))
        }
    }
}
