pub(crate) mod batch;
pub(crate) mod memory;
pub(crate) mod models;
pub(crate) mod paths;
pub(crate) mod postgres;
pub(crate) mod store;

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};

use crate::core::config::{Settings, StoreBackend};
use crate::db::memory::MemoryDocumentStore;
use crate::db::postgres::PgDocumentStore;
use crate::db::store::DocumentStore;

pub(crate) async fn init_pool(settings: &Settings) -> Result<PgPool, sqlx::Error> {
    let database_url = settings.database().database_url();
    let mut connect_options: PgConnectOptions = database_url.parse()?;

    connect_options = connect_options
        .application_name("flashcard-rust")
        .log_statements(tracing::log::LevelFilter::Off);

    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .test_before_acquire(true)
        .connect_with(connect_options)
        .await
}

pub(crate) async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Connects the configured backend. Postgres is migrated before use.
pub(crate) async fn connect_store(settings: &Settings) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match settings.store().backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory document store; data is lost on restart");
            Ok(Arc::new(MemoryDocumentStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = init_pool(settings).await?;
            run_migrations(&pool).await?;
            Ok(Arc::new(PgDocumentStore::new(pool)))
        }
    }
}
