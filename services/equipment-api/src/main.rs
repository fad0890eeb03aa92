mod app;
mod auth;
mod config;
mod errors;
mod pg_store;
mod routes_datasets;
mod routes_report;
mod routes_summary;
mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use equipment::{DatasetService, DatasetStore, InMemoryStore};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::pg_store::PgStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env()?;

    let store: Arc<dyn DatasetStore> = match &cfg.database_url {
        Some(url) => {
            let pool = PgPool::connect(url).await.context("Failed to connect to Postgres")?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run migrations")?;

            check_postgres(&pool).await?;
            info!("postgres: ok");
            Arc::new(PgStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; datasets are kept in memory and lost on restart");
            Arc::new(InMemoryStore::new())
        }
    };

    // leftovers of ingests interrupted by a previous shutdown
    let purged = store.purge_pending().await.context("Failed to purge pending uploads")?;
    if purged > 0 {
        info!(purged, "removed stale pending uploads");
    }

    let app_state = Arc::new(AppState::new(DatasetService::new(store), cfg.clone()));
    let app = app::router(app_state);

    let addr = &cfg.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("equipment-api listening on http://{addr}");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

async fn check_postgres(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .context("Postgres ping failed")?;
    Ok(())
}
