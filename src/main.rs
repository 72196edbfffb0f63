use std::sync::Arc;

use anyhow::Context;
use football_predictor::config::Settings;
use football_predictor::store::{MatchStore, MemoryStore, PgStore};
use football_predictor::{db, logging, route, AppState};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    logging::init(&settings);

    tracing::info!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        debug = settings.debug,
        "starting application"
    );

    let store: Arc<dyn MatchStore> = if settings.uses_memory_store() {
        tracing::warn!("DATABASE_URL=memory, records will not survive a restart");
        Arc::new(MemoryStore::new())
    } else {
        let pool = db::connect(&settings).await?;
        db::migrate(&pool).await?;
        Arc::new(PgStore::new(pool))
    };

    let bind_addr = settings.bind_addr;
    let app = route::create_router(Arc::new(AppState { store, settings }));

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down application");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
