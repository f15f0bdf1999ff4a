use anyhow::Context;
use tracing_subscriber::EnvFilter;

use vietio::config::AppConfig;
use vietio::server;
use vietio::tasks::{archiver, reconcile};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vietio=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let bind_address = config.bind_address();
    let (archive_every, reconcile_every, grace) = (
        config.archive_interval,
        config.reconcile_interval,
        config.orphan_grace,
    );

    let state = server::build_state(config).await?;

    archiver::start_archive_task(state.service.clone(), archive_every);
    reconcile::start_reconcile_task(state.service.clone(), reconcile_every, grace);
    tracing::info!("Background archive and reconciliation tasks started");

    let app = server::register_routes(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Listening on {}", bind_address);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
