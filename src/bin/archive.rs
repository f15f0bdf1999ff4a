//! One archive pass and one orphan sweep, for cron-style deployments.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use vietio::config::AppConfig;
use vietio::server;
use vietio::tasks::reconcile;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vietio=info")),
        )
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let grace = config.orphan_grace;
    let state = server::build_state(config).await?;
    let service = &state.service;

    let report = service
        .archive_expired()
        .await
        .context("Archive pass failed")?;

    let sweep = reconcile::sweep_orphans(service.db(), service.storages(), grace)
        .await
        .context("Reconciliation sweep failed")?;

    tracing::info!(
        "Done: archived={}, skipped={}, failed={}, orphans removed={}",
        report.archived,
        report.skipped,
        report.failed,
        sweep.removed
    );

    if report.failed > 0 || sweep.failed > 0 {
        anyhow::bail!(
            "{} ads and {} objects could not be processed",
            report.failed,
            sweep.failed
        );
    }

    Ok(())
}
