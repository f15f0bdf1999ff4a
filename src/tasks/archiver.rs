use std::time::Duration;

use crate::services::AdService;

pub fn start_archive_task(service: AdService, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            match service.archive_expired().await {
                Ok(report) => {
                    tracing::debug!(
                        "Archive task completed: {} archived, {} failed",
                        report.archived,
                        report.failed
                    );
                }
                Err(e) => {
                    tracing::error!("Archive task failed: {}", e);
                }
            }
        }
    });
}
