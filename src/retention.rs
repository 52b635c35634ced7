//! Daily maintenance: database backup plus the retention sweep. Postings
//! referenced by an application are never swept.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backup;
use crate::config::Config;
use crate::error::AppError;
use crate::models::application::Application;
use crate::models::posting::Posting;

const SWEEP_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

pub async fn run_sweep(
    pool: &SqlitePool,
    jobs_retention_days: i64,
    applications_retention_days: i64,
) -> Result<(u64, u64), AppError> {
    let jobs_cutoff = Utc::now() - chrono::Duration::days(jobs_retention_days);
    let apps_cutoff = Utc::now() - chrono::Duration::days(applications_retention_days);

    let postings_deleted = Posting::sweep_unreferenced(pool, jobs_cutoff).await?;
    let applications_deleted = Application::sweep_terminal(pool, apps_cutoff).await?;

    tracing::info!(postings_deleted, applications_deleted, "retention sweep finished");
    Ok((postings_deleted, applications_deleted))
}

/// Background maintenance loop; first pass runs at startup.
pub fn spawn(
    pool: SqlitePool,
    config: Arc<Config>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_PERIOD);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    if let Err(e) = backup::run_backup(
                        &pool,
                        &config.backups_dir(),
                        config.backups_rolling_days,
                    )
                    .await
                    {
                        tracing::warn!("scheduled backup failed: {e}");
                    }
                    if let Err(e) = run_sweep(
                        &pool,
                        config.jobs_retention_days,
                        config.applications_retention_days,
                    )
                    .await
                    {
                        tracing::warn!("retention sweep failed: {e}");
                    }
                }
            }
        }
    })
}
