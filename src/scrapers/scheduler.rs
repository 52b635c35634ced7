//! Registers every known source on its polling interval. Missed ticks
//! coalesce, and a running-set guard keeps runs at one instance per source
//! even when a manual trigger races the schedule.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::AppError;
use crate::events::EventBus;
use crate::scrapers::runtime::{RunStats, run_source};
use crate::scrapers::{SCHEDULE, adapter_for};

pub struct Scheduler {
    pool: SqlitePool,
    bus: Arc<EventBus>,
    running: Mutex<HashSet<String>>,
    zero_disable_threshold: i64,
    default_delay: (f64, f64),
}

impl Scheduler {
    pub fn new(
        pool: SqlitePool,
        bus: Arc<EventBus>,
        zero_disable_threshold: i64,
        default_delay: (f64, f64),
    ) -> Arc<Self> {
        Arc::new(Self {
            pool,
            bus,
            running: Mutex::new(HashSet::new()),
            zero_disable_threshold,
            default_delay,
        })
    }

    /// Spawn one polling loop per scheduled source. Loops exit when the
    /// shutdown flag flips.
    pub fn spawn_all(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        SCHEDULE
            .iter()
            .map(|(tag, interval_hours)| {
                let scheduler = self.clone();
                let mut shutdown = shutdown.clone();
                let tag = tag.to_string();
                let period = Duration::from_secs(interval_hours * 3600);

                tracing::info!(source = %tag, interval_hours, "scraper job registered");
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        tokio::select! {
                            biased;
                            _ = shutdown.changed() => {
                                tracing::info!(source = %tag, "scraper loop stopping");
                                break;
                            }
                            _ = ticker.tick() => {
                                match scheduler.trigger(&tag).await {
                                    Ok(stats) => tracing::info!(
                                        source = %tag,
                                        status = stats.status.as_str(),
                                        jobs_found = stats.jobs_found,
                                        jobs_new = stats.jobs_new,
                                        "scheduled run finished"
                                    ),
                                    Err(AppError::BadRequest(_)) => {
                                        // Previous run still in flight; coalesce.
                                    }
                                    Err(e) => tracing::error!(source = %tag, "scheduled run crashed: {e}"),
                                }
                            }
                        }
                    }
                })
            })
            .collect()
    }

    /// Run one source now. Also the entry point for the manual-trigger API.
    pub async fn trigger(&self, tag: &str) -> Result<RunStats, AppError> {
        let adapter = adapter_for(tag)
            .ok_or_else(|| AppError::NotFound(format!("Unknown source '{tag}'")))?;

        {
            let mut running = self.running.lock().expect("scheduler lock poisoned");
            if !running.insert(tag.to_string()) {
                return Err(AppError::BadRequest(format!(
                    "Source '{tag}' already has a run in flight"
                )));
            }
        }

        let result = run_source(
            &self.pool,
            &self.bus,
            &*adapter,
            self.zero_disable_threshold,
            self.default_delay,
        )
        .await;

        self.running
            .lock()
            .expect("scheduler lock poisoned")
            .remove(tag);

        result
    }

    pub fn is_running(&self, tag: &str) -> bool {
        self.running
            .lock()
            .expect("scheduler lock poisoned")
            .contains(tag)
    }
}
