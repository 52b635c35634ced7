//! Ingestion engine: the adapter contract, the per-run lifecycle, and the
//! per-source scheduler.

pub mod ats;
pub mod runtime;
pub mod scheduler;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::config;
use crate::error::AppError;
use crate::models::posting::RawPayload;
use crate::models::source_run::SourceRun;

pub use runtime::{RunStats, run_source};

/// A single listing as delivered by an adapter, before eligibility
/// filtering and dedup.
#[derive(Debug, Clone)]
pub struct RawPosting {
    /// Defaults to the adapter's own tag when absent.
    pub source_id: Option<String>,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub salary_raw: Option<String>,
    pub contract_type: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub cv_profile: Option<String>,
    pub raw_data: Option<RawPayload>,
}

/// Source-specific extractors implement this; everything else about a run
/// (rate limits, checkpoints, drift detection, dedup) lives in the runtime.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &'static str;

    async fn scrape(&self, cx: &ScrapeContext) -> Result<Vec<RawPosting>, AppError>;
}

/// Compile-time adapter registry. New sources are added here, not through
/// runtime discovery.
pub fn adapter_for(tag: &str) -> Option<Box<dyn SourceAdapter>> {
    match tag {
        "greenhouse" => Some(Box::new(ats::GreenhouseAdapter)),
        "lever" => Some(Box::new(ats::LeverAdapter)),
        _ => None,
    }
}

/// Per-source polling intervals in hours.
pub const SCHEDULE: &[(&str, u64)] = &[("greenhouse", 8), ("lever", 8)];

/// Helpers handed to an adapter for the duration of one run.
pub struct ScrapeContext {
    pool: SqlitePool,
    source_id: String,
    run_id: i64,
    default_delay: (f64, f64),
}

impl ScrapeContext {
    pub fn new(
        pool: SqlitePool,
        source_id: &str,
        run_id: i64,
        default_delay: (f64, f64),
    ) -> Self {
        Self {
            pool,
            source_id: source_id.to_string(),
            run_id,
            default_delay,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Sleep a uniform random delay from this source's rate-limit window.
    /// Adapters call this between requests and between pages.
    pub async fn pause(&self) {
        let (low, high) =
            config::rate_limit_window(&self.source_id).unwrap_or(self.default_delay);
        let delay = rand::rng().random_range(low..=high);
        tracing::debug!(source = %self.source_id, delay_seconds = delay, "rate limit pause");
        tokio::time::sleep(std::time::Duration::from_secs_f64(delay)).await;
    }

    pub fn cookie_ttl_hours(&self) -> Option<u32> {
        config::cookie_ttl_hours(&self.source_id)
    }

    /// Persist an opaque resume blob (page cursor, seen ids). Only the
    /// latest checkpoint per source is retained.
    pub async fn save_checkpoint(&self, checkpoint: &Value) -> Result<(), AppError> {
        SourceRun::save_checkpoint(&self.pool, self.run_id, checkpoint).await?;
        tracing::debug!(source = %self.source_id, "checkpoint saved");
        Ok(())
    }

    pub async fn load_checkpoint(&self) -> Result<Option<Value>, AppError> {
        SourceRun::latest_checkpoint(&self.pool, &self.source_id).await
    }

    /// Hash a representative fragment of the current ingestion and compare
    /// it to the previous run's hash. Returns `false` when more than 30% of
    /// the hash nibbles changed — a sign the site layout drifted. The run
    /// still completes either way.
    pub async fn check_structure(&self, content: &str) -> Result<bool, AppError> {
        let current = hex::encode(Sha256::digest(content.as_bytes()));
        let previous =
            SourceRun::previous_structure_hash(&self.pool, &self.source_id, self.run_id).await?;

        sqlx::query("UPDATE source_runs SET structure_hash = $2 WHERE id = $1")
            .bind(self.run_id)
            .bind(&current)
            .execute(&self.pool)
            .await?;

        let Some(previous) = previous else {
            tracing::debug!(source = %self.source_id, hash = &current[..16], "structure hash baseline");
            return Ok(true);
        };

        let change_ratio = nibble_change_ratio(&previous, &current);
        if change_ratio > 0.30 {
            tracing::warn!(
                source = %self.source_id,
                change_ratio,
                previous = &previous[..16.min(previous.len())],
                current = &current[..16],
                "source structure changed"
            );
            return Ok(false);
        }
        Ok(true)
    }
}

/// Hamming-distance approximation over hex nibbles, in `[0, 1]`.
pub fn nibble_change_ratio(previous: &str, current: &str) -> f64 {
    if previous.len() != current.len() || current.is_empty() {
        return 1.0;
    }
    let mismatches = previous
        .chars()
        .zip(current.chars())
        .filter(|(a, b)| a != b)
        .count();
    mismatches as f64 / current.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_hashes_have_zero_ratio() {
        assert_eq!(nibble_change_ratio("abcd", "abcd"), 0.0);
    }

    #[test]
    fn length_mismatch_is_a_full_change() {
        assert_eq!(nibble_change_ratio("abc", "abcd"), 1.0);
        assert_eq!(nibble_change_ratio("", ""), 1.0);
    }

    #[test]
    fn partial_mismatch_is_proportional() {
        assert_eq!(nibble_change_ratio("aaaa", "aaab"), 0.25);
        assert_eq!(nibble_change_ratio("aaaa", "bbbb"), 1.0);
    }

    #[test]
    fn registry_knows_every_scheduled_source() {
        for (tag, _) in SCHEDULE {
            assert!(adapter_for(tag).is_some(), "no adapter for '{tag}'");
        }
        assert!(adapter_for("unknown").is_none());
    }
}
