use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::types::Json;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Disabled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SourceRun {
    pub id: i64,
    pub source_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub jobs_found: i64,
    pub jobs_new: i64,
    pub checkpoint: Option<Json<Value>>,
    pub structure_hash: Option<String>,
    pub consecutive_zero_runs: i64,
    pub error_message: Option<String>,
}

impl SourceRun {
    pub async fn start(pool: &SqlitePool, source_id: &str) -> Result<SourceRun, AppError> {
        let run = sqlx::query_as::<_, SourceRun>(
            "INSERT INTO source_runs (source_id, status, started_at) \
             VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(source_id)
        .bind(RunStatus::Running)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;
        Ok(run)
    }

    /// Finalize a run. `consecutive_zero_runs` increments only on a
    /// completed run with zero findings and resets to 0 otherwise.
    pub async fn finish(
        pool: &SqlitePool,
        id: i64,
        status: RunStatus,
        jobs_found: i64,
        jobs_new: i64,
        structure_hash: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<SourceRun, AppError> {
        let previous: Option<(i64,)> = sqlx::query_as(
            "SELECT consecutive_zero_runs FROM source_runs \
             WHERE source_id = (SELECT source_id FROM source_runs WHERE id = $1) \
               AND id != $1 \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        let previous_zeros = previous.map(|(z,)| z).unwrap_or(0);

        let zeros = if status == RunStatus::Completed && jobs_found == 0 {
            previous_zeros + 1
        } else {
            0
        };

        let run = sqlx::query_as::<_, SourceRun>(
            "UPDATE source_runs SET \
                status = $2, finished_at = $3, jobs_found = $4, jobs_new = $5, \
                structure_hash = COALESCE($6, structure_hash), \
                consecutive_zero_runs = $7, error_message = $8 \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .bind(jobs_found)
        .bind(jobs_new)
        .bind(structure_hash)
        .bind(zeros)
        .bind(error_message)
        .fetch_one(pool)
        .await?;
        Ok(run)
    }

    /// Most recent finalized or running run for a source.
    pub async fn latest_for(
        pool: &SqlitePool,
        source_id: &str,
    ) -> Result<Option<SourceRun>, AppError> {
        let run = sqlx::query_as::<_, SourceRun>(
            "SELECT * FROM source_runs WHERE source_id = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(source_id)
        .fetch_optional(pool)
        .await?;
        Ok(run)
    }

    /// Latest checkpoint blob saved by any previous run of this source.
    pub async fn latest_checkpoint(
        pool: &SqlitePool,
        source_id: &str,
    ) -> Result<Option<Value>, AppError> {
        let row: Option<(Json<Value>,)> = sqlx::query_as(
            "SELECT checkpoint FROM source_runs \
             WHERE source_id = $1 AND checkpoint IS NOT NULL \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(source_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(j,)| j.0))
    }

    pub async fn save_checkpoint(
        pool: &SqlitePool,
        id: i64,
        checkpoint: &Value,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE source_runs SET checkpoint = $2 WHERE id = $1")
            .bind(id)
            .bind(Json(checkpoint))
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Structure hash recorded by the most recent run other than `self_id`.
    pub async fn previous_structure_hash(
        pool: &SqlitePool,
        source_id: &str,
        self_id: i64,
    ) -> Result<Option<String>, AppError> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            "SELECT structure_hash FROM source_runs \
             WHERE source_id = $1 AND id != $2 \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(source_id)
        .bind(self_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.and_then(|(h,)| h))
    }

    /// Finalize runs left in `running` state by a crash or cancellation.
    /// Returns how many rows were touched.
    pub async fn recover_stale(pool: &SqlitePool, reason: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE source_runs SET status = $1, finished_at = $2, \
                consecutive_zero_runs = 0, error_message = $3 \
             WHERE status = $4",
        )
        .bind(RunStatus::Failed)
        .bind(Utc::now())
        .bind(reason)
        .bind(RunStatus::Running)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn recent(pool: &SqlitePool, limit: i64) -> Result<Vec<SourceRun>, AppError> {
        let runs = sqlx::query_as::<_, SourceRun>(
            "SELECT * FROM source_runs ORDER BY started_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(runs)
    }
}
