use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::application::ApplicationStatus;

/// One row of the append-only audit log. Written exclusively by the
/// application transition gate; never updated or deleted outside the
/// retention sweep.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ApplicationEvent {
    pub id: i64,
    pub application_id: i64,
    pub old_status: Option<ApplicationStatus>,
    pub new_status: ApplicationStatus,
    pub triggered_by: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventFilters {
    pub application_id: Option<i64>,
    pub limit: Option<i64>,
}

impl ApplicationEvent {
    pub async fn list(
        pool: &SqlitePool,
        filters: &EventFilters,
    ) -> Result<Vec<ApplicationEvent>, AppError> {
        let limit = filters.limit.unwrap_or(100).min(500);
        let events = sqlx::query_as::<_, ApplicationEvent>(
            "SELECT * FROM application_events \
             WHERE ($1 IS NULL OR application_id = $1) \
             ORDER BY id DESC LIMIT $2",
        )
        .bind(filters.application_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(events)
    }

    /// Full ordered history for one application, oldest first.
    pub async fn history(
        pool: &SqlitePool,
        application_id: i64,
    ) -> Result<Vec<ApplicationEvent>, AppError> {
        let events = sqlx::query_as::<_, ApplicationEvent>(
            "SELECT * FROM application_events WHERE application_id = $1 ORDER BY id ASC",
        )
        .bind(application_id)
        .fetch_all(pool)
        .await?;
        Ok(events)
    }
}
