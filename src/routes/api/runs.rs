use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::source_run::SourceRun;
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct RunQuery {
    pub limit: Option<i64>,
}

pub async fn recent(
    State(state): State<AppState>,
    Query(query): Query<RunQuery>,
) -> Result<Json<Vec<SourceRun>>, AppError> {
    let limit = query.limit.unwrap_or(20).min(100);
    Ok(Json(SourceRun::recent(&state.pool, limit).await?))
}

/// Manual scrape trigger. Refused while a run for the same source is in
/// flight.
pub async fn trigger(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<Value>, AppError> {
    let stats = state.scheduler.trigger(&tag).await?;
    Ok(Json(json!({
        "source_id": stats.source_id,
        "status": stats.status.as_str(),
        "jobs_found": stats.jobs_found,
        "jobs_new": stats.jobs_new,
        "error": stats.error,
    })))
}
