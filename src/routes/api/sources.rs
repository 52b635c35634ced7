use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::source::{CatalogueSource, UpsertCatalogueSource};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct SourceQuery {
    pub enabled_only: Option<bool>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<SourceQuery>,
) -> Result<Json<Vec<CatalogueSource>>, AppError> {
    let rows = CatalogueSource::list(&state.pool, query.enabled_only.unwrap_or(true)).await?;
    Ok(Json(rows))
}

pub async fn upsert(
    State(state): State<AppState>,
    Json(input): Json<UpsertCatalogueSource>,
) -> Result<Json<CatalogueSource>, AppError> {
    Ok(Json(CatalogueSource::upsert(&state.pool, input).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    CatalogueSource::delete(&state.pool, id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}
