use axum::Json;
use axum::extract::{Path, Query, State};
use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::posting::{Posting, PostingFilters};
use crate::routes::AppState;

pub async fn list(
    State(state): State<AppState>,
    Query(filters): Query<PostingFilters>,
) -> Result<Json<Value>, AppError> {
    let (items, next_cursor) = Posting::list(&state.pool, &filters).await?;
    Ok(Json(json!({ "items": items, "next_cursor": next_cursor })))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Posting>, AppError> {
    Ok(Json(Posting::get(&state.pool, id).await?))
}

pub async fn counts(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let rows = Posting::count_by_status(&state.pool).await?;
    let map: serde_json::Map<String, Value> =
        rows.into_iter().map(|(k, v)| (k, json!(v))).collect();
    Ok(Json(Value::Object(map)))
}
