use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::settings::Settings;
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct SetSetting {
    pub key: String,
    pub value: String,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let rows = Settings::all(&state.pool).await?;
    let map: serde_json::Map<String, Value> = rows
        .into_iter()
        .map(|(k, v)| (k, v.map(Value::String).unwrap_or(Value::Null)))
        .collect();
    Ok(Json(Value::Object(map)))
}

pub async fn set(
    State(state): State<AppState>,
    Json(input): Json<SetSetting>,
) -> Result<Json<Value>, AppError> {
    Settings::set(&state.pool, &input.key, &input.value).await?;
    Ok(Json(json!({ "key": input.key, "value": input.value })))
}
