use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::company::{CompanyApplicationRule, CompanyBlocklist};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct BlockCompany {
    pub company_name: String,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertRule {
    pub company_name: String,
    pub max_per_period: i64,
    pub period_days: i64,
}

pub async fn list_blocklist(
    State(state): State<AppState>,
) -> Result<Json<Vec<CompanyBlocklist>>, AppError> {
    Ok(Json(CompanyBlocklist::list(&state.pool).await?))
}

pub async fn block(
    State(state): State<AppState>,
    Json(input): Json<BlockCompany>,
) -> Result<Json<CompanyBlocklist>, AppError> {
    let entry =
        CompanyBlocklist::add(&state.pool, &input.company_name, input.reason.as_deref()).await?;
    Ok(Json(entry))
}

pub async fn unblock(
    State(state): State<AppState>,
    Path(company): Path<String>,
) -> Result<Json<Value>, AppError> {
    CompanyBlocklist::remove(&state.pool, &company).await?;
    Ok(Json(json!({ "removed": company })))
}

pub async fn list_rules(
    State(state): State<AppState>,
) -> Result<Json<Vec<CompanyApplicationRule>>, AppError> {
    Ok(Json(CompanyApplicationRule::list(&state.pool).await?))
}

pub async fn upsert_rule(
    State(state): State<AppState>,
    Json(input): Json<UpsertRule>,
) -> Result<Json<CompanyApplicationRule>, AppError> {
    let rule = CompanyApplicationRule::upsert(
        &state.pool,
        &input.company_name,
        input.max_per_period,
        input.period_days,
    )
    .await?;
    Ok(Json(rule))
}
