use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::documents::CvDocument;
use crate::error::AppError;
use crate::human_loop::AuthorizeOutcome;
use crate::models::application::{
    Application, ApplicationFilters, ApplicationPatch, ApplicationStatus,
};
use crate::models::event::ApplicationEvent;
use crate::models::posting::Posting;
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateApplication {
    pub posting_id: i64,
    pub cv_profile: Option<String>,
    pub cv_canonical: Option<CvDocument>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatus {
    pub status: ApplicationStatus,
    pub note: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(filters): Query<ApplicationFilters>,
) -> Result<Json<Value>, AppError> {
    let (items, next_cursor) = Application::list(&state.pool, &filters).await?;
    Ok(Json(json!({ "items": items, "next_cursor": next_cursor })))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Application>, AppError> {
    Ok(Json(Application::get(&state.pool, id).await?))
}

pub async fn counts(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let rows = Application::count_by_status(&state.pool).await?;
    let map: serde_json::Map<String, Value> =
        rows.into_iter().map(|(k, v)| (k, json!(v))).collect();
    Ok(Json(Value::Object(map)))
}

pub async fn pending_reviews(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let items = Application::pending_reviews(&state.pool).await?;
    Ok(Json(json!({ "count": items.len(), "items": items })))
}

pub async fn events(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ApplicationEvent>>, AppError> {
    Ok(Json(ApplicationEvent::history(&state.pool, id).await?))
}

/// Create an application for a posting; company and profile default from
/// the posting. Blocklist and per-company rate limit apply here.
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateApplication>,
) -> Result<Json<Application>, AppError> {
    let posting = Posting::get(&state.pool, input.posting_id).await?;
    let profile = input
        .cv_profile
        .or(posting.cv_profile.clone())
        .unwrap_or_else(|| "fullstack_dev".to_string());

    let app =
        Application::create(&state.pool, posting.id, &profile, &posting.company).await?;

    if let Some(canonical) = input.cv_canonical {
        let app = Application::transition(
            &state.pool,
            app.id,
            ApplicationStatus::Qualified,
            "system",
            None,
            ApplicationPatch {
                cv_canonical: Some(canonical),
                ..Default::default()
            },
        )
        .await?;
        return Ok(Json(app));
    }
    Ok(Json(app))
}

/// Kick the document pipeline for a qualified application. Runs in the
/// background; progress lands on the event stream.
pub async fn generate_cv(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    // Fail fast on unknown ids before spawning.
    Application::get(&state.pool, id).await?;

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        match pipeline.run(id).await {
            Ok(outcome) => tracing::info!(
                application_id = id,
                passed = outcome.passed,
                "cv generation finished"
            ),
            Err(e) => tracing::error!(application_id = id, "cv generation failed: {e}"),
        }
    });

    Ok(Json(json!({ "status": "started", "application_id": id })))
}

pub async fn authorize(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    match state.human_loop.clone().authorize(id).await? {
        AuthorizeOutcome::Expired => Ok(Json(json!({ "status": "expired" }))),
        AuthorizeOutcome::Submitting => Ok(Json(json!({ "status": "submitting" }))),
    }
}

/// Manual transition endpoint (acknowledged, rejected, withdrawn, ...).
/// The gate rejects anything not in the legal table.
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<SetStatus>,
) -> Result<Json<Application>, AppError> {
    let app = Application::transition(
        &state.pool,
        id,
        input.status,
        "human",
        input.note.as_deref(),
        ApplicationPatch::default(),
    )
    .await?;

    // Leaving review by hand must tear down the expiry timer.
    if input.status != ApplicationStatus::PendingHumanReview {
        state.human_loop.cancel_review_timer(id);
    }
    if input.status == ApplicationStatus::Rejected {
        state.bus.emit(
            crate::events::Topic::ApplicationRejected,
            json!({ "application_id": id }),
        );
    }
    Ok(Json(app))
}
