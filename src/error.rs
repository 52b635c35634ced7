use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Illegal transition: {0} -> {1}")]
    IllegalTransition(String, String),

    #[error("Company blocked: {0}")]
    CompanyBlocked(String),

    #[error("Company rate limit reached: {0}")]
    CompanyRateLimited(String),

    #[error("LLM backend error: {0}")]
    Llm(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(e) => {
                if let sqlx::Error::Database(db_err) = e
                    && db_err.is_unique_violation()
                {
                    return (
                        StatusCode::CONFLICT,
                        axum::Json(json!({ "error": "Resource already exists" })),
                    )
                        .into_response();
                }
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::IllegalTransition(old, new) => (
                StatusCode::CONFLICT,
                format!("Illegal transition: {old} -> {new}"),
            ),
            AppError::CompanyBlocked(company) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Company '{company}' is blocklisted"),
            ),
            AppError::CompanyRateLimited(company) => (
                StatusCode::TOO_MANY_REQUESTS,
                format!("Application limit reached for '{company}'"),
            ),
            AppError::Llm(msg) => {
                tracing::error!("LLM backend error: {msg}");
                (StatusCode::BAD_GATEWAY, "LLM backend error".to_string())
            }
            AppError::Browser(msg) => {
                tracing::error!("Browser error: {msg}");
                (StatusCode::BAD_GATEWAY, "Browser error".to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = axum::Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
