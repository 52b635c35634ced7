use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::types::Json;

use crate::error::AppError;

/// A configured career-page or ATS endpoint consumed by the generic
/// catalogue adapter. Unique on `(company_name, source_url)`.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CatalogueSource {
    pub id: i64,
    pub company_name: String,
    pub source_url: String,
    pub adapter_kind: String,
    pub css_selector: Option<String>,
    pub extra_config: Option<Json<Value>>,
    pub enabled: bool,
    pub cv_profile: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertCatalogueSource {
    pub company_name: String,
    pub source_url: String,
    pub adapter_kind: String,
    pub css_selector: Option<String>,
    pub extra_config: Option<Value>,
    pub enabled: Option<bool>,
    pub cv_profile: Option<String>,
}

impl CatalogueSource {
    pub async fn list(
        pool: &SqlitePool,
        enabled_only: bool,
    ) -> Result<Vec<CatalogueSource>, AppError> {
        let rows = sqlx::query_as::<_, CatalogueSource>(
            "SELECT * FROM source_catalogue \
             WHERE ($1 = 0 OR enabled = 1) \
             ORDER BY company_name",
        )
        .bind(enabled_only)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_kind(
        pool: &SqlitePool,
        adapter_kind: &str,
    ) -> Result<Vec<CatalogueSource>, AppError> {
        let rows = sqlx::query_as::<_, CatalogueSource>(
            "SELECT * FROM source_catalogue \
             WHERE adapter_kind = $1 AND enabled = 1 \
             ORDER BY company_name",
        )
        .bind(adapter_kind)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn upsert(
        pool: &SqlitePool,
        input: UpsertCatalogueSource,
    ) -> Result<CatalogueSource, AppError> {
        let source = sqlx::query_as::<_, CatalogueSource>(
            "INSERT INTO source_catalogue \
                (company_name, source_url, adapter_kind, css_selector, extra_config, enabled, cv_profile, added_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (company_name, source_url) DO UPDATE SET \
                adapter_kind = excluded.adapter_kind, \
                css_selector = excluded.css_selector, \
                extra_config = excluded.extra_config, \
                enabled = excluded.enabled, \
                cv_profile = excluded.cv_profile \
             RETURNING *",
        )
        .bind(&input.company_name)
        .bind(&input.source_url)
        .bind(&input.adapter_kind)
        .bind(&input.css_selector)
        .bind(input.extra_config.map(Json))
        .bind(input.enabled.unwrap_or(true))
        .bind(input.cv_profile.as_deref().unwrap_or("fullstack_dev"))
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;
        Ok(source)
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM source_catalogue WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Catalogue source {id} not found")));
        }
        Ok(())
    }
}
