use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::AppError;

/// String key-value settings store, last writer wins.
pub struct Settings;

impl Settings {
    pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<String>, AppError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT value FROM settings WHERE key = $1")
                .bind(key)
                .fetch_optional(pool)
                .await?;
        Ok(row.and_then(|(v,)| v))
    }

    pub async fn set(pool: &SqlitePool, key: &str, value: &str) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn all(pool: &SqlitePool) -> Result<Vec<(String, Option<String>)>, AppError> {
        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT key, value FROM settings ORDER BY key")
                .fetch_all(pool)
                .await?;
        Ok(rows)
    }
}
