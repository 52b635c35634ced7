use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use sqlx::types::Json;

use crate::error::AppError;

/// Reserved key inside a structured raw payload carrying the eligibility
/// skip reason.
pub const SKIP_REASON_KEY: &str = "_skip_reason";

/// Source-specific payload attached to a posting. Persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RawPayload {
    Opaque(Vec<u8>),
    Structured(serde_json::Map<String, Value>),
}

impl RawPayload {
    pub fn structured() -> Self {
        RawPayload::Structured(serde_json::Map::new())
    }

    /// Returns the stored skip reason, if any. Opaque payloads carry none.
    pub fn skip_reason(&self) -> Option<&str> {
        match self {
            RawPayload::Structured(map) => map.get(SKIP_REASON_KEY).and_then(Value::as_str),
            RawPayload::Opaque(_) => None,
        }
    }

    /// Sets or clears the skip reason. An opaque payload is promoted to a
    /// structured one holding only the reason.
    pub fn set_skip_reason(&mut self, reason: Option<&str>) {
        if let RawPayload::Opaque(_) = self {
            if reason.is_none() {
                return;
            }
            *self = RawPayload::structured();
        }
        if let RawPayload::Structured(map) = self {
            match reason {
                Some(r) => {
                    map.insert(SKIP_REASON_KEY.to_string(), Value::String(r.to_string()));
                }
                None => {
                    map.remove(SKIP_REASON_KEY);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PostingStatus {
    Scraped,
    Qualified,
    Skipped,
    Expired,
}

impl PostingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostingStatus::Scraped => "scraped",
            PostingStatus::Qualified => "qualified",
            PostingStatus::Skipped => "skipped",
            PostingStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Posting {
    pub id: i64,
    pub source_id: String,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub salary_raw: Option<String>,
    pub contract_type: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub scraped_at: DateTime<Utc>,
    pub status: PostingStatus,
    pub cv_profile: Option<String>,
    pub raw_data: Option<Json<RawPayload>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPosting {
    pub source_id: String,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub salary_raw: Option<String>,
    pub contract_type: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub status: PostingStatus,
    pub cv_profile: Option<String>,
    pub raw_data: Option<RawPayload>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostingFilters {
    pub source_id: Option<String>,
    pub status: Option<String>,
    pub cv_profile: Option<String>,
    pub search: Option<String>,
    pub cursor: Option<i64>,
    pub limit: Option<i64>,
}

/// Synthetic dedup key for sources without a platform id.
pub fn make_external_id(
    source_id: &str,
    title: &str,
    company: &str,
    location: &str,
    date: &str,
) -> String {
    let date_prefix = &date[..date.len().min(10)];
    let raw = format!(
        "{source_id}|{}|{}|{}|{date_prefix}",
        title.to_lowercase(),
        company.to_lowercase(),
        location.to_lowercase()
    );
    hex::encode(Sha256::digest(raw.as_bytes()))
}

impl Posting {
    /// Insert-or-ignore on `(source_id, external_id)`. The existing row wins;
    /// returns `(posting, is_new)`.
    pub async fn upsert(pool: &SqlitePool, input: NewPosting) -> Result<(Posting, bool), AppError> {
        let result = sqlx::query(
            "INSERT INTO postings (source_id, external_id, url, title, company, location, description, salary_raw, contract_type, posted_at, scraped_at, status, cv_profile, raw_data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (source_id, external_id) DO NOTHING",
        )
        .bind(&input.source_id)
        .bind(&input.external_id)
        .bind(&input.url)
        .bind(&input.title)
        .bind(&input.company)
        .bind(&input.location)
        .bind(&input.description)
        .bind(&input.salary_raw)
        .bind(&input.contract_type)
        .bind(input.posted_at)
        .bind(Utc::now())
        .bind(input.status)
        .bind(&input.cv_profile)
        .bind(input.raw_data.as_ref().map(Json))
        .execute(pool)
        .await?;

        let is_new = result.rows_affected() > 0;
        let posting = Self::get_by_external(pool, &input.source_id, &input.external_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "posting ({}, {}) missing after upsert",
                    input.source_id, input.external_id
                ))
            })?;

        // Existing rows are never overwritten, but the skip reason follows
        // the latest eligibility verdict.
        if !is_new {
            let new_reason = input.raw_data.as_ref().and_then(|r| r.skip_reason());
            let old_reason = posting
                .raw_data
                .as_ref()
                .and_then(|r| r.skip_reason())
                .map(str::to_string);
            if new_reason != old_reason.as_deref() {
                Self::update_skip_reason(pool, posting.id, new_reason).await?;
            }
        }

        Ok((posting, is_new))
    }

    pub async fn update_skip_reason(
        pool: &SqlitePool,
        id: i64,
        reason: Option<&str>,
    ) -> Result<(), AppError> {
        let row: Option<(Option<Json<RawPayload>>,)> =
            sqlx::query_as("SELECT raw_data FROM postings WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;
        let Some((raw,)) = row else {
            return Err(AppError::NotFound(format!("Posting {id} not found")));
        };

        let mut payload = raw.map(|j| j.0).unwrap_or_else(RawPayload::structured);
        payload.set_skip_reason(reason);

        sqlx::query("UPDATE postings SET raw_data = $2 WHERE id = $1")
            .bind(id)
            .bind(Json(&payload))
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn get(pool: &SqlitePool, id: i64) -> Result<Posting, AppError> {
        sqlx::query_as::<_, Posting>("SELECT * FROM postings WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Posting {id} not found")))
    }

    pub async fn get_by_external(
        pool: &SqlitePool,
        source_id: &str,
        external_id: &str,
    ) -> Result<Option<Posting>, AppError> {
        let posting = sqlx::query_as::<_, Posting>(
            "SELECT * FROM postings WHERE source_id = $1 AND external_id = $2",
        )
        .bind(source_id)
        .bind(external_id)
        .fetch_optional(pool)
        .await?;
        Ok(posting)
    }

    /// Cursor-paginated listing, newest first. Returns `(rows, next_cursor)`.
    pub async fn list(
        pool: &SqlitePool,
        filters: &PostingFilters,
    ) -> Result<(Vec<Posting>, Option<i64>), AppError> {
        let limit = filters.limit.unwrap_or(50).min(100);
        let mut rows = sqlx::query_as::<_, Posting>(
            "SELECT * FROM postings \
             WHERE ($1 IS NULL OR id < $1) \
               AND ($2 IS NULL OR source_id = $2) \
               AND ($3 IS NULL OR status = $3) \
               AND ($4 IS NULL OR cv_profile = $4) \
               AND ($5 IS NULL OR title LIKE '%' || $5 || '%' OR company LIKE '%' || $5 || '%') \
             ORDER BY id DESC LIMIT $6",
        )
        .bind(filters.cursor)
        .bind(&filters.source_id)
        .bind(&filters.status)
        .bind(&filters.cv_profile)
        .bind(&filters.search)
        .bind(limit + 1)
        .fetch_all(pool)
        .await?;

        let next_cursor = if rows.len() as i64 > limit {
            rows.truncate(limit as usize);
            rows.last().map(|p| p.id)
        } else {
            None
        };
        Ok((rows, next_cursor))
    }

    pub async fn count_by_status(pool: &SqlitePool) -> Result<Vec<(String, i64)>, AppError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM postings GROUP BY status")
                .fetch_all(pool)
                .await?;
        Ok(rows)
    }

    /// Retention sweep: delete postings older than the cutoff that no
    /// application references. Returns the number of rows removed.
    pub async fn sweep_unreferenced(
        pool: &SqlitePool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM postings \
             WHERE scraped_at < $1 \
               AND id NOT IN (SELECT DISTINCT posting_id FROM applications)",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_id_is_stable_and_case_insensitive() {
        let a = make_external_id("infojobs", "Cajero", "Mercadona", "Madrid", "2026-07-01T09:00:00");
        let b = make_external_id("infojobs", "cajero", "MERCADONA", "madrid", "2026-07-01T23:59:59");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn skip_reason_roundtrip_and_opaque_promotion() {
        let mut payload = RawPayload::Opaque(vec![1, 2, 3]);
        assert_eq!(payload.skip_reason(), None);

        payload.set_skip_reason(Some("temporal contract detected: 'eventual'"));
        assert_eq!(
            payload.skip_reason(),
            Some("temporal contract detected: 'eventual'")
        );

        payload.set_skip_reason(None);
        assert_eq!(payload.skip_reason(), None);
    }
}
