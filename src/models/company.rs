use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::AppError;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CompanyBlocklist {
    pub id: i64,
    pub company_name: String,
    pub reason: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl CompanyBlocklist {
    pub async fn contains(pool: &SqlitePool, company: &str) -> Result<bool, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM company_blocklist WHERE LOWER(company_name) = LOWER($1)",
        )
        .bind(company)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn add(
        pool: &SqlitePool,
        company: &str,
        reason: Option<&str>,
    ) -> Result<CompanyBlocklist, AppError> {
        let entry = sqlx::query_as::<_, CompanyBlocklist>(
            "INSERT INTO company_blocklist (company_name, reason, added_at) \
             VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(company)
        .bind(reason)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;
        Ok(entry)
    }

    pub async fn remove(pool: &SqlitePool, company: &str) -> Result<(), AppError> {
        let result =
            sqlx::query("DELETE FROM company_blocklist WHERE LOWER(company_name) = LOWER($1)")
                .bind(company)
                .execute(pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Company '{company}' not in blocklist"
            )));
        }
        Ok(())
    }

    pub async fn list(pool: &SqlitePool) -> Result<Vec<CompanyBlocklist>, AppError> {
        let rows = sqlx::query_as::<_, CompanyBlocklist>(
            "SELECT * FROM company_blocklist ORDER BY company_name",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}

/// Per-company application throttle: at most `max_per_period` live
/// applications inside a rolling `period_days` window.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompanyApplicationRule {
    pub id: i64,
    pub company_name: String,
    pub max_per_period: i64,
    pub period_days: i64,
    pub added_at: DateTime<Utc>,
}

impl CompanyApplicationRule {
    pub async fn for_company(
        pool: &SqlitePool,
        company: &str,
    ) -> Result<Option<CompanyApplicationRule>, AppError> {
        let rule = sqlx::query_as::<_, CompanyApplicationRule>(
            "SELECT * FROM company_application_rules WHERE LOWER(company_name) = LOWER($1)",
        )
        .bind(company)
        .fetch_optional(pool)
        .await?;
        Ok(rule)
    }

    pub async fn upsert(
        pool: &SqlitePool,
        company: &str,
        max_per_period: i64,
        period_days: i64,
    ) -> Result<CompanyApplicationRule, AppError> {
        let rule = sqlx::query_as::<_, CompanyApplicationRule>(
            "INSERT INTO company_application_rules (company_name, max_per_period, period_days, added_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (company_name) DO UPDATE SET \
                max_per_period = excluded.max_per_period, \
                period_days = excluded.period_days \
             RETURNING *",
        )
        .bind(company)
        .bind(max_per_period)
        .bind(period_days)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;
        Ok(rule)
    }

    pub async fn list(pool: &SqlitePool) -> Result<Vec<CompanyApplicationRule>, AppError> {
        let rows = sqlx::query_as::<_, CompanyApplicationRule>(
            "SELECT * FROM company_application_rules ORDER BY company_name",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
