use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::types::Json;

use crate::config::{COMPANY_RULE_DEFAULT_DAYS, COMPANY_RULE_DEFAULT_MAX};
use crate::documents::CvDocument;
use crate::error::AppError;
use crate::forms::SnapshotFields;
use crate::models::company::{CompanyApplicationRule, CompanyBlocklist};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Scraped,
    Qualified,
    CvGenerating,
    CvReady,
    CvFailedValidation,
    CvApproved,
    ApplicationStarted,
    FormFilled,
    PendingHumanReview,
    SubmittedAmbiguous,
    Applied,
    Acknowledged,
    InterviewScheduled,
    Interviewed,
    Offered,
    Rejected,
    Withdrawn,
    Expired,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Scraped => "scraped",
            ApplicationStatus::Qualified => "qualified",
            ApplicationStatus::CvGenerating => "cv_generating",
            ApplicationStatus::CvReady => "cv_ready",
            ApplicationStatus::CvFailedValidation => "cv_failed_validation",
            ApplicationStatus::CvApproved => "cv_approved",
            ApplicationStatus::ApplicationStarted => "application_started",
            ApplicationStatus::FormFilled => "form_filled",
            ApplicationStatus::PendingHumanReview => "pending_human_review",
            ApplicationStatus::SubmittedAmbiguous => "submitted_ambiguous",
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Acknowledged => "acknowledged",
            ApplicationStatus::InterviewScheduled => "interview_scheduled",
            ApplicationStatus::Interviewed => "interviewed",
            ApplicationStatus::Offered => "offered",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
            ApplicationStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::CvFailedValidation
                | ApplicationStatus::Offered
                | ApplicationStatus::Rejected
                | ApplicationStatus::Withdrawn
                | ApplicationStatus::Expired
        )
    }

    /// Legal transition table. Every status change must pass through
    /// [`Application::transition`], which rejects pairs not listed here.
    pub fn can_transition(from: ApplicationStatus, to: ApplicationStatus) -> bool {
        use ApplicationStatus::*;

        // Any non-terminal application can be rejected, withdrawn or expired.
        if matches!(to, Rejected | Withdrawn | Expired) {
            return !from.is_terminal();
        }

        matches!(
            (from, to),
            (Scraped, Qualified)
                | (Qualified, CvGenerating)
                | (CvGenerating, CvReady)
                | (CvGenerating, CvFailedValidation)
                | (CvReady, CvApproved)
                | (CvApproved, ApplicationStarted)
                | (ApplicationStarted, FormFilled)
                | (FormFilled, PendingHumanReview)
                // Human authorization returns the application to cv_approved
                // before the submit task runs.
                | (PendingHumanReview, CvApproved)
                | (PendingHumanReview, Applied)
                | (PendingHumanReview, SubmittedAmbiguous)
                | (CvApproved, Applied)
                | (CvApproved, SubmittedAmbiguous)
                | (SubmittedAmbiguous, Applied)
                | (Applied, Acknowledged)
                | (Acknowledged, InterviewScheduled)
                | (InterviewScheduled, Interviewed)
                | (Interviewed, Offered)
        )
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Application {
    pub id: i64,
    pub posting_id: i64,
    pub status: ApplicationStatus,
    pub cv_profile: String,
    pub company: String,

    pub cv_canonical: Option<Json<CvDocument>>,
    pub cv_adapted: Option<Json<CvDocument>>,
    pub cv_pdf_path: Option<String>,
    pub cover_letter_text: Option<String>,
    pub quality_score: Option<f64>,
    pub quality_rubric: Option<Json<Value>>,

    pub form_screenshot_path: Option<String>,
    pub form_fields: Option<Json<SnapshotFields>>,
    pub form_url: Option<String>,

    pub confirmation_screenshot_path: Option<String>,
    pub confirmation_signal: Option<String>,

    pub authorized_by_human: bool,
    pub authorized_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Extra field updates applied atomically with a status change. `None`
/// leaves the stored value untouched.
#[derive(Debug, Default)]
pub struct ApplicationPatch {
    pub cv_canonical: Option<CvDocument>,
    pub cv_adapted: Option<CvDocument>,
    pub cv_pdf_path: Option<String>,
    pub cover_letter_text: Option<String>,
    pub quality_score: Option<f64>,
    pub quality_rubric: Option<Value>,
    pub form_screenshot_path: Option<String>,
    pub form_fields: Option<SnapshotFields>,
    pub form_url: Option<String>,
    pub confirmation_screenshot_path: Option<String>,
    pub confirmation_signal: Option<String>,
    pub authorized_by_human: Option<bool>,
    pub authorized_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationFilters {
    pub status: Option<String>,
    pub cursor: Option<i64>,
    pub limit: Option<i64>,
}

impl Application {
    /// Create an application for a posting after the per-company policy
    /// checks pass. The initial event (old status NULL) is written in the
    /// same transaction.
    pub async fn create(
        pool: &SqlitePool,
        posting_id: i64,
        cv_profile: &str,
        company: &str,
    ) -> Result<Application, AppError> {
        if CompanyBlocklist::contains(pool, company).await? {
            return Err(AppError::CompanyBlocked(company.to_string()));
        }
        if !Self::under_company_rate_limit(pool, company).await? {
            return Err(AppError::CompanyRateLimited(company.to_string()));
        }

        let now = Utc::now();
        let mut tx = pool.begin().await?;
        let app = sqlx::query_as::<_, Application>(
            "INSERT INTO applications (posting_id, status, cv_profile, company, authorized_by_human, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, 0, $5, $5) RETURNING *",
        )
        .bind(posting_id)
        .bind(ApplicationStatus::Scraped)
        .bind(cv_profile)
        .bind(company)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO application_events (application_id, old_status, new_status, triggered_by, note, created_at) \
             VALUES ($1, NULL, $2, $3, NULL, $4)",
        )
        .bind(app.id)
        .bind(ApplicationStatus::Scraped)
        .bind("system")
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(app)
    }

    /// The single status-change gate. Writes the new status, `updated_at`
    /// and the patch, and appends the audit event — all in one transaction.
    pub async fn transition(
        pool: &SqlitePool,
        id: i64,
        new_status: ApplicationStatus,
        triggered_by: &str,
        note: Option<&str>,
        patch: ApplicationPatch,
    ) -> Result<Application, AppError> {
        let mut tx = pool.begin().await?;

        let existing =
            sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))?;

        if !ApplicationStatus::can_transition(existing.status, new_status) {
            return Err(AppError::IllegalTransition(
                existing.status.as_str().to_string(),
                new_status.as_str().to_string(),
            ));
        }

        let now = Utc::now();
        let updated = sqlx::query_as::<_, Application>(
            "UPDATE applications SET \
                status = $2, updated_at = $3, \
                cv_canonical = $4, cv_adapted = $5, cv_pdf_path = $6, \
                cover_letter_text = $7, quality_score = $8, quality_rubric = $9, \
                form_screenshot_path = $10, form_fields = $11, form_url = $12, \
                confirmation_screenshot_path = $13, confirmation_signal = $14, \
                authorized_by_human = $15, authorized_at = $16 \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(new_status)
        .bind(now)
        .bind(patch.cv_canonical.map(Json).or(existing.cv_canonical))
        .bind(patch.cv_adapted.map(Json).or(existing.cv_adapted))
        .bind(patch.cv_pdf_path.or(existing.cv_pdf_path))
        .bind(patch.cover_letter_text.or(existing.cover_letter_text))
        .bind(patch.quality_score.or(existing.quality_score))
        .bind(patch.quality_rubric.map(Json).or(existing.quality_rubric))
        .bind(patch.form_screenshot_path.or(existing.form_screenshot_path))
        .bind(patch.form_fields.map(Json).or(existing.form_fields))
        .bind(patch.form_url.or(existing.form_url))
        .bind(
            patch
                .confirmation_screenshot_path
                .or(existing.confirmation_screenshot_path),
        )
        .bind(patch.confirmation_signal.or(existing.confirmation_signal))
        .bind(
            patch
                .authorized_by_human
                .unwrap_or(existing.authorized_by_human),
        )
        .bind(patch.authorized_at.or(existing.authorized_at))
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO application_events (application_id, old_status, new_status, triggered_by, note, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(existing.status)
        .bind(new_status)
        .bind(triggered_by)
        .bind(note)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Record the rendered PDF path. An artifact update, not a status
    /// change, so it bypasses the transition gate.
    pub async fn set_pdf_path(
        pool: &SqlitePool,
        id: i64,
        path: &std::path::Path,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE applications SET cv_pdf_path = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(path.to_string_lossy().into_owned())
            .bind(Utc::now())
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn get(pool: &SqlitePool, id: i64) -> Result<Application, AppError> {
        sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))
    }

    pub async fn list(
        pool: &SqlitePool,
        filters: &ApplicationFilters,
    ) -> Result<(Vec<Application>, Option<i64>), AppError> {
        let limit = filters.limit.unwrap_or(50).min(100);
        let mut rows = sqlx::query_as::<_, Application>(
            "SELECT * FROM applications \
             WHERE ($1 IS NULL OR id < $1) AND ($2 IS NULL OR status = $2) \
             ORDER BY id DESC LIMIT $3",
        )
        .bind(filters.cursor)
        .bind(&filters.status)
        .bind(limit + 1)
        .fetch_all(pool)
        .await?;

        let next_cursor = if rows.len() as i64 > limit {
            rows.truncate(limit as usize);
            rows.last().map(|a| a.id)
        } else {
            None
        };
        Ok((rows, next_cursor))
    }

    pub async fn count_by_status(pool: &SqlitePool) -> Result<Vec<(String, i64)>, AppError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM applications GROUP BY status")
                .fetch_all(pool)
                .await?;
        Ok(rows)
    }

    /// Applications parked for human review, oldest review first.
    pub async fn pending_reviews(pool: &SqlitePool) -> Result<Vec<Application>, AppError> {
        let rows = sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE status = $1 ORDER BY updated_at ASC",
        )
        .bind(ApplicationStatus::PendingHumanReview)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    async fn under_company_rate_limit(
        pool: &SqlitePool,
        company: &str,
    ) -> Result<bool, AppError> {
        let rule = CompanyApplicationRule::for_company(pool, company).await?;
        let (max_per_period, period_days) = rule
            .map(|r| (r.max_per_period, r.period_days))
            .unwrap_or((COMPANY_RULE_DEFAULT_MAX, COMPANY_RULE_DEFAULT_DAYS));

        let cutoff = Utc::now() - Duration::days(period_days);
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM applications \
             WHERE LOWER(company) = LOWER($1) \
               AND status NOT IN ('rejected', 'withdrawn', 'expired') \
               AND created_at >= $2",
        )
        .bind(company)
        .bind(cutoff)
        .fetch_one(pool)
        .await?;

        Ok(count < max_per_period)
    }

    /// Retention sweep: delete terminal applications (and their events)
    /// older than the cutoff. Returns the number of applications removed.
    pub async fn sweep_terminal(
        pool: &SqlitePool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut tx = pool.begin().await?;
        sqlx::query(
            "DELETE FROM application_events WHERE application_id IN \
             (SELECT id FROM applications WHERE created_at < $1 \
              AND status IN ('rejected', 'withdrawn', 'expired'))",
        )
        .bind(cutoff)
        .execute(&mut *tx)
        .await?;
        let result = sqlx::query(
            "DELETE FROM applications WHERE created_at < $1 \
             AND status IN ('rejected', 'withdrawn', 'expired')",
        )
        .bind(cutoff)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
