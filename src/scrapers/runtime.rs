//! Per-source run lifecycle: consecutive-zero disablement, run bookkeeping,
//! eligibility filtering, and dedup upsert.

use serde_json::json;
use sqlx::SqlitePool;

use crate::eligibility::{PostingFacts, is_eligible};
use crate::error::AppError;
use crate::events::{EventBus, Topic};
use crate::models::posting::{NewPosting, Posting, PostingStatus, RawPayload};
use crate::models::source_run::{RunStatus, SourceRun};
use crate::scrapers::{RawPosting, ScrapeContext, SourceAdapter};

#[derive(Debug)]
pub struct RunStats {
    pub source_id: String,
    pub jobs_found: i64,
    pub jobs_new: i64,
    pub status: RunStatus,
    pub error: Option<String>,
}

/// Execute one run of a source adapter end to end. At most one run per
/// source may be in flight; the scheduler enforces that.
pub async fn run_source(
    pool: &SqlitePool,
    bus: &EventBus,
    adapter: &dyn SourceAdapter,
    zero_disable_threshold: i64,
    default_delay: (f64, f64),
) -> Result<RunStats, AppError> {
    let source_id = adapter.source_id();
    tracing::info!(source = source_id, "scraper starting");

    // A source that keeps coming back empty is disabled without touching
    // the adapter and without creating a run row.
    if let Some(latest) = SourceRun::latest_for(pool, source_id).await?
        && latest.consecutive_zero_runs >= zero_disable_threshold
    {
        tracing::warn!(
            source = source_id,
            consecutive = latest.consecutive_zero_runs,
            "scraper disabled: too many consecutive zero runs"
        );
        bus.emit(
            Topic::ScraperFinished,
            json!({ "source_id": source_id, "status": "disabled" }),
        );
        return Ok(RunStats {
            source_id: source_id.to_string(),
            jobs_found: 0,
            jobs_new: 0,
            status: RunStatus::Disabled,
            error: None,
        });
    }

    let run = SourceRun::start(pool, source_id).await?;
    let cx = ScrapeContext::new(pool.clone(), source_id, run.id, default_delay);

    let postings = match adapter.scrape(&cx).await {
        Ok(postings) => postings,
        Err(e) => {
            let message = e.to_string();
            tracing::error!(source = source_id, "scraper failed: {message}");
            SourceRun::finish(pool, run.id, RunStatus::Failed, 0, 0, None, Some(&message))
                .await?;
            bus.emit(
                Topic::ScraperError,
                json!({ "source_id": source_id, "error": &message }),
            );
            return Ok(RunStats {
                source_id: source_id.to_string(),
                jobs_found: 0,
                jobs_new: 0,
                status: RunStatus::Failed,
                error: Some(message),
            });
        }
    };

    let jobs_found = postings.len() as i64;
    let mut jobs_new = 0i64;

    for raw in postings {
        match upsert_posting(pool, source_id, raw).await {
            Ok(is_new_eligible) => {
                if is_new_eligible {
                    jobs_new += 1;
                }
            }
            Err(e) => {
                tracing::warn!(source = source_id, "posting save error: {e}");
            }
        }
    }

    let finished = SourceRun::finish(
        pool,
        run.id,
        RunStatus::Completed,
        jobs_found,
        jobs_new,
        None,
        None,
    )
    .await?;

    if finished.consecutive_zero_runs >= 2 {
        tracing::warn!(
            source = source_id,
            consecutive_zero_runs = finished.consecutive_zero_runs,
            "source keeps returning zero jobs, manual inspection recommended"
        );
    }

    tracing::info!(source = source_id, jobs_found, jobs_new, "scraper completed");
    bus.emit(
        Topic::ScraperFinished,
        json!({
            "source_id": source_id,
            "status": "completed",
            "jobs_found": jobs_found,
            "jobs_new": jobs_new,
        }),
    );

    Ok(RunStats {
        source_id: source_id.to_string(),
        jobs_found,
        jobs_new,
        status: RunStatus::Completed,
        error: None,
    })
}

/// Filter one raw posting and upsert it. Returns whether it counted as a
/// new, eligible row.
async fn upsert_posting(
    pool: &SqlitePool,
    adapter_tag: &str,
    raw: RawPosting,
) -> Result<bool, AppError> {
    let facts = PostingFacts {
        title: &raw.title,
        description: raw.description.as_deref().unwrap_or_default(),
        contract_type: raw.contract_type.as_deref().unwrap_or_default(),
        salary_raw: raw.salary_raw.as_deref().unwrap_or_default(),
    };
    let (eligible, reason) = is_eligible(&facts);

    let mut payload = raw.raw_data.unwrap_or_else(RawPayload::structured);
    let status = if eligible {
        PostingStatus::Scraped
    } else {
        tracing::info!(
            title = %raw.title,
            company = %raw.company,
            reason = reason.as_deref().unwrap_or_default(),
            "posting skipped by eligibility filter"
        );
        payload.set_skip_reason(reason.as_deref());
        PostingStatus::Skipped
    };

    let input = NewPosting {
        source_id: raw.source_id.unwrap_or_else(|| adapter_tag.to_string()),
        external_id: raw.external_id,
        url: raw.url,
        title: raw.title,
        company: raw.company,
        location: raw.location,
        description: raw.description,
        salary_raw: raw.salary_raw,
        contract_type: raw.contract_type,
        posted_at: raw.posted_at,
        status,
        cv_profile: raw.cv_profile,
        raw_data: Some(payload),
    };

    let (_posting, is_new) = Posting::upsert(pool, input).await?;
    Ok(is_new && eligible)
}
