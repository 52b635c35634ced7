mod common;

use std::sync::Arc;

use jobbot::events::EventBus;
use jobbot::models::posting::{Posting, PostingFilters, PostingStatus};
use jobbot::models::source_run::{RunStatus, SourceRun};
use jobbot::scrapers::run_source;

use common::{ScriptedAdapter, raw_posting, test_pool};

const ZERO_DISABLE: i64 = 5;
const DELAY: (f64, f64) = (0.0, 0.0);

#[tokio::test]
async fn upsert_is_idempotent_across_runs() {
    let pool = test_pool().await;
    let bus = Arc::new(EventBus::new());
    let adapter = ScriptedAdapter::repeating(
        "testsource",
        vec![
            raw_posting("j1", "Frontend Developer", "30.000€/año"),
            raw_posting("j2", "Backend Developer", "35.000€/año"),
        ],
    );

    let first = run_source(&pool, &bus, &adapter, ZERO_DISABLE, DELAY)
        .await
        .expect("first run");
    assert_eq!(first.status, RunStatus::Completed);
    assert_eq!(first.jobs_found, 2);
    assert_eq!(first.jobs_new, 2);

    let second = run_source(&pool, &bus, &adapter, ZERO_DISABLE, DELAY)
        .await
        .expect("second run");
    assert_eq!(second.jobs_found, 2);
    assert_eq!(second.jobs_new, 0, "re-running the same output adds nothing");

    let (rows, _) = Posting::list(&pool, &PostingFilters::default())
        .await
        .expect("list");
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn ineligible_postings_are_stored_skipped_with_reason_and_not_counted() {
    let pool = test_pool().await;
    let bus = Arc::new(EventBus::new());
    let adapter = ScriptedAdapter::repeating(
        "testsource",
        vec![
            raw_posting("ok", "Frontend Developer", "35.000€/año"),
            raw_posting("low", "Cajero", "900€/mes"),
        ],
    );

    let stats = run_source(&pool, &bus, &adapter, ZERO_DISABLE, DELAY)
        .await
        .expect("run");
    assert_eq!(stats.jobs_found, 2);
    assert_eq!(stats.jobs_new, 1, "only the eligible insert counts");

    let skipped = Posting::get_by_external(&pool, "testsource", "low")
        .await
        .expect("query")
        .expect("row");
    assert_eq!(skipped.status, PostingStatus::Skipped);
    let reason = skipped
        .raw_data
        .as_ref()
        .and_then(|r| r.skip_reason())
        .expect("skip reason");
    assert!(reason.contains("salary too low"));
}

#[tokio::test]
async fn eligibility_flip_updates_only_the_skip_reason() {
    let pool = test_pool().await;
    let bus = Arc::new(EventBus::new());

    let eligible = ScriptedAdapter::repeating(
        "testsource",
        vec![raw_posting("flip", "Frontend Developer", "35.000€/año")],
    );
    run_source(&pool, &bus, &eligible, ZERO_DISABLE, DELAY)
        .await
        .expect("run");

    // Same posting, now advertising a disqualifying salary.
    let ineligible = ScriptedAdapter::repeating(
        "testsource",
        vec![raw_posting("flip", "Frontend Developer", "900€/mes")],
    );
    run_source(&pool, &bus, &ineligible, ZERO_DISABLE, DELAY)
        .await
        .expect("run");

    let row = Posting::get_by_external(&pool, "testsource", "flip")
        .await
        .expect("query")
        .expect("row");
    // First classification wins for the status; the reason reflects the flip.
    assert_eq!(row.status, PostingStatus::Scraped);
    assert!(
        row.raw_data
            .as_ref()
            .and_then(|r| r.skip_reason())
            .expect("skip reason")
            .contains("salary too low")
    );
}

#[tokio::test]
async fn consecutive_zero_counter_follows_the_suffix_law() {
    let pool = test_pool().await;
    let bus = Arc::new(EventBus::new());
    let adapter = ScriptedAdapter::sequence(
        "testsource",
        vec![
            vec![],
            vec![],
            vec![raw_posting("j1", "Frontend Developer", "35.000€/año")],
            vec![],
        ],
    );

    let mut counters = Vec::new();
    for _ in 0..4 {
        run_source(&pool, &bus, &adapter, ZERO_DISABLE, DELAY)
            .await
            .expect("run");
        let latest = SourceRun::latest_for(&pool, "testsource")
            .await
            .expect("latest")
            .expect("run row");
        counters.push(latest.consecutive_zero_runs);
    }
    assert_eq!(counters, vec![1, 2, 0, 1]);
}

#[tokio::test]
async fn five_zero_runs_disable_the_source_without_calling_the_adapter() {
    let pool = test_pool().await;
    let bus = Arc::new(EventBus::new());
    let adapter = ScriptedAdapter::repeating("testsource", vec![]);

    for i in 1..=5 {
        let stats = run_source(&pool, &bus, &adapter, ZERO_DISABLE, DELAY)
            .await
            .expect("run");
        assert_eq!(stats.status, RunStatus::Completed);
        let latest = SourceRun::latest_for(&pool, "testsource")
            .await
            .expect("latest")
            .expect("run row");
        assert_eq!(latest.consecutive_zero_runs, i);
    }
    assert_eq!(adapter.call_count(), 5);

    let stats = run_source(&pool, &bus, &adapter, ZERO_DISABLE, DELAY)
        .await
        .expect("sixth run");
    assert_eq!(stats.status, RunStatus::Disabled);
    assert_eq!(adapter.call_count(), 5, "adapter must not be invoked");

    // No sixth run row was created.
    let runs = SourceRun::recent(&pool, 50).await.expect("runs");
    assert_eq!(runs.len(), 5);
}

#[tokio::test]
async fn failed_runs_reset_the_zero_counter() {
    let pool = test_pool().await;
    let bus = Arc::new(EventBus::new());
    let empty = ScriptedAdapter::repeating("testsource", vec![]);

    run_source(&pool, &bus, &empty, ZERO_DISABLE, DELAY)
        .await
        .expect("run");

    struct FailingAdapter;
    #[async_trait::async_trait]
    impl jobbot::scrapers::SourceAdapter for FailingAdapter {
        fn source_id(&self) -> &'static str {
            "testsource"
        }
        async fn scrape(
            &self,
            _cx: &jobbot::scrapers::ScrapeContext,
        ) -> Result<Vec<jobbot::scrapers::RawPosting>, jobbot::error::AppError> {
            Err(jobbot::error::AppError::Internal("boom".to_string()))
        }
    }

    let stats = run_source(&pool, &bus, &FailingAdapter, ZERO_DISABLE, DELAY)
        .await
        .expect("run");
    assert_eq!(stats.status, RunStatus::Failed);

    let latest = SourceRun::latest_for(&pool, "testsource")
        .await
        .expect("latest")
        .expect("run row");
    assert_eq!(latest.consecutive_zero_runs, 0);
    assert_eq!(latest.error_message.as_deref(), Some("Internal error: boom"));
}
