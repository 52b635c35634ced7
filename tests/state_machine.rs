mod common;

use chrono::{Duration, Utc};
use jobbot::error::AppError;
use jobbot::models::application::{Application, ApplicationFilters, ApplicationPatch, ApplicationStatus};
use jobbot::models::company::{CompanyApplicationRule, CompanyBlocklist};
use jobbot::models::event::ApplicationEvent;
use jobbot::models::posting::Posting;

use common::{drive_to, sample_posting, test_pool};

#[tokio::test]
async fn every_transition_appends_exactly_one_matching_event() {
    let pool = test_pool().await;
    let (posting, _) = Posting::upsert(&pool, sample_posting("greenhouse", "a1"))
        .await
        .expect("posting");
    let app = Application::create(&pool, posting.id, "frontend_dev", "Acme")
        .await
        .expect("application");

    // Creation writes the initial event with a NULL old status.
    let events = ApplicationEvent::history(&pool, app.id).await.expect("events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].old_status, None);
    assert_eq!(events[0].new_status, ApplicationStatus::Scraped);

    let updated = Application::transition(
        &pool,
        app.id,
        ApplicationStatus::Qualified,
        "system",
        Some("matched profile"),
        ApplicationPatch::default(),
    )
    .await
    .expect("transition");

    let events = ApplicationEvent::history(&pool, app.id).await.expect("events");
    assert_eq!(events.len(), 2);
    let last = &events[1];
    assert_eq!(last.old_status, Some(ApplicationStatus::Scraped));
    assert_eq!(last.new_status, ApplicationStatus::Qualified);
    assert_eq!(last.triggered_by, "system");
    assert_eq!(last.note.as_deref(), Some("matched profile"));
    assert!(last.created_at <= updated.updated_at);
}

#[tokio::test]
async fn illegal_transition_is_refused_and_writes_nothing() {
    let pool = test_pool().await;
    let (posting, _) = Posting::upsert(&pool, sample_posting("greenhouse", "a2"))
        .await
        .expect("posting");
    let app = Application::create(&pool, posting.id, "frontend_dev", "Acme")
        .await
        .expect("application");

    let result = Application::transition(
        &pool,
        app.id,
        ApplicationStatus::Applied,
        "system",
        None,
        ApplicationPatch::default(),
    )
    .await;
    assert!(matches!(result, Err(AppError::IllegalTransition(_, _))));

    let events = ApplicationEvent::history(&pool, app.id).await.expect("events");
    assert_eq!(events.len(), 1, "no event for a refused transition");
    let app = Application::get(&pool, app.id).await.expect("application");
    assert_eq!(app.status, ApplicationStatus::Scraped);
}

#[tokio::test]
async fn patch_fields_land_atomically_with_the_status() {
    let pool = test_pool().await;
    let (posting, _) = Posting::upsert(&pool, sample_posting("greenhouse", "a3"))
        .await
        .expect("posting");
    let app = Application::create(&pool, posting.id, "frontend_dev", "Acme")
        .await
        .expect("application");
    drive_to(
        &pool,
        app.id,
        &[
            ApplicationStatus::Qualified,
            ApplicationStatus::CvGenerating,
            ApplicationStatus::CvReady,
            ApplicationStatus::CvApproved,
            ApplicationStatus::ApplicationStarted,
        ],
    )
    .await;

    let mut fields = jobbot::forms::SnapshotFields::new();
    fields.insert(
        "#email".to_string(),
        jobbot::forms::FieldValue::Text("ana@example.com".to_string()),
    );
    let updated = Application::transition(
        &pool,
        app.id,
        ApplicationStatus::FormFilled,
        "form_filler",
        None,
        ApplicationPatch {
            form_url: Some("https://example.com/apply".to_string()),
            form_fields: Some(fields),
            ..Default::default()
        },
    )
    .await
    .expect("transition");

    assert_eq!(updated.form_url.as_deref(), Some("https://example.com/apply"));
    let stored = updated.form_fields.expect("fields");
    assert_eq!(stored.0.len(), 1);

    // An unrelated later transition must not clobber the patch.
    let later = Application::transition(
        &pool,
        app.id,
        ApplicationStatus::PendingHumanReview,
        "human_loop",
        None,
        ApplicationPatch::default(),
    )
    .await
    .expect("transition");
    assert_eq!(later.form_url.as_deref(), Some("https://example.com/apply"));
}

#[tokio::test]
async fn blocklisted_company_cannot_get_an_application() {
    let pool = test_pool().await;
    let (posting, _) = Posting::upsert(&pool, sample_posting("greenhouse", "a4"))
        .await
        .expect("posting");
    CompanyBlocklist::add(&pool, "ACME", Some("ghosted twice"))
        .await
        .expect("blocklist");

    let result = Application::create(&pool, posting.id, "frontend_dev", "acme").await;
    assert!(matches!(result, Err(AppError::CompanyBlocked(_))));

    let (apps, _) = Application::list(&pool, &ApplicationFilters::default())
        .await
        .expect("list");
    assert!(apps.is_empty());
}

#[tokio::test]
async fn company_rate_limit_counts_only_live_applications_in_window() {
    let pool = test_pool().await;
    CompanyApplicationRule::upsert(&pool, "Acme", 1, 14)
        .await
        .expect("rule");

    let (p1, _) = Posting::upsert(&pool, sample_posting("greenhouse", "b1"))
        .await
        .expect("posting");
    let (p2, _) = Posting::upsert(&pool, sample_posting("greenhouse", "b2"))
        .await
        .expect("posting");

    let first = Application::create(&pool, p1.id, "frontend_dev", "Acme")
        .await
        .expect("first application");

    // Second within the window: refused, case-insensitively.
    let refused = Application::create(&pool, p2.id, "frontend_dev", "ACME").await;
    assert!(matches!(refused, Err(AppError::CompanyRateLimited(_))));

    // Withdrawn applications stop counting.
    Application::transition(
        &pool,
        first.id,
        ApplicationStatus::Withdrawn,
        "human",
        None,
        ApplicationPatch::default(),
    )
    .await
    .expect("withdraw");
    let after_withdrawal = Application::create(&pool, p2.id, "frontend_dev", "Acme").await;
    assert!(after_withdrawal.is_ok());

    // A stale application outside the window stops counting too.
    let second = after_withdrawal.expect("application");
    let old = Utc::now() - Duration::days(15);
    sqlx::query("UPDATE applications SET created_at = $2 WHERE id = $1")
        .bind(second.id)
        .bind(old)
        .execute(&pool)
        .await
        .expect("backdate");

    let (p3, _) = Posting::upsert(&pool, sample_posting("greenhouse", "b3"))
        .await
        .expect("posting");
    assert!(
        Application::create(&pool, p3.id, "frontend_dev", "Acme")
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn authorized_flag_implies_timestamp_after_review_entry() {
    let pool = test_pool().await;
    let (posting, _) = Posting::upsert(&pool, sample_posting("greenhouse", "c1"))
        .await
        .expect("posting");
    let app = Application::create(&pool, posting.id, "frontend_dev", "Acme")
        .await
        .expect("application");
    drive_to(
        &pool,
        app.id,
        &[
            ApplicationStatus::Qualified,
            ApplicationStatus::CvGenerating,
            ApplicationStatus::CvReady,
            ApplicationStatus::CvApproved,
            ApplicationStatus::ApplicationStarted,
            ApplicationStatus::FormFilled,
            ApplicationStatus::PendingHumanReview,
        ],
    )
    .await;

    let review_entry = Application::get(&pool, app.id).await.expect("application").updated_at;

    let now = Utc::now();
    let authorized = Application::transition(
        &pool,
        app.id,
        ApplicationStatus::CvApproved,
        "human",
        None,
        ApplicationPatch {
            authorized_by_human: Some(true),
            authorized_at: Some(now),
            ..Default::default()
        },
    )
    .await
    .expect("authorize");

    assert!(authorized.authorized_by_human);
    assert!(authorized.authorized_at.expect("authorized_at") >= review_entry);
}
