//! Human-in-the-loop review and authorized submission.
//!
//! An application that reaches `form_filled` is snapshotted and parked in
//! `pending_human_review` behind a bounded review window. Authorization
//! inside the window replays the snapshot in a fresh page and classifies
//! the submission outcome; after the window the request returns `expired`
//! and nothing moves.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use tokio::task::AbortHandle;

use crate::error::AppError;
use crate::events::{EventBus, Topic};
use crate::forms::confirm::{ConfirmationSignal, detect_confirmation};
use crate::forms::page::{Page, PageFactory, Wait};
use crate::forms::snapshot::{refill_fast, take_snapshot, verify_fields};
use crate::models::application::{Application, ApplicationPatch, ApplicationStatus};

/// Submit-control discovery list, tried in order. First visible hit wins.
const SUBMIT_SELECTORS: &[&str] = &[
    "button[type='submit']",
    "input[type='submit']",
    "button:has-text('enviar')",
    "button:has-text('Enviar')",
    "button:has-text('aplicar')",
    "button:has-text('Aplicar')",
    "button:has-text('solicitar')",
    "button:has-text('Solicitar')",
    "button:has-text('inscribirme')",
    "button:has-text('Inscribirme')",
    "button:has-text('enviar solicitud')",
    "button:has-text('Enviar solicitud')",
    "button:has-text('submit')",
    "button:has-text('Submit')",
    "button:has-text('apply')",
    "button:has-text('Apply')",
    "[data-testid='submit']",
    "[data-testid='apply']",
    ".submit-btn",
    ".apply-btn",
    "#submit",
    "#apply",
];

#[derive(Debug, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    /// Review window elapsed; no transition, no event.
    Expired,
    /// Authorization recorded; the submit task is scheduled.
    Submitting,
}

#[derive(Debug)]
pub struct SubmitOutcome {
    pub status: ApplicationStatus,
    pub signal: ConfirmationSignal,
    pub screenshot_path: Option<PathBuf>,
}

pub struct HumanLoop {
    pool: SqlitePool,
    bus: Arc<EventBus>,
    pages: Arc<dyn PageFactory>,
    artifacts_dir: PathBuf,
    timers: Mutex<HashMap<i64, AbortHandle>>,
    timeout_minutes: i64,
    warn_minutes: i64,
    confirm_timeout: Duration,
}

impl HumanLoop {
    pub fn new(
        pool: SqlitePool,
        bus: Arc<EventBus>,
        pages: Arc<dyn PageFactory>,
        artifacts_dir: PathBuf,
        timeout_minutes: i64,
        warn_minutes: i64,
        confirm_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            pool,
            bus,
            pages,
            artifacts_dir,
            timers: Mutex::new(HashMap::new()),
            timeout_minutes,
            warn_minutes,
            confirm_timeout,
        })
    }

    /// Snapshot the filled form, park the application for review, and start
    /// the warning/expiry timers.
    pub async fn prepare_for_review(
        self: Arc<Self>,
        page: &dyn Page,
        application_id: i64,
    ) -> Result<(), AppError> {
        let app = Application::get(&self.pool, application_id).await?;

        let out_dir = self.artifacts_dir.join(application_id.to_string());
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| AppError::Internal(format!("cannot create artifacts dir: {e}")))?;
        let screenshot_path = out_dir.join("form.png");

        let snapshot = take_snapshot(page, &screenshot_path).await?;
        let form_url = snapshot.url.clone();

        Application::transition(
            &self.pool,
            application_id,
            ApplicationStatus::PendingHumanReview,
            "human_loop",
            Some(&format!("Form ready for review at {form_url}")),
            ApplicationPatch {
                form_screenshot_path: snapshot
                    .screenshot_path
                    .as_ref()
                    .map(|p| p.display().to_string()),
                form_fields: Some(snapshot.fields),
                form_url: Some(form_url.clone()),
                ..Default::default()
            },
        )
        .await?;

        self.clone().start_review_timer(application_id);

        let expires_at = Utc::now() + chrono::Duration::minutes(self.timeout_minutes);
        self.bus.emit(
            Topic::ReviewReady,
            json!({
                "application_id": application_id,
                "company": app.company,
                "profile": app.cv_profile,
                "form_url": form_url,
                "screenshot_path": screenshot_path.display().to_string(),
                "expires_at": expires_at.to_rfc3339(),
            }),
        );

        tracing::info!(application_id, company = %app.company, "application parked for review");
        Ok(())
    }

    /// Human confirms submission. Inside the window this flips the
    /// application to `cv_approved` with the authorization audit fields and
    /// schedules the submit task; outside it, nothing changes.
    pub async fn authorize(self: Arc<Self>, application_id: i64) -> Result<AuthorizeOutcome, AppError> {
        let app = Application::get(&self.pool, application_id).await?;
        if app.status != ApplicationStatus::PendingHumanReview {
            return Err(AppError::BadRequest(format!(
                "Application {application_id} is {}, not pending_human_review",
                app.status.as_str()
            )));
        }

        let expiry = app.updated_at + chrono::Duration::minutes(self.timeout_minutes);
        if Utc::now() > expiry {
            tracing::warn!(application_id, "authorization after review window, ignoring");
            return Ok(AuthorizeOutcome::Expired);
        }

        let now = Utc::now();
        Application::transition(
            &self.pool,
            application_id,
            ApplicationStatus::CvApproved,
            "human",
            Some("Submission authorized by human"),
            ApplicationPatch {
                authorized_by_human: Some(true),
                authorized_at: Some(now),
                ..Default::default()
            },
        )
        .await?;

        // The window timer is obsolete; cancelling it does not undo the
        // authorization that just landed.
        self.cancel_review_timer(application_id);

        self.bus.emit(
            Topic::ApplicationAuthorized,
            json!({ "application_id": application_id, "authorized_at": now.to_rfc3339() }),
        );

        let this = self.clone();
        tokio::spawn(async move {
            match this.submit_authorized(application_id).await {
                Ok(outcome) => tracing::info!(
                    application_id,
                    status = outcome.status.as_str(),
                    signal = outcome.signal.as_str(),
                    "submit task finished"
                ),
                Err(e) => tracing::error!(application_id, "submit task failed: {e}"),
            }
        });

        Ok(AuthorizeOutcome::Submitting)
    }

    /// Replay the saved snapshot in a fresh page, click submit, and record
    /// the classified outcome. Runs to completion once started.
    pub async fn submit_authorized(&self, application_id: i64) -> Result<SubmitOutcome, AppError> {
        let app = Application::get(&self.pool, application_id).await?;
        let form_url = app
            .form_url
            .clone()
            .ok_or_else(|| AppError::BadRequest("No form URL on application".to_string()))?;
        let fields = app
            .form_fields
            .as_ref()
            .map(|j| j.0.clone())
            .ok_or_else(|| AppError::BadRequest("No form snapshot on application".to_string()))?;

        let page = self.pages.open().await?;
        let result = self
            .submit_on_page(&*page, application_id, &form_url, &fields)
            .await;
        page.close().await;
        result
    }

    async fn submit_on_page(
        &self,
        page: &dyn Page,
        application_id: i64,
        form_url: &str,
        fields: &crate::forms::SnapshotFields,
    ) -> Result<SubmitOutcome, AppError> {
        tracing::info!(application_id, url = form_url, "navigating for authorized submit");
        page.goto(form_url, Wait::NetworkIdle, 30).await?;

        let filled = refill_fast(page, fields).await;
        tracing::info!(application_id, filled, "snapshot replayed");

        // The form may have drifted since the snapshot; log and press on.
        let mismatches = verify_fields(page, fields).await;
        if !mismatches.is_empty() {
            tracing::warn!(application_id, count = mismatches.len(), ?mismatches, "replay mismatches");
        }

        if !self.click_submit(page).await {
            tracing::error!(application_id, url = %page.url(), "submit button not found");
            return Err(AppError::Browser("submit_button_not_found".to_string()));
        }

        let artifacts = self.artifacts_dir.join(application_id.to_string());
        let confirmation = detect_confirmation(page, &artifacts, self.confirm_timeout).await;

        let new_status = if confirmation.confirmed {
            ApplicationStatus::Applied
        } else {
            ApplicationStatus::SubmittedAmbiguous
        };
        let note = format!(
            "Signal: {}. Authorized by human at {}",
            confirmation.signal.as_str(),
            Utc::now().to_rfc3339()
        );

        Application::transition(
            &self.pool,
            application_id,
            new_status,
            "human_loop.submit_authorized",
            Some(&note),
            ApplicationPatch {
                confirmation_screenshot_path: confirmation
                    .screenshot_path
                    .as_ref()
                    .map(|p| p.display().to_string()),
                confirmation_signal: Some(confirmation.signal.as_str().to_string()),
                ..Default::default()
            },
        )
        .await?;

        self.bus.emit(
            Topic::ApplicationSubmitted,
            json!({
                "application_id": application_id,
                "status": new_status.as_str(),
                "signal": confirmation.signal.as_str(),
            }),
        );

        Ok(SubmitOutcome {
            status: new_status,
            signal: confirmation.signal,
            screenshot_path: confirmation.screenshot_path,
        })
    }

    async fn click_submit(&self, page: &dyn Page) -> bool {
        for &selector in SUBMIT_SELECTORS {
            match page.query_selector(selector).await {
                Ok(Some(info)) if info.visible => {
                    tracing::info!(selector, url = %page.url(), "submit button found");
                    let _ = page.scroll_into_view(selector).await;
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    if page.click(selector).await.is_ok() {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    /// Start (or restart) the warning/expiry timer for one application.
    fn start_review_timer(self: Arc<Self>, application_id: i64) {
        let warn_after = Duration::from_secs((self.warn_minutes.max(0) as u64) * 60);
        let timeout_after = Duration::from_secs((self.timeout_minutes.max(0) as u64) * 60);
        let this = self.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(warn_after).await;
            let remaining = this.timeout_minutes - this.warn_minutes;
            tracing::info!(application_id, remaining_minutes = remaining, "review window expiring soon");
            this.bus.emit(
                Topic::ReviewExpiring,
                json!({ "application_id": application_id, "minutes_remaining": remaining }),
            );

            tokio::time::sleep(timeout_after.saturating_sub(warn_after)).await;
            // No automatic withdrawal: the status stays pending_human_review
            // and the operator decides.
            tracing::warn!(application_id, "review window expired");
            this.bus.emit(
                Topic::ReviewExpiring,
                json!({ "application_id": application_id, "minutes_remaining": 0 }),
            );
            this.timers
                .lock()
                .expect("timer lock poisoned")
                .remove(&application_id);
        })
        .abort_handle();

        let mut timers = self.timers.lock().expect("timer lock poisoned");
        if let Some(old) = timers.insert(application_id, handle) {
            old.abort();
        }
    }

    /// Cancel the pending timer. Called whenever the application leaves
    /// `pending_human_review`.
    pub fn cancel_review_timer(&self, application_id: i64) {
        if let Some(handle) = self
            .timers
            .lock()
            .expect("timer lock poisoned")
            .remove(&application_id)
        {
            handle.abort();
            tracing::debug!(application_id, "review timer cancelled");
        }
    }

    pub fn has_pending_timer(&self, application_id: i64) -> bool {
        self.timers
            .lock()
            .expect("timer lock poisoned")
            .contains_key(&application_id)
    }
}
