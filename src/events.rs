//! Process-local, best-effort pub-sub for state-change notifications.
//!
//! This is fan-out plumbing for subscribers (SSE clients, the notifier
//! task), not the audit trail — the durable, per-application ordered record
//! lives in `application_events`.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

const SUBSCRIBER_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    CvGenerationStarted,
    CvGenerationComplete,
    CvGenerationError,
    ApplicationAuthorized,
    ApplicationRejected,
    ApplicationSubmitted,
    ScraperFinished,
    ScraperError,
    ReviewReady,
    ReviewExpiring,
    ModelPullProgress,
    ModelPullComplete,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::CvGenerationStarted => "cv_generation_started",
            Topic::CvGenerationComplete => "cv_generation_complete",
            Topic::CvGenerationError => "cv_generation_error",
            Topic::ApplicationAuthorized => "application_authorized",
            Topic::ApplicationRejected => "application_rejected",
            Topic::ApplicationSubmitted => "application_submitted",
            Topic::ScraperFinished => "scraper_finished",
            Topic::ScraperError => "scraper_error",
            Topic::ReviewReady => "review_ready",
            Topic::ReviewExpiring => "review_expiring",
            Topic::ModelPullProgress => "model_pull_progress",
            Topic::ModelPullComplete => "model_pull_complete",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BusEvent {
    pub topic: Topic,
    pub payload: Value,
}

/// Fan-out hub. `emit` never blocks: a subscriber whose queue is full is
/// dropped on the spot (slow-client quarantine).
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<BusEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> (Uuid, mpsc::Receiver<BusEvent>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let id = Uuid::new_v4();
        self.subscribers
            .lock()
            .expect("bus lock poisoned")
            .insert(id, tx);
        tracing::debug!(subscriber = %id, "bus subscriber connected");
        (id, rx)
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.subscribers
            .lock()
            .expect("bus lock poisoned")
            .remove(&id);
        tracing::debug!(subscriber = %id, "bus subscriber disconnected");
    }

    pub fn emit(&self, topic: Topic, payload: Value) {
        let mut subscribers = self.subscribers.lock().expect("bus lock poisoned");
        let mut dropped: Vec<Uuid> = Vec::new();

        for (id, tx) in subscribers.iter() {
            let event = BusEvent {
                topic,
                payload: payload.clone(),
            };
            if tx.try_send(event).is_err() {
                dropped.push(*id);
            }
        }

        for id in dropped {
            subscribers.remove(&id);
            tracing::warn!(subscriber = %id, topic = topic.as_str(), "slow bus subscriber dropped");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("bus lock poisoned").len()
    }
}
