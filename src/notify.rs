//! Operator notifications: a bus subscriber that turns selected topics
//! into log notices. Desktop integrations hook in here.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::events::{EventBus, Topic};

pub fn spawn(bus: Arc<EventBus>) -> JoinHandle<()> {
    let (_id, mut rx) = bus.subscribe();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let app = event
                .payload
                .get("application_id")
                .and_then(|v| v.as_i64())
                .unwrap_or_default();
            match event.topic {
                Topic::ReviewReady => {
                    let company = event
                        .payload
                        .get("company")
                        .and_then(|v| v.as_str())
                        .unwrap_or("?");
                    tracing::info!(application_id = app, company, "REVIEW REQUIRED");
                }
                Topic::ReviewExpiring => {
                    let minutes = event
                        .payload
                        .get("minutes_remaining")
                        .and_then(|v| v.as_i64())
                        .unwrap_or_default();
                    tracing::warn!(
                        application_id = app,
                        minutes_remaining = minutes,
                        "review session expiring"
                    );
                }
                Topic::ApplicationSubmitted => {
                    let status = event
                        .payload
                        .get("status")
                        .and_then(|v| v.as_str())
                        .unwrap_or("?");
                    tracing::info!(application_id = app, status, "application submitted");
                }
                Topic::ScraperError => {
                    let source = event
                        .payload
                        .get("source_id")
                        .and_then(|v| v.as_str())
                        .unwrap_or("?");
                    tracing::warn!(source, "scraper reported an error");
                }
                _ => {}
            }
        }
    })
}
