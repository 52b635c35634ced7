pub mod applications;
pub mod companies;
pub mod postings;
pub mod runs;
pub mod settings;
pub mod sources;
pub mod stream;

use axum::Router;
use axum::routing::{delete, get, post};

use crate::routes::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // Postings
        .route("/postings", get(postings::list))
        .route("/postings/counts", get(postings::counts))
        .route("/postings/{id}", get(postings::get))
        // Applications
        .route(
            "/applications",
            get(applications::list).post(applications::create),
        )
        .route("/applications/counts", get(applications::counts))
        .route(
            "/applications/pending-reviews",
            get(applications::pending_reviews),
        )
        .route("/applications/{id}", get(applications::get))
        .route("/applications/{id}/events", get(applications::events))
        .route("/applications/{id}/generate", post(applications::generate_cv))
        .route("/applications/{id}/authorize", post(applications::authorize))
        .route("/applications/{id}/status", post(applications::set_status))
        // Source runs + manual triggers
        .route("/runs", get(runs::recent))
        .route("/scrape/{tag}", post(runs::trigger))
        // Source catalogue
        .route("/sources", get(sources::list).post(sources::upsert))
        .route("/sources/{id}", delete(sources::delete))
        // Company policy tables
        .route("/blocklist", get(companies::list_blocklist).post(companies::block))
        .route("/blocklist/{company}", delete(companies::unblock))
        .route("/rules", get(companies::list_rules).post(companies::upsert_rule))
        // Settings
        .route("/settings", get(settings::list).put(settings::set))
        // Event stream
        .route("/events", get(stream::events))
        .with_state(state);

    Router::new().nest("/api/v1", api)
}
