pub mod api;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::documents::DocumentPipeline;
use crate::events::EventBus;
use crate::human_loop::HumanLoop;
use crate::scrapers::scheduler::Scheduler;

/// Shared handler state. The HTTP facade is a thin projection over the
/// store and the long-lived controllers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub bus: Arc<EventBus>,
    pub scheduler: Arc<Scheduler>,
    pub human_loop: Arc<HumanLoop>,
    pub pipeline: Arc<DocumentPipeline>,
}
