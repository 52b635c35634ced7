use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    Load,
    NetworkIdle,
}

/// What a routed request pattern should do. The core only ever needs to
/// block noise (trackers, analytics) or let traffic through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    Continue,
    Block,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ElementInfo {
    pub visible: bool,
}

/// Minimal browser-page capability. The core never names a concrete
/// engine; tests drive the protocol with a simulated implementation.
#[async_trait]
pub trait Page: Send + Sync {
    fn url(&self) -> String;

    async fn goto(&self, url: &str, wait: Wait, timeout_secs: u64) -> Result<(), AppError>;

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<(), AppError>;

    async fn fill(&self, selector: &str, value: &str) -> Result<(), AppError>;

    async fn click(&self, selector: &str) -> Result<(), AppError>;

    /// Keyed typing with a per-character delay in milliseconds.
    async fn type_text(&self, selector: &str, value: &str, delay_ms: u64)
    -> Result<(), AppError>;

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), AppError>;

    async fn set_input_files(&self, selector: &str, path: &Path) -> Result<(), AppError>;

    async fn is_checked(&self, selector: &str) -> Result<bool, AppError>;

    /// Run a script in the page, passing `arg` as its single argument.
    async fn evaluate(&self, script: &str, arg: Value) -> Result<Value, AppError>;

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementInfo>, AppError>;

    async fn scroll_into_view(&self, selector: &str) -> Result<(), AppError>;

    async fn route(&self, pattern: &str, action: RouteAction) -> Result<(), AppError>;

    async fn unroute(&self, pattern: &str) -> Result<(), AppError>;

    /// Must be called on every exit path; the owning task closes its page.
    async fn close(&self);
}

/// Opens fresh pages. The submit task creates one page per attempt and
/// closes it when the confirmation outcome is classified.
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Page>, AppError>;
}

/// Placeholder factory for deployments without a browser backend wired in.
/// Submit tasks fail with a classified error instead of panicking.
pub struct UnconfiguredBrowser;

#[async_trait]
impl PageFactory for UnconfiguredBrowser {
    async fn open(&self) -> Result<Box<dyn Page>, AppError> {
        Err(AppError::Browser(
            "no browser backend configured".to_string(),
        ))
    }
}
