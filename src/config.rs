use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobbot", about = "Autonomous job-application pipeline")]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:data/jobs.db?mode=rwc")]
    pub database_url: String,

    /// Listen host
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Listen port
    #[arg(long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Run database migrations on startup
    #[arg(long, env = "RUN_MIGRATIONS", default_value = "true")]
    pub run_migrations: bool,

    /// Root data directory (artifacts, backups)
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    // -- LLM backend -------------------------------------------------------
    /// Ollama base URL
    #[arg(long, env = "OLLAMA_HOST", default_value = "http://localhost:11434")]
    pub ollama_host: String,

    /// Ollama request timeout in seconds
    #[arg(long, env = "OLLAMA_TIMEOUT", default_value = "120")]
    pub ollama_timeout: u64,

    /// Ollama model name
    #[arg(long, env = "OLLAMA_MODEL", default_value = "llama3.1:8b")]
    pub ollama_model: String,

    #[arg(long, env = "CV_REWRITE_TEMPERATURE", default_value = "0.3")]
    pub cv_rewrite_temperature: f32,

    #[arg(long, env = "CV_SUMMARY_TEMPERATURE", default_value = "0.5")]
    pub cv_summary_temperature: f32,

    /// Minimum overall quality rubric score for a clean pass
    #[arg(long, env = "QUALITY_SCORE_MINIMUM", default_value = "7.0")]
    pub quality_score_minimum: f64,

    /// External command rendering an adapted CV JSON (stdin) to a PDF path
    #[arg(long, env = "PDF_RENDERER_CMD", default_value = "cv-render")]
    pub pdf_renderer_cmd: String,

    // -- Scraping ----------------------------------------------------------
    #[arg(long, env = "SCRAPER_DEFAULT_DELAY_MIN", default_value = "3.0")]
    pub scraper_default_delay_min: f64,

    #[arg(long, env = "SCRAPER_DEFAULT_DELAY_MAX", default_value = "8.0")]
    pub scraper_default_delay_max: f64,

    #[arg(long, env = "SCRAPER_SESSION_MAX_MINUTES", default_value = "45")]
    pub scraper_session_max_minutes: u64,

    #[arg(long, env = "SCRAPER_SESSION_MAX_JOBS", default_value = "50")]
    pub scraper_session_max_jobs: usize,

    /// Consecutive zero-result completed runs before a source is disabled
    #[arg(long, env = "SCRAPER_CONSECUTIVE_ZERO_DISABLE", default_value = "5")]
    pub scraper_consecutive_zero_disable: i64,

    // -- Application flow --------------------------------------------------
    #[arg(long, env = "HUMAN_REVIEW_TIMEOUT_MINUTES", default_value = "30")]
    pub human_review_timeout_minutes: i64,

    #[arg(long, env = "HUMAN_REVIEW_WARN_MINUTES", default_value = "25")]
    pub human_review_warn_minutes: i64,

    #[arg(long, env = "SUBMIT_CONFIRM_TIMEOUT_SECONDS", default_value = "10")]
    pub submit_confirm_timeout_seconds: u64,

    // -- Data retention ----------------------------------------------------
    #[arg(long, env = "JOBS_RETENTION_DAYS", default_value = "90")]
    pub jobs_retention_days: i64,

    #[arg(long, env = "APPLICATIONS_RETENTION_DAYS", default_value = "365")]
    pub applications_retention_days: i64,

    #[arg(long, env = "LOGS_RETENTION_DAYS", default_value = "30")]
    pub logs_retention_days: i64,

    #[arg(long, env = "BACKUPS_ROLLING_DAYS", default_value = "7")]
    pub backups_rolling_days: usize,

    /// First-run wizard finished; gates scheduler startup
    #[arg(long, env = "SETUP_COMPLETE", default_value = "false")]
    pub setup_complete: bool,
}

impl Config {
    /// Per-application artifact directory (screenshots, rendered CV).
    pub fn artifacts_dir(&self) -> PathBuf {
        self.data_dir.join("cv_generated")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }
}

/// Per-source request delay window in seconds. Sources not listed fall back
/// to the configured default pair.
pub fn rate_limit_window(source_id: &str) -> Option<(f64, f64)> {
    let window = match source_id {
        "indeed_es" => (4.0, 9.0),
        "infojobs" => (4.0, 9.0),
        "jobtoday" => (3.0, 7.0),
        "mercadona" => (5.0, 12.0),
        "lidl_es" => (3.0, 7.0),
        "amazon_es" => (6.0, 14.0),
        "manfred" => (3.0, 7.0),
        "tecnoempleo" => (3.0, 7.0),
        "greenhouse" => (2.0, 5.0),
        "lever" => (2.0, 5.0),
        "teamtailor" => (2.0, 5.0),
        "personio" => (2.0, 5.0),
        "workday" => (5.0, 12.0),
        "career_page" => (3.0, 8.0),
        _ => return None,
    };
    Some(window)
}

/// Session cookie lifetime in hours for sources that need warm cookies.
pub fn cookie_ttl_hours(source_id: &str) -> Option<u32> {
    match source_id {
        "indeed_es" => Some(24),
        "infojobs" => Some(48),
        "amazon_es" => Some(12),
        "mercadona" => Some(6),
        _ => None,
    }
}

pub const COMPANY_RULE_DEFAULT_MAX: i64 = 2;
pub const COMPANY_RULE_DEFAULT_DAYS: i64 = 14;
