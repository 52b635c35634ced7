use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use clap::Parser;
use sqlx::SqlitePool;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use jobbot::config::Config;
use jobbot::documents::{CommandRenderer, DocumentPipeline};
use jobbot::events::EventBus;
use jobbot::forms::page::UnconfiguredBrowser;
use jobbot::human_loop::HumanLoop;
use jobbot::llm::OllamaClient;
use jobbot::models::source_run::SourceRun;
use jobbot::routes::AppState;
use jobbot::scrapers::scheduler::Scheduler;

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz(pool: SqlitePool) -> impl IntoResponse {
    let result: Result<(i32,), _> = sqlx::query_as("SELECT 1").fetch_one(&pool).await;
    match result {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jobbot=info,tower_http=info")),
        )
        .init();

    let config = Arc::new(Config::parse());
    tokio::fs::create_dir_all(config.artifacts_dir()).await?;
    tokio::fs::create_dir_all(config.backups_dir()).await?;

    tracing::info!("Connecting to database...");
    let pool = jobbot::db::create_pool(&config.database_url).await?;

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        jobbot::db::run_migrations(&pool).await?;
        tracing::info!("Migrations complete");
    }

    // Runs left behind by a crash stay out of the zero-run accounting.
    let stale = SourceRun::recover_stale(&pool, "interrupted by restart").await?;
    if stale > 0 {
        tracing::warn!(stale, "recovered stale running source runs");
    }

    if let Err(e) =
        jobbot::backup::run_backup(&pool, &config.backups_dir(), config.backups_rolling_days).await
    {
        tracing::warn!("startup backup failed: {e}");
    }

    let bus = Arc::new(EventBus::new());
    jobbot::notify::spawn(bus.clone());

    let llm = Arc::new(OllamaClient::new(
        &config.ollama_host,
        &config.ollama_model,
        config.ollama_timeout,
    )?);
    if !llm.health_check().await {
        tracing::warn!(host = %config.ollama_host, "LLM backend unreachable at startup");
    }

    let renderer = Arc::new(CommandRenderer::new(
        &config.pdf_renderer_cmd,
        &config.artifacts_dir(),
    ));
    let pipeline = Arc::new(DocumentPipeline::new(
        pool.clone(),
        bus.clone(),
        llm.clone(),
        renderer,
        config.cv_rewrite_temperature,
        config.cv_summary_temperature,
        config.quality_score_minimum,
    ));

    let human_loop = HumanLoop::new(
        pool.clone(),
        bus.clone(),
        Arc::new(UnconfiguredBrowser),
        config.artifacts_dir(),
        config.human_review_timeout_minutes,
        config.human_review_warn_minutes,
        Duration::from_secs(config.submit_confirm_timeout_seconds),
    );

    let scheduler = Scheduler::new(
        pool.clone(),
        bus.clone(),
        config.scraper_consecutive_zero_disable,
        (
            config.scraper_default_delay_min,
            config.scraper_default_delay_max,
        ),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if config.setup_complete {
        scheduler.clone().spawn_all(shutdown_rx.clone());
        tracing::info!("Scraper scheduler started");
    } else {
        tracing::warn!("Setup not complete; scraper scheduler disabled");
    }
    jobbot::retention::spawn(pool.clone(), config.clone(), shutdown_rx.clone());

    let state = AppState {
        pool: pool.clone(),
        bus,
        scheduler,
        human_loop,
        pipeline,
    };

    let readyz_pool = pool.clone();
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(move || readyz(readyz_pool.clone())))
        .merge(jobbot::routes::api::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    // Anything still mid-run is finalized as failed with the reason.
    let cancelled = SourceRun::recover_stale(&pool, "cancelled by shutdown").await?;
    if cancelled > 0 {
        tracing::info!(cancelled, "finalized cancelled source runs");
    }

    Ok(())
}
