mod api;
mod error;
mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sizak_core::config::AppConfig;
use sizak_core::guard::{FixedWindowLimiter, RateLimiter, RATE_WINDOW};
use sizak_core::llm::Brain;
use sizak_core::orchestrator::Orchestrator;
use sizak_core::store::{JobStore, PgStore};

// Shared by every handler. The anon store serves browsing and plain search;
// the orchestrator holds the service-tier store for tool execution.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub anon: Arc<dyn JobStore>,
    pub limiter: Arc<dyn RateLimiter>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/agent-chat", post(handlers::agent_chat))
        .route("/api/chat", post(handlers::plain_chat))
        .route("/api/search", post(handlers::search))
        .route("/api/industries", get(handlers::list_industries))
        .route("/api/industries/{industry_id}", get(handlers::industry_detail))
        .route("/api/jobs/{job_id}", get(handlers::job_detail))
        .route("/api/tracks/{track_id}", get(handlers::track_detail))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging Setup
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    info!("si-zak Gateway Initializing...");

    // 2. Configuration (fails fast on missing env)
    let config = AppConfig::from_env()?;
    debug!("Loaded config: {:?}", config);

    // 3. The Brain
    info!("Using model '{}' at {}", config.llm.model, config.llm.base_url);
    let brain = Arc::new(Brain::new(&config.llm));

    // 4. Stores, one pool per credential tier
    let anon = PgStore::connect(&config.database.url, &config.database.anon)
        .await
        .context("Failed to connect anon store")?;
    let service = PgStore::connect(&config.database.url, &config.database.service)
        .await
        .context("Failed to connect service store")?;

    // 5. Rate limiter, with a sweeper so idle clients do not pile up
    let limiter = Arc::new(FixedWindowLimiter::per_minute(config.rate_limit_per_minute));
    let sweeper = Arc::clone(&limiter);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(RATE_WINDOW);
        loop {
            tick.tick().await;
            let purged = sweeper.purge_expired(std::time::Instant::now());
            if purged > 0 {
                debug!("Purged {} idle rate-limit bucket(s)", purged);
            }
        }
    });

    // 6. Bundle State
    let state = AppState {
        orchestrator: Arc::new(Orchestrator::new(brain, Arc::new(service))),
        anon: Arc::new(anon),
        limiter,
    };

    // 7. Start Server
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Gateway listening on {}...", config.bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
