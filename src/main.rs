//! Gatekeeper Core - Safety Guardrail Pipeline for Generative Video
//!
//! This service gates content at two stages of the generation
//! pipeline: prompts before a render starts (pre-guard) and rendered
//! artifacts before they ship (post-guard).

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePool;
use tokio::net::TcpListener;

mod api;
mod config;
mod domain;
mod engine;
mod error;
mod logging;
mod storage;

use crate::api::build_router;
use crate::config::Config;
use crate::engine::{
    spawn_drain, AggregationPolicy, AlertChannel, ContentScorer, GuardMetrics, GuardServices,
    HeuristicScorer, InMemoryDecisionCache, PostGuard, PreGuard, RemoteScorer, RetryingScorer,
    ThresholdSet,
};
use crate::storage::GuardRepository;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The input-stage guard.
    pub pre_guard: Arc<PreGuard>,
    /// The output-stage guard.
    pub post_guard: Arc<PostGuard>,
    /// Database repository.
    pub repository: GuardRepository,
    /// Pre-guard counters and audit index.
    pub pre_metrics: Arc<GuardMetrics>,
    /// Post-guard counters and audit index.
    pub post_metrics: Arc<GuardMetrics>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if present)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Note: No .env file loaded ({e})");
    }

    // Initialize logging
    logging::init();

    tracing::info!("Starting Gatekeeper Core v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        database = %config.database.url,
        "Configuration loaded"
    );

    // Validate guard policy up front; a bad threshold or weight set
    // must refuse to start, not fail on the first check.
    let thresholds = ThresholdSet::new(&config.guards.thresholds)
        .map_err(|e| anyhow::anyhow!("Threshold configuration error: {}", e))?;
    let policy = AggregationPolicy::new(&config.guards.post)
        .map_err(|e| anyhow::anyhow!("Aggregation configuration error: {}", e))?;

    // Connect to database
    let pool = SqlitePool::connect(&config.database.url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            anyhow::anyhow!("Database connection error: {}", e)
        })?;

    // Initialize repository and schema
    let repository = GuardRepository::new(pool);
    repository.init_schema().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize database schema");
        anyhow::anyhow!("Schema initialization error: {}", e)
    })?;

    tracing::info!("Database connected and schema initialized");

    // Build the scorer facade: remote classifier when configured,
    // the built-in heuristic otherwise.
    let scorer: Arc<dyn ContentScorer> = match &config.classifier.endpoint {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, "Remote classifier enabled");
            Arc::new(
                RemoteScorer::new(endpoint.clone(), &config.classifier)
                    .map_err(|e| anyhow::anyhow!("Classifier configuration error: {}", e))?,
            )
        }
        None => {
            tracing::info!("No classifier endpoint configured, using heuristic scorer");
            Arc::new(HeuristicScorer::new(Vec::new()))
        }
    };
    let scorer: Arc<dyn ContentScorer> = Arc::new(RetryingScorer::new(
        scorer,
        config.classifier.retry_attempts,
    ));

    // Shared cache, per-guard metrics
    let cache = Arc::new(InMemoryDecisionCache::new());
    let pre_metrics = Arc::new(GuardMetrics::new(config.guards.audit_retention));
    let post_metrics = Arc::new(GuardMetrics::new(config.guards.audit_retention));

    // Alert side-channel for escalated failures
    let (alerts, alert_receiver) = AlertChannel::new(config.guards.alert_capacity);
    spawn_drain(alert_receiver);

    let default_ttl = Duration::from_secs(config.guards.cache_ttl_secs);

    let pre_guard = Arc::new(PreGuard::new(
        GuardServices {
            scorer: Arc::clone(&scorer),
            cache: cache.clone(),
            metrics: Arc::clone(&pre_metrics),
            audit: Arc::new(repository.clone()),
        },
        thresholds,
        default_ttl,
    ));
    let post_guard = Arc::new(PostGuard::new(
        GuardServices {
            scorer,
            cache,
            metrics: Arc::clone(&post_metrics),
            audit: Arc::new(repository.clone()),
        },
        policy,
        alerts,
        default_ttl,
    ));

    // Build application state
    let state = AppState {
        pre_guard,
        post_guard,
        repository,
        pre_metrics,
        post_metrics,
    };

    // Build router
    let app = build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(address = %addr, "Server listening");
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
