mod rest;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use overpass_client::OverpassClient;
use pavescout_common::Config;
use pavescout_engine::evaluator::UnconfiguredEvaluator;
use pavescout_engine::sources::{OsmBusinessSource, OsmLotSource};
use pavescout_engine::store::InMemoryLeadStore;
use pavescout_engine::traits::RawLotSource;
use pavescout_engine::DiscoveryService;

pub struct AppState {
    pub service: DiscoveryService,
}

/// How often the retention sweeper runs.
const SWEEP_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pavescout=info".parse()?))
        .init();

    info!("Pavescout API starting...");

    let config = Config::from_env();

    let overpass = Arc::new(OverpassClient::with_endpoint(config.overpass_url.clone()));
    let lot_sources: Vec<Arc<dyn RawLotSource>> =
        vec![Arc::new(OsmLotSource::new(overpass.clone()))];
    warn!("No condition evaluator configured; lots will carry evaluation errors");

    let service = DiscoveryService::new(
        Arc::new(InMemoryLeadStore::new()),
        lot_sources,
        Arc::new(OsmBusinessSource::new(overpass)),
        Arc::new(UnconfiguredEvaluator),
    )
    .with_evaluation_pacing(Duration::from_millis(config.evaluation_pacing_ms));

    // Retention sweeper: bound job-table growth by dropping finished jobs
    // older than the retention window.
    let retention = chrono::Duration::hours(config.job_retention_hours);
    let sweeper = service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            sweeper.purge_expired(retention).await;
        }
    });

    let state = Arc::new(AppState { service });
    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/health", get(|| async { "ok" }))
        .route("/api/discoveries", post(rest::api_submit_discovery))
        .route("/api/discoveries/{id}", get(rest::api_job_status))
        .route("/api/discoveries/{id}/results", get(rest::api_job_results))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr, "Pavescout API listening");
    axum::serve(listener, app).await?;

    Ok(())
}
