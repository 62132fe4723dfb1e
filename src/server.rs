//! HTTP server for health and metrics endpoints

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use eyre::eyre;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

/// Rewarder statistics shared between the watcher and the HTTP server
#[derive(Debug, Default, Clone)]
pub struct RewarderStats {
    /// Rewarder instance ID
    pub rewarder_id: String,
    /// Network this instance watches
    pub network: String,
    /// Distinct addresses known to be paid
    pub ledger_size: u64,
    /// Next unscanned block height
    pub cursor: u64,
    /// Last observed chain head
    pub chain_head: u64,
    /// Addresses paid since startup
    pub addresses_paid: u64,
    /// Payment batches submitted since startup
    pub batches_submitted: u64,
    /// Payment batches that reverted or failed to submit
    pub batches_failed: u64,
    /// Whether the ledger seed scan has completed
    pub seeded: bool,
}

/// Prometheus metrics
pub struct Metrics {
    pub addresses_paid_total: IntCounter,
    pub batches_submitted_total: IntCounter,
    pub batches_failed_total: IntCounter,
    pub scan_errors_total: IntCounter,
    pub ledger_size: IntGauge,
    pub cursor_height: IntGauge,
    pub chain_head: IntGauge,
    pub registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let addresses_paid_total = IntCounter::new(
            "rewarder_addresses_paid_total",
            "Total addresses rewarded since startup",
        )
        .expect("constant metric name is valid");

        let batches_submitted_total = IntCounter::new(
            "rewarder_batches_submitted_total",
            "Total payment batches submitted to the chain",
        )
        .expect("constant metric name is valid");

        let batches_failed_total = IntCounter::new(
            "rewarder_batches_failed_total",
            "Total payment batches that reverted or failed to submit",
        )
        .expect("constant metric name is valid");

        let scan_errors_total = IntCounter::new(
            "rewarder_scan_errors_total",
            "Total scan iterations that failed and will be retried",
        )
        .expect("constant metric name is valid");

        let ledger_size = IntGauge::new(
            "rewarder_ledger_size",
            "Distinct addresses known to be paid",
        )
        .expect("constant metric name is valid");

        let cursor_height = IntGauge::new(
            "rewarder_cursor_height",
            "Next unscanned block height",
        )
        .expect("constant metric name is valid");

        let chain_head = IntGauge::new(
            "rewarder_chain_head",
            "Last observed chain head height",
        )
        .expect("constant metric name is valid");

        // Registration runs exactly once at startup with unique names
        registry
            .register(Box::new(addresses_paid_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(batches_submitted_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(batches_failed_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(scan_errors_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(ledger_size.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(cursor_height.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(chain_head.clone()))
            .expect("metric registration must not be called twice");

        Self {
            addresses_paid_total,
            batches_submitted_total,
            batches_failed_total,
            scan_errors_total,
            ledger_size,
            cursor_height,
            chain_head,
            registry,
        }
    }
}

/// Shared state for the HTTP server
pub type SharedStats = Arc<RwLock<RewarderStats>>;
pub type SharedMetrics = Arc<Metrics>;

/// Combined app state
#[derive(Clone)]
pub struct AppState {
    pub stats: SharedStats,
    pub metrics: SharedMetrics,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub rewarder_id: String,
    pub network: String,
    pub ledger_size: u64,
    pub cursor: u64,
    pub chain_head: u64,
    pub addresses_paid: u64,
    pub batches_submitted: u64,
    pub batches_failed: u64,
}

/// Health check endpoint handler
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.stats.read().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        rewarder_id: stats.rewarder_id.clone(),
        network: stats.network.clone(),
        ledger_size: stats.ledger_size,
        cursor: stats.cursor,
        chain_head: stats.chain_head,
        addresses_paid: stats.addresses_paid,
        batches_submitted: stats.batches_submitted,
        batches_failed: stats.batches_failed,
    })
}

/// Liveness probe (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Readiness probe (checks if the ledger seed scan has completed)
async fn readiness(State(state): State<AppState>) -> &'static str {
    let stats = state.stats.read().await;
    if stats.seeded {
        "OK"
    } else {
        "NOT_READY"
    }
}

/// Prometheus metrics endpoint
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    match Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

/// Start the HTTP server for health and metrics
pub async fn start_server(
    bind_address: &str,
    port: u16,
    stats: SharedStats,
    prom_metrics: SharedMetrics,
) -> eyre::Result<()> {
    let state = AppState {
        stats,
        metrics: prom_metrics,
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;
    info!("Health server listening on {}", addr);
    info!("  /health  - Full health status (JSON)");
    info!("  /metrics - Prometheus metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
