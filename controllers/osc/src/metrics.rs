//! Prometheus metrics and health endpoints.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `osc_reconciliations_total` | Counter | `result` |
//! | `osc_reconcile_duration_seconds` | Histogram | |
//! | `osc_work_queue_depth` | Gauge | |
//!
//! Served together with `/healthz` and `/readyz` on the metrics address.

use crate::error::ControllerError;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Buckets for reconcile duration (seconds)
const RECONCILE_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Result label of a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileResult {
    /// Finished without error
    Success,
    /// Failed on a MachineDeployment or profile problem
    ConfigurationError,
    /// Failed transiently
    Error,
    /// Exceeded the deadline
    Timeout,
}

impl ReconcileResult {
    fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ConfigurationError => "configuration_error",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }
}

/// Controller metrics.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    reconciliations: IntCounterVec,
    reconcile_duration: Histogram,
    queue_depth: IntGauge,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Creates the metrics and registers them with a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconciliations = IntCounterVec::new(
            Opts::new("osc_reconciliations_total", "MachineDeployment reconciliations by result"),
            &["result"],
        )?;
        registry.register(Box::new(reconciliations.clone()))?;

        let reconcile_duration = Histogram::with_opts(
            HistogramOpts::new("osc_reconcile_duration_seconds", "Duration of MachineDeployment reconciliations")
                .buckets(RECONCILE_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(reconcile_duration.clone()))?;

        let queue_depth = IntGauge::new("osc_work_queue_depth", "Keys waiting in the work queue")?;
        registry.register(Box::new(queue_depth.clone()))?;

        Ok(Self {
            registry,
            reconciliations,
            reconcile_duration,
            queue_depth,
        })
    }

    /// Records one reconciliation.
    pub fn observe_reconcile(&self, result: ReconcileResult, elapsed: Duration) {
        self.reconciliations.with_label_values(&[result.as_str()]).inc();
        self.reconcile_duration.observe(elapsed.as_secs_f64());
    }

    /// Sets the current work queue depth.
    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.set(i64::try_from(depth).unwrap_or(i64::MAX));
    }

    /// Reconciliations recorded with `result`.
    pub fn reconciliations(&self, result: ReconcileResult) -> u64 {
        self.reconciliations.with_label_values(&[result.as_str()]).get()
    }

    /// Prometheus text exposition of all metrics.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Shared state of the HTTP endpoints.
#[derive(Debug, Clone)]
pub struct HttpState {
    /// Metrics to expose
    pub metrics: Metrics,
    /// Set once the controller is running
    pub ready: Arc<AtomicBool>,
}

/// Router serving `/healthz`, `/readyz` and `/metrics`.
pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn readyz(State(state): State<HttpState>) -> (StatusCode, &'static str) {
    if state.ready.load(Ordering::SeqCst) {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

async fn metrics_handler(State(state): State<HttpState>) -> (StatusCode, String) {
    match state.metrics.encode_text() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Serves the router on `addr` until the process exits.
pub async fn serve(addr: SocketAddr, state: HttpState) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::InvalidConfig(format!("failed to bind metrics address {}: {}", addr, e)))?;
    info!("Serving metrics and probes on {}", addr);
    axum::serve(listener, router(state))
        .await
        .map_err(|e| ControllerError::InvalidConfig(format!("metrics server failed: {}", e)))
}
