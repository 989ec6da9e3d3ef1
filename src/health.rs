//! Health server for probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 once webhooks are being served)
//! - `/metrics` - Prometheus metrics endpoint

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::info;

/// Labels for admission decision metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct DecisionLabels {
    pub path: String,
    pub allowed: bool,
    pub code: u16,
}

impl EncodeLabelSet for DecisionLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        let allowed = if self.allowed { "true" } else { "false" };
        let code = self.code.to_string();
        ("path", self.path.as_str()).encode(encoder.encode_label())?;
        ("allowed", allowed).encode(encoder.encode_label())?;
        ("code", code.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for per-path metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct PathLabels {
    pub path: String,
}

impl EncodeLabelSet for PathLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("path", self.path.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Admission metrics
pub struct Metrics {
    /// Decisions by path, verdict and code
    pub admission_requests_total: Family<DecisionLabels, Counter>,
    /// Requests rejected before reaching a handler
    pub admission_decode_errors_total: Family<PathLabels, Counter>,
    /// Time spent producing a decision
    pub admission_duration_seconds: Family<PathLabels, Histogram>,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let admission_requests_total = Family::<DecisionLabels, Counter>::default();
        registry.register(
            "admission_requests",
            "Total number of admission decisions",
            admission_requests_total.clone(),
        );

        let admission_decode_errors_total = Family::<PathLabels, Counter>::default();
        registry.register(
            "admission_decode_errors",
            "Total number of AdmissionReview bodies that failed to decode",
            admission_decode_errors_total.clone(),
        );

        let admission_duration_seconds =
            Family::<PathLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.0005, 2.0, 15))
            });
        registry.register(
            "admission_duration_seconds",
            "Duration of admission handling in seconds",
            admission_duration_seconds.clone(),
        );

        Self {
            admission_requests_total,
            admission_decode_errors_total,
            admission_duration_seconds,
            registry,
        }
    }

    /// Record a decision for `path`
    pub fn record_decision(&self, path: &str, allowed: bool, code: u16, duration_secs: f64) {
        let labels = DecisionLabels {
            path: path.to_string(),
            allowed,
            code,
        };
        self.admission_requests_total.get_or_create(&labels).inc();
        self.admission_duration_seconds
            .get_or_create(&PathLabels {
                path: path.to_string(),
            })
            .observe(duration_secs);
    }

    /// Record a body that never reached a handler
    pub fn record_decode_error(&self, path: &str) {
        self.admission_decode_errors_total
            .get_or_create(&PathLabels {
                path: path.to_string(),
            })
            .inc();
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the webhook listener is up
    ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Arc<Metrics>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Mark the service as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the service is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Liveness probe handler
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 503 Service Unavailable until the webhook listener is up.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the health server on `port`
pub async fn run_health_server(state: Arc<HealthState>, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
