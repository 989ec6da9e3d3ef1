//! Admission webhook server.
//!
//! Collects the path bindings of completed webhooks and serves them as one
//! axum router. Every registered path accepts `POST` only; anything else,
//! including unregistered paths, is a 404 without the body being read.
//!
//! A processed request always answers HTTP 200: allow or deny is carried by
//! the AdmissionReview response itself. Bodies that cannot be read or decoded,
//! including bodies over [`MAX_REVIEW_BYTES`], answer 400 with a denial review.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::{Router, extract::State, routing::post};
use tracing::{error, info, warn};

use crate::admission::Decision;
use crate::builder::Webhook;
use crate::codec::{self, EnvelopeVersion};
use crate::config::ServerConfig;
use crate::error::{ConfigError, DecodeError, ServerError};
use crate::health::{HealthState, Metrics};
use crate::webhook::AdmissionHandler;

/// Largest AdmissionReview body read before decoding (7 MiB)
pub const MAX_REVIEW_BYTES: usize = 7 * 1024 * 1024;

/// Per-path state handed to the axum handler
struct Route {
    path: String,
    handler: Arc<dyn AdmissionHandler>,
    metrics: Option<Arc<Metrics>>,
}

/// Routing table of registered webhooks
#[derive(Default)]
pub struct WebhookServer {
    routes: BTreeMap<String, Arc<dyn AdmissionHandler>>,
    health: Option<Arc<HealthState>>,
}

impl WebhookServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record decisions in the health state's metrics and flip readiness
    /// once serving
    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    /// Add the bindings of a completed webhook.
    ///
    /// Fails without registering anything if one of its paths is taken.
    pub fn register(&mut self, webhook: Webhook) -> Result<&mut Self, ConfigError> {
        if let Some(taken) = webhook
            .bindings()
            .iter()
            .find(|b| self.routes.contains_key(&b.path))
        {
            return Err(ConfigError::DuplicatePath(taken.path.clone()));
        }
        for binding in webhook.into_bindings() {
            info!(path = %binding.path, kind = %binding.kind, "Registered webhook");
            self.routes.insert(binding.path, binding.handler);
        }
        Ok(self)
    }

    /// Registered paths, sorted
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Build the axum router serving every registered path
    pub fn router(&self) -> Router {
        let metrics = self.health.as_ref().map(|h| h.metrics.clone());
        self.routes
            .iter()
            .fold(Router::new(), |router, (path, handler)| {
                let route = Arc::new(Route {
                    path: path.clone(),
                    handler: handler.clone(),
                    metrics: metrics.clone(),
                });
                router.route(
                    path,
                    post(serve_admission).fallback(not_found).with_state(route),
                )
            })
            .fallback(not_found)
    }

    /// Serve on `config.port`, with TLS when the certificate and key exist
    pub async fn serve(self, config: &ServerConfig) -> Result<(), ServerError> {
        use axum_server::tls_rustls::RustlsConfig;

        let app = self.router();
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

        if config.tls_available() {
            let tls = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
                .await
                .map_err(|e| ServerError::TlsConfig(e.to_string()))?;
            self.mark_ready().await;
            info!(port = config.port, "Webhook server listening with TLS");
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await?;
        } else {
            warn!(
                cert_path = %config.cert_path.display(),
                "Webhook certificates not found, serving plain HTTP"
            );
            let listener = tokio::net::TcpListener::bind(addr).await?;
            self.mark_ready().await;
            info!(port = config.port, "Webhook server listening");
            axum::serve(listener, app).await?;
        }

        Ok(())
    }

    async fn mark_ready(&self) {
        if let Some(health) = &self.health {
            health.set_ready(true).await;
        }
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Decode, dispatch and encode one AdmissionReview
async fn serve_admission(
    State(route): State<Arc<Route>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let started = Instant::now();

    if let Some(content_type) = headers.get(CONTENT_TYPE) {
        let content_type = content_type.to_str().unwrap_or_default();
        if !is_json(content_type) {
            let err = DecodeError::ContentType(content_type.to_string());
            return decode_failure(&route, None, "", err);
        }
    }

    let body = match to_bytes(body, MAX_REVIEW_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            let err = DecodeError::Body(e.to_string());
            return decode_failure(&route, None, "", err);
        }
    };

    let version = match EnvelopeVersion::detect(&body) {
        Ok(version) => version,
        Err(e) => {
            let uid = codec::peek_uid(&body).unwrap_or_default();
            return decode_failure(&route, None, &uid, e);
        }
    };
    let request = match version.decode_review(&body) {
        Ok(request) => request,
        Err(e) => {
            let uid = codec::peek_uid(&body).unwrap_or_default();
            return decode_failure(&route, Some(version), &uid, e);
        }
    };

    let uid = request.uid.clone();
    let operation = request.operation;
    let decision = route.handler.handle(request).await;

    if decision.is_allowed() {
        info!(
            uid = %uid,
            path = %route.path,
            %operation,
            patched = decision.patch().is_some(),
            "Admission request allowed"
        );
    } else {
        warn!(
            uid = %uid,
            path = %route.path,
            %operation,
            code = decision.code(),
            message = %decision.message(),
            "Admission request denied"
        );
    }
    if let Some(metrics) = &route.metrics {
        metrics.record_decision(
            &route.path,
            decision.is_allowed(),
            decision.code(),
            started.elapsed().as_secs_f64(),
        );
    }

    review_response(StatusCode::OK, version, &uid, &decision)
}

/// `application/json` media type, parameters ignored
fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media| media.trim().eq_ignore_ascii_case("application/json"))
}

/// Answer 400 with a denial in the declared version (v1 if unknown),
/// echoing the uid when the body carried one
fn decode_failure(
    route: &Route,
    version: Option<EnvelopeVersion>,
    uid: &str,
    err: DecodeError,
) -> Response {
    error!(uid = %uid, path = %route.path, error = %err, "Failed to decode AdmissionReview");
    if let Some(metrics) = &route.metrics {
        metrics.record_decode_error(&route.path);
    }
    let decision = Decision::deny(400, err.to_string());
    review_response(
        StatusCode::BAD_REQUEST,
        version.unwrap_or(EnvelopeVersion::V1),
        uid,
        &decision,
    )
}

fn review_response(
    status: StatusCode,
    version: EnvelopeVersion,
    uid: &str,
    decision: &Decision,
) -> Response {
    match version.encode_review(uid, decision) {
        Ok(body) => (status, [(CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            error!(uid = %uid, error = %e, "Failed to encode AdmissionReview");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
