//! Admission handlers.
//!
//! User code plugs in through [`Defaulter`] and [`Validator`]. The engine
//! wraps them in a [`MutatingWebhook`] or [`ValidatingWebhook`], both of which
//! implement the type-erased [`AdmissionHandler`] the server dispatches to.
//!
//! Every handler call runs inside the request's span and under the panic
//! guard (see [`guard`]).

pub mod guard;
mod mutating;
mod validating;

pub use guard::{PanicFault, RECOVERED_MARKER};
pub use mutating::MutatingWebhook;
pub use validating::ValidatingWebhook;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::Span;

use crate::admission::{AdmissionRequest, Decision, Operation, ResourceIdentity};
use crate::error::HandlerError;
use crate::scheme::AdmissionObject;

/// Warnings returned to the caller alongside a decision
pub type Warnings = Vec<String>;

/// Builds the per-request span handlers log into
pub type LogConstructor = Arc<dyn Fn(&AdmissionRequest) -> Span + Send + Sync>;

/// Default span: request correlation fields, nothing else
pub fn default_log_constructor(request: &AdmissionRequest) -> Span {
    tracing::info_span!(
        "admission",
        uid = %request.uid,
        namespace = request.namespace.as_deref().unwrap_or(""),
        name = request.name.as_deref().unwrap_or(""),
        resource = %request.resource,
        operation = %request.operation,
        user = %request.user_info.username,
    )
}

/// Per-request context handed to defaulters and validators
pub struct AdmissionContext {
    request: AdmissionRequest,
    span: Span,
}

impl AdmissionContext {
    pub fn new(request: AdmissionRequest, span: Span) -> Self {
        Self { request, span }
    }

    /// The request being admitted
    pub fn request(&self) -> &AdmissionRequest {
        &self.request
    }

    /// Span seeded with the request's correlation fields
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn uid(&self) -> &str {
        &self.request.uid
    }

    pub fn operation(&self) -> Operation {
        self.request.operation
    }

    pub fn is_dry_run(&self) -> bool {
        self.request.dry_run
    }
}

/// Mutates an object in place before it is persisted
#[async_trait]
pub trait Defaulter<T>: Send + Sync {
    async fn default(&self, ctx: &AdmissionContext, obj: &mut T) -> Result<(), HandlerError>;
}

/// Accepts or rejects a change
#[async_trait]
pub trait Validator<T>: Send + Sync {
    async fn validate_create(&self, ctx: &AdmissionContext, obj: &T)
    -> Result<Warnings, HandlerError>;

    async fn validate_update(
        &self,
        ctx: &AdmissionContext,
        old: &T,
        new: &T,
    ) -> Result<Warnings, HandlerError>;

    async fn validate_delete(&self, ctx: &AdmissionContext, old: &T)
    -> Result<Warnings, HandlerError>;
}

/// A type-erased handler bound to one path
#[async_trait]
pub trait AdmissionHandler: Send + Sync {
    async fn handle(&self, request: AdmissionRequest) -> Decision;
}

/// Settings shared by both pipelines
#[derive(Clone)]
pub struct HandlerOptions {
    pub identity: ResourceIdentity,
    pub recover_panic: bool,
    pub log_constructor: LogConstructor,
}

impl HandlerOptions {
    pub fn new(identity: ResourceIdentity) -> Self {
        Self {
            identity,
            recover_panic: true,
            log_constructor: Arc::new(default_log_constructor),
        }
    }

    /// Deny requests whose kind is not the registered one
    fn check_kind(&self, request: &AdmissionRequest) -> Result<(), Decision> {
        if request.kind.kind == self.identity.kind {
            Ok(())
        } else {
            Err(Decision::deny(
                400,
                format!(
                    "expected Kind {} got {:?}",
                    self.identity.kind, request.kind.kind
                ),
            ))
        }
    }

    fn context(&self, request: AdmissionRequest) -> AdmissionContext {
        let span = (self.log_constructor)(&request);
        AdmissionContext::new(request, span)
    }
}

/// Materialise the registered type from a raw object field
fn materialize<T: AdmissionObject>(raw: Option<&Value>, field: &str) -> Result<T, Decision> {
    let raw =
        raw.ok_or_else(|| Decision::deny(400, format!("there is no content to decode in {field}")))?;
    serde_json::from_value(raw.clone())
        .map_err(|e| Decision::deny(400, format!("failed to decode {field}: {e}")))
}
