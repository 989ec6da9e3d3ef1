//! Defaulting pipeline: mutate in place, diff, return a JSON Patch.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Instrument, error, info};

use super::{AdmissionHandler, Defaulter, HandlerOptions, guard, materialize};
use crate::admission::{AdmissionRequest, Decision, Operation};
use crate::scheme::AdmissionObject;

/// Status used when a defaulter error carries no code of its own
pub const DEFAULT_MUTATION_DENY_CODE: u16 = 400;

/// Serves the defaulting path of one registered type
pub struct MutatingWebhook<T: AdmissionObject> {
    defaulter: Arc<dyn Defaulter<T>>,
    options: HandlerOptions,
    _type: PhantomData<fn() -> T>,
}

impl<T: AdmissionObject> MutatingWebhook<T> {
    pub fn new(defaulter: Arc<dyn Defaulter<T>>, options: HandlerOptions) -> Self {
        Self {
            defaulter,
            options,
            _type: PhantomData,
        }
    }
}

#[async_trait]
impl<T: AdmissionObject> AdmissionHandler for MutatingWebhook<T> {
    async fn handle(&self, request: AdmissionRequest) -> Decision {
        if let Err(denied) = self.options.check_kind(&request) {
            return denied;
        }

        // Nothing to default on delete
        if request.operation == Operation::Delete {
            return Decision::allow();
        }

        let mut obj: T = match materialize(request.object.as_ref(), "object") {
            Ok(obj) => obj,
            Err(denied) => return denied,
        };
        let before = match serde_json::to_value(&obj) {
            Ok(v) => v,
            Err(e) => return Decision::deny(500, format!("failed to serialize object: {e}")),
        };

        let ctx = self.options.context(request);
        let span = ctx.span().clone();
        span.in_scope(|| info!("Defaulting object"));

        let outcome = guard::guarded(
            self.options.recover_panic,
            self.defaulter.default(&ctx, &mut obj).instrument(span.clone()),
        )
        .await;

        match outcome {
            Err(fault) => {
                span.in_scope(|| error!(panic = %fault.message(), "Recovered panic in defaulter"));
                fault.into_decision()
            }
            Ok(Err(err)) => Decision::from_handler_error(err, DEFAULT_MUTATION_DENY_CODE),
            Ok(Ok(())) => {
                let after = match serde_json::to_value(&obj) {
                    Ok(v) => v,
                    Err(e) => {
                        return Decision::deny(500, format!("failed to serialize object: {e}"));
                    }
                };
                let patch = json_patch::diff(&before, &after);
                Decision::patched(&patch).unwrap_or_else(|e| {
                    Decision::deny(500, format!("failed to encode patch: {e}"))
                })
            }
        }
    }
}
