//! Validation pipeline: dispatch by operation, map the outcome to a decision.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Instrument, error, info};

use super::{AdmissionHandler, HandlerOptions, Validator, Warnings, guard, materialize};
use crate::admission::{AdmissionRequest, Decision, Operation};
use crate::error::HandlerError;
use crate::scheme::AdmissionObject;

/// Status used when a validator error carries no code of its own
pub const DEFAULT_VALIDATION_DENY_CODE: u16 = 403;

/// Serves the validating path of one registered type
pub struct ValidatingWebhook<T: AdmissionObject> {
    validator: Arc<dyn Validator<T>>,
    options: HandlerOptions,
    _type: PhantomData<fn() -> T>,
}

impl<T: AdmissionObject> ValidatingWebhook<T> {
    pub fn new(validator: Arc<dyn Validator<T>>, options: HandlerOptions) -> Self {
        Self {
            validator,
            options,
            _type: PhantomData,
        }
    }

    async fn run<F>(&self, span: tracing::Span, fut: F) -> Decision
    where
        F: Future<Output = Result<Warnings, HandlerError>> + Send,
    {
        span.in_scope(|| info!("Validating object"));
        let outcome = guard::guarded(self.options.recover_panic, fut.instrument(span.clone())).await;
        match outcome {
            Err(fault) => {
                span.in_scope(|| error!(panic = %fault.message(), "Recovered panic in validator"));
                fault.into_decision()
            }
            Ok(Err(err)) => Decision::from_handler_error(err, DEFAULT_VALIDATION_DENY_CODE),
            Ok(Ok(warnings)) => Decision::allow().with_warnings(warnings),
        }
    }
}

#[async_trait]
impl<T: AdmissionObject> AdmissionHandler for ValidatingWebhook<T> {
    async fn handle(&self, request: AdmissionRequest) -> Decision {
        if let Err(denied) = self.options.check_kind(&request) {
            return denied;
        }

        match request.operation {
            Operation::Create => {
                let obj: T = match materialize(request.object.as_ref(), "object") {
                    Ok(obj) => obj,
                    Err(denied) => return denied,
                };
                let ctx = self.options.context(request);
                let span = ctx.span().clone();
                self.run(span, self.validator.validate_create(&ctx, &obj))
                    .await
            }
            Operation::Update => {
                let old: T = match materialize(request.old_object.as_ref(), "oldObject") {
                    Ok(obj) => obj,
                    Err(denied) => return denied,
                };
                let new: T = match materialize(request.object.as_ref(), "object") {
                    Ok(obj) => obj,
                    Err(denied) => return denied,
                };
                let ctx = self.options.context(request);
                let span = ctx.span().clone();
                self.run(span, self.validator.validate_update(&ctx, &old, &new))
                    .await
            }
            Operation::Delete => {
                let old: T = match materialize(request.old_object.as_ref(), "oldObject") {
                    Ok(obj) => obj,
                    Err(denied) => return denied,
                };
                let ctx = self.options.context(request);
                let span = ctx.span().clone();
                self.run(span, self.validator.validate_delete(&ctx, &old))
                    .await
            }
        }
    }
}
