//! Webhook registration builder.
//!
//! ```rust,ignore
//! let webhook = WebhookBuilder::new()
//!     .for_type::<Workload>()
//!     .with_defaulter(ReplicaDefaulter)
//!     .with_validator(MonotonicReplicaValidator)
//!     .complete(&scheme)?;
//! server.register(webhook)?;
//! ```
//!
//! All checks run in [`WebhookBuilder::complete`], so a bad registration
//! fails at startup instead of on the first request.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{Span, debug};

use crate::admission::{AdmissionRequest, ResourceIdentity};
use crate::error::ConfigError;
use crate::router::{WebhookKind, default_path, validate_custom_path};
use crate::scheme::{AdmissionObject, Scheme};
use crate::webhook::{
    AdmissionHandler, Defaulter, HandlerOptions, LogConstructor, MutatingWebhook,
    ValidatingWebhook, Validator,
};

/// Marker for a builder with no target type yet
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Builder for one webhook registration
pub struct WebhookBuilder<T = Unbound> {
    targets: Vec<ResourceIdentity>,
    defaulter: Option<Arc<dyn Defaulter<T>>>,
    validator: Option<Arc<dyn Validator<T>>>,
    custom_path: Option<String>,
    recover_panic: bool,
    log_constructor: Option<LogConstructor>,
    _type: PhantomData<fn() -> T>,
}

impl WebhookBuilder<Unbound> {
    pub fn new() -> Self {
        Self {
            targets: Vec::new(),
            defaulter: None,
            validator: None,
            custom_path: None,
            recover_panic: true,
            log_constructor: None,
            _type: PhantomData,
        }
    }
}

impl Default for WebhookBuilder<Unbound> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WebhookBuilder<T> {
    /// Bind the target type. Binding a second type makes `complete` fail.
    ///
    /// Handlers are typed, so any handler set before rebinding is dropped.
    pub fn for_type<U: AdmissionObject>(self) -> WebhookBuilder<U> {
        let mut targets = self.targets;
        targets.push(U::identity());
        WebhookBuilder {
            targets,
            defaulter: None,
            validator: None,
            custom_path: self.custom_path,
            recover_panic: self.recover_panic,
            log_constructor: self.log_constructor,
            _type: PhantomData,
        }
    }

    /// Serve on `path` instead of the derived default path
    pub fn with_custom_path(mut self, path: impl Into<String>) -> Self {
        self.custom_path = Some(path.into());
        self
    }

    /// Recover handler panics into a 500 decision (default `true`)
    pub fn recover_panic(mut self, recover: bool) -> Self {
        self.recover_panic = recover;
        self
    }

    /// Replace the per-request span constructor
    pub fn with_log_constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&AdmissionRequest) -> Span + Send + Sync + 'static,
    {
        self.log_constructor = Some(Arc::new(constructor));
        self
    }
}

impl<T: AdmissionObject> WebhookBuilder<T> {
    pub fn with_defaulter(mut self, defaulter: impl Defaulter<T> + 'static) -> Self {
        self.defaulter = Some(Arc::new(defaulter));
        self
    }

    pub fn with_validator(mut self, validator: impl Validator<T> + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Validate the configuration and produce the path bindings
    pub fn complete(self, scheme: &Scheme) -> Result<Webhook, ConfigError> {
        if self.targets.len() > 1 {
            return Err(ConfigError::MultipleTargets(
                self.targets.iter().map(|t| t.to_string()).collect(),
            ));
        }

        let identity = T::identity();
        if !scheme.recognizes::<T>() {
            return Err(ConfigError::UnregisteredType(identity.to_string()));
        }

        if self.defaulter.is_none() && self.validator.is_none() {
            return Err(ConfigError::MissingHandler(identity.to_string()));
        }

        if let Some(path) = &self.custom_path {
            validate_custom_path(path)?;
            if self.defaulter.is_some() && self.validator.is_some() {
                return Err(ConfigError::AmbiguousCustomPath(path.clone()));
            }
        }

        let mut options = HandlerOptions::new(identity.clone());
        options.recover_panic = self.recover_panic;
        if let Some(constructor) = self.log_constructor {
            options.log_constructor = constructor;
        }

        let path_for = |kind| {
            self.custom_path
                .clone()
                .unwrap_or_else(|| default_path(kind, &identity))
        };

        let mut bindings = Vec::with_capacity(2);
        if let Some(defaulter) = self.defaulter {
            let path = path_for(WebhookKind::Mutating);
            debug!(%identity, %path, "Registering defaulting webhook");
            bindings.push(Binding {
                kind: WebhookKind::Mutating,
                path,
                handler: Arc::new(MutatingWebhook::new(defaulter, options.clone())),
            });
        }
        if let Some(validator) = self.validator {
            let path = path_for(WebhookKind::Validating);
            debug!(%identity, %path, "Registering validating webhook");
            bindings.push(Binding {
                kind: WebhookKind::Validating,
                path,
                handler: Arc::new(ValidatingWebhook::new(validator, options)),
            });
        }

        Ok(Webhook { identity, bindings })
    }
}

/// One path served by a registration
#[derive(Clone)]
pub struct Binding {
    pub kind: WebhookKind,
    pub path: String,
    pub handler: Arc<dyn AdmissionHandler>,
}

/// A validated registration, ready to be served
pub struct Webhook {
    identity: ResourceIdentity,
    bindings: Vec<Binding>,
}

impl Webhook {
    pub fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Path served for `kind`, if the registration has that handler
    pub fn path(&self, kind: WebhookKind) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.kind == kind)
            .map(|b| b.path.as_str())
    }

    pub(crate) fn into_bindings(self) -> Vec<Binding> {
        self.bindings
    }
}
