//! admission-dispatch library crate
//!
//! An admission webhook engine: register a defaulter and/or validator for a
//! resource type, and the engine routes AdmissionReview requests to it,
//! answering in the envelope version the caller used.
//!
//! - [`builder`]: registration and configuration checks
//! - [`server`]: path routing and the HTTP surface
//! - [`codec`]: `admission.k8s.io/v1` and `v1beta1` envelopes
//! - [`webhook`]: defaulting and validating pipelines, panic isolation

pub mod admission;
pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod health;
pub mod policies;
pub mod router;
pub mod scheme;
pub mod server;
pub mod webhook;

pub use admission::{AdmissionRequest, Decision, Operation, PatchType, ResourceIdentity};
pub use builder::{Webhook, WebhookBuilder};
pub use codec::EnvelopeVersion;
pub use config::{HEALTH_PORT, ServerConfig, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT};
pub use error::{ConfigError, DecodeError, HandlerError, ServerError};
pub use health::HealthState;
pub use router::{WebhookKind, mutate_path, validate_path};
pub use scheme::{AdmissionObject, Scheme};
pub use server::WebhookServer;
pub use webhook::{AdmissionContext, Defaulter, Validator, Warnings};
