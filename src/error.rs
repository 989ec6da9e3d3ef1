//! Error types for the dispatch engine.
//!
//! Errors are split by when they can happen:
//! - [`ConfigError`]: registration time, before anything is served
//! - [`DecodeError`]: per request, before any handler runs (HTTP 400)
//! - [`HandlerError`]: returned by defaulters and validators, mapped to a denied decision
//! - [`ServerError`]: listener and TLS setup

use thiserror::Error;

/// Configuration error raised while building or registering webhooks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// More than one target type was bound to a single webhook
    #[error("only one target type may be bound per webhook, got {0:?}")]
    MultipleTargets(Vec<String>),

    /// The target type is missing from the scheme
    #[error("type {0} is not registered in the scheme")]
    UnregisteredType(String),

    /// Two different Rust types were registered for the same kind
    #[error("kind {kind} is already registered for type {existing}")]
    ConflictingType { kind: String, existing: String },

    /// Neither a defaulter nor a validator was supplied
    #[error("webhook for {0} needs a defaulter or a validator")]
    MissingHandler(String),

    /// A custom path cannot serve both the defaulting and validating webhook
    #[error("custom path {0} cannot be shared by a defaulter and a validator")]
    AmbiguousCustomPath(String),

    /// Custom path is not a valid route
    #[error("invalid webhook path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The path is already served by another webhook
    #[error("webhook path {0} is already registered")]
    DuplicatePath(String),

    /// An environment setting could not be parsed
    #[error("invalid value {value:?} for {name}")]
    InvalidSetting { name: String, value: String },
}

/// Failure to decode an inbound AdmissionReview
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Request body was empty
    #[error("request body is empty")]
    EmptyBody,

    /// Body could not be read, or exceeded the size limit
    #[error("failed to read request body: {0}")]
    Body(String),

    /// Content type other than JSON
    #[error("contentType={0}, expected application/json")]
    ContentType(String),

    /// Malformed JSON or missing required fields
    #[error("malformed AdmissionReview: {0}")]
    Json(#[from] serde_json::Error),

    /// apiVersion names a schema this engine does not speak
    #[error("unsupported AdmissionReview apiVersion {0:?}")]
    UnsupportedVersion(String),

    /// Body declares a different version than the decoder it was handed to
    #[error("AdmissionReview declares apiVersion {found:?}, decoder expects {expected:?}")]
    VersionMismatch {
        expected: &'static str,
        found: String,
    },

    /// Envelope kind is not AdmissionReview
    #[error("unexpected envelope kind {0:?}, expected AdmissionReview")]
    InvalidKind(String),

    /// Operation outside CREATE/UPDATE/DELETE
    #[error("unsupported operation {0:?}")]
    UnsupportedOperation(String),
}

/// Error returned by a defaulter or validator.
///
/// The text becomes the decision message. A handler can pin the status code
/// with [`HandlerError::with_status`]; otherwise the pipeline default applies
/// (400 for defaulting, 403 for validation).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    status: Option<u16>,
    warnings: Vec<String>,
}

impl HandlerError {
    /// Error that takes the pipeline's default status code
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            warnings: Vec::new(),
        }
    }

    /// Error that carries its own status code
    pub fn with_status(code: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(code),
            warnings: Vec::new(),
        }
    }

    /// Attach warnings that are returned alongside the denial
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Explicit status code, if the handler set one
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_status(400, err.to_string())
    }
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum ServerError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Bind or serve failure
    #[error("webhook server error: {0}")]
    Io(#[from] std::io::Error),
}
