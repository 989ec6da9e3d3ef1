//! Panic isolation around handler calls.
//!
//! With recovery enabled, a panicking handler yields a [`PanicFault`] that
//! becomes a `code=500` denial. With recovery disabled the panic unwinds
//! into the connection task and the connection is dropped.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::admission::Decision;

/// Suffix marking a message produced from a recovered panic
pub const RECOVERED_MARKER: &str = "[recovered]";

/// A panic captured at the handler boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicFault {
    message: String,
}

impl PanicFault {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { message }
    }

    /// The captured panic message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_decision(self) -> Decision {
        Decision::deny(500, format!("panic: {} {}", self.message, RECOVERED_MARKER))
    }
}

/// Await `fut`, catching a panic when `recover_panic` is set
pub async fn guarded<F>(recover_panic: bool, fut: F) -> Result<F::Output, PanicFault>
where
    F: Future + Send,
{
    if !recover_panic {
        return Ok(fut.await);
    }
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .map_err(PanicFault::from_payload)
}
