//! Replica count policies.
//!
//! Defaulting: workloads below [`MIN_REPLICAS`] are raised to it.
//!
//! Validation:
//! - `replica` cannot be negative
//! - `replica` cannot decrease on update
//! - a workload can only be deleted once scaled to zero

use async_trait::async_trait;
use tracing::debug;

use super::{MIN_REPLICAS, Workload};
use crate::error::HandlerError;
use crate::webhook::{AdmissionContext, Defaulter, Validator, Warnings};

/// Raises `replica` to the minimum
#[derive(Debug, Clone, Copy)]
pub struct ReplicaDefaulter;

#[async_trait]
impl Defaulter<Workload> for ReplicaDefaulter {
    async fn default(
        &self,
        _ctx: &AdmissionContext,
        obj: &mut Workload,
    ) -> Result<(), HandlerError> {
        if obj.replica < MIN_REPLICAS {
            debug!(from = obj.replica, to = MIN_REPLICAS, "Raising replica count");
            obj.replica = MIN_REPLICAS;
        }
        Ok(())
    }
}

/// Rejects negative counts, scale-downs and deletes of running workloads
#[derive(Debug, Clone, Copy)]
pub struct MonotonicReplicaValidator;

fn check_non_negative(obj: &Workload) -> Result<(), HandlerError> {
    if obj.replica < 0 {
        return Err(HandlerError::new(
            "number of replica should be greater than or equal to 0",
        ));
    }
    Ok(())
}

#[async_trait]
impl Validator<Workload> for MonotonicReplicaValidator {
    async fn validate_create(
        &self,
        _ctx: &AdmissionContext,
        obj: &Workload,
    ) -> Result<Warnings, HandlerError> {
        check_non_negative(obj)?;
        Ok(Vec::new())
    }

    async fn validate_update(
        &self,
        _ctx: &AdmissionContext,
        old: &Workload,
        new: &Workload,
    ) -> Result<Warnings, HandlerError> {
        check_non_negative(new)?;
        if new.replica < old.replica {
            return Err(HandlerError::new(format!(
                "new replica {} should not be fewer than old replica {}",
                new.replica, old.replica
            )));
        }
        Ok(Vec::new())
    }

    async fn validate_delete(
        &self,
        _ctx: &AdmissionContext,
        old: &Workload,
    ) -> Result<Warnings, HandlerError> {
        if old.replica > 0 {
            return Err(HandlerError::new(
                "number of replica should be less than or equal to 0 to delete",
            ));
        }
        Ok(Vec::new())
    }
}
