//! Built-in admission policies for the `Workload` resource.
//!
//! - [`replicas::ReplicaDefaulter`]: raises `replica` to [`MIN_REPLICAS`]
//! - [`replicas::MonotonicReplicaValidator`]: rejects negative counts and
//!   scale-downs, and only allows deleting a workload scaled to zero

pub mod replicas;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::admission::ResourceIdentity;
use crate::scheme::AdmissionObject;

pub use replicas::{MonotonicReplicaValidator, ReplicaDefaulter};

/// API group of the built-in workload type
pub const WORKLOAD_GROUP: &str = "demo.admission.io";

/// Replica count the defaulter raises workloads to
pub const MIN_REPLICAS: i32 = 2;

/// A replicated workload.
///
/// Only `replica` is interpreted; every other field is carried through
/// untouched so defaulting never produces patches for it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    #[serde(default)]
    pub replica: i32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Workload {
    pub fn with_replicas(replica: i32) -> Self {
        Self {
            replica,
            extra: Map::new(),
        }
    }
}

impl AdmissionObject for Workload {
    fn identity() -> ResourceIdentity {
        ResourceIdentity::new(WORKLOAD_GROUP, "v1", "Workload", "workloads")
    }
}
