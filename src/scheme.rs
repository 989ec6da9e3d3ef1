//! Type registry for admitted resources.
//!
//! A [`Scheme`] is filled once at startup and only read afterwards. Every
//! registered kind also registers its `<Kind>List` companion, mirroring how
//! the control plane serves collections.

use std::any::{TypeId, type_name};
use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::admission::{GroupVersionKind, ResourceIdentity};
use crate::error::ConfigError;

/// A resource type that can be admitted.
///
/// Implementors round-trip through serde; the serialized form is what the
/// defaulting pipeline diffs.
pub trait AdmissionObject: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identity of the type. Must be constant for a given type.
    fn identity() -> ResourceIdentity;
}

#[derive(Clone, Debug)]
struct Registration {
    identity: ResourceIdentity,
    type_id: TypeId,
    type_name: &'static str,
}

/// Read-only catalog of admitted types
#[derive(Clone, Debug, Default)]
pub struct Scheme {
    kinds: HashMap<GroupVersionKind, Registration>,
}

impl Scheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` and its list companion.
    ///
    /// Registering the same type twice is a no-op; registering a different
    /// type under an existing kind is an error.
    pub fn register<T: AdmissionObject>(&mut self) -> Result<&mut Self, ConfigError> {
        let identity = T::identity();
        let list = GroupVersionKind {
            kind: identity.list_kind(),
            ..identity.gvk()
        };

        let kinds = [identity.gvk(), list];
        for gvk in &kinds {
            if let Some(existing) = self.kinds.get(gvk)
                && existing.type_id != TypeId::of::<T>()
            {
                return Err(ConfigError::ConflictingType {
                    kind: gvk.to_string(),
                    existing: existing.type_name.to_string(),
                });
            }
        }
        for gvk in kinds {
            self.kinds.insert(
                gvk,
                Registration {
                    identity: identity.clone(),
                    type_id: TypeId::of::<T>(),
                    type_name: type_name::<T>(),
                },
            );
        }
        Ok(self)
    }

    /// Whether `T` is registered under its own identity
    pub fn recognizes<T: AdmissionObject>(&self) -> bool {
        self.kinds
            .get(&T::identity().gvk())
            .is_some_and(|r| r.type_id == TypeId::of::<T>())
    }

    /// Whether a kind (or list kind) is known
    pub fn recognizes_kind(&self, gvk: &GroupVersionKind) -> bool {
        self.kinds.contains_key(gvk)
    }

    /// Identity of the type registered for `gvk`. List kinds resolve to
    /// their item type.
    pub fn identity_for(&self, gvk: &GroupVersionKind) -> Option<&ResourceIdentity> {
        self.kinds.get(gvk).map(|r| &r.identity)
    }
}
