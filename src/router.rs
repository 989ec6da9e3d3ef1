//! Webhook path derivation.
//!
//! Default paths are a pure function of the resource identity:
//! `/mutate-<group>-<version>-<kind>` and `/validate-<group>-<version>-<kind>`,
//! lower-cased, with dots in the group replaced by dashes. The core group
//! (empty) contributes no segment.
//!
//! The mapping is not injective. Groups that differ only in '.' versus '-'
//! (`cert-manager.io` and `cert.manager.io`) and kinds that differ only in
//! case share a path. `WebhookServer::register` rejects the second such
//! webhook with `ConfigError::DuplicatePath`.

use std::fmt;

use regex::Regex;

use crate::admission::ResourceIdentity;
use crate::error::ConfigError;

/// Prefix of derived defaulting paths
pub const MUTATE_PATH_PREFIX: &str = "/mutate-";
/// Prefix of derived validating paths
pub const VALIDATE_PATH_PREFIX: &str = "/validate-";

/// Allowed custom path shape: absolute, non-empty segments of URL-safe
/// characters, no trailing slash and no route captures.
const CUSTOM_PATH_PATTERN: &str = r"^(/[A-Za-z0-9._~-]+)+$";

/// Which pipeline a path serves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WebhookKind {
    Mutating,
    Validating,
}

impl fmt::Display for WebhookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebhookKind::Mutating => write!(f, "mutating"),
            WebhookKind::Validating => write!(f, "validating"),
        }
    }
}

/// Default defaulting path for `identity`
pub fn mutate_path(identity: &ResourceIdentity) -> String {
    derive_path(MUTATE_PATH_PREFIX, identity)
}

/// Default validating path for `identity`
pub fn validate_path(identity: &ResourceIdentity) -> String {
    derive_path(VALIDATE_PATH_PREFIX, identity)
}

/// Default path of the given kind for `identity`
pub fn default_path(kind: WebhookKind, identity: &ResourceIdentity) -> String {
    match kind {
        WebhookKind::Mutating => mutate_path(identity),
        WebhookKind::Validating => validate_path(identity),
    }
}

fn derive_path(prefix: &str, identity: &ResourceIdentity) -> String {
    let group = identity.group.replace('.', "-");
    let segments: Vec<&str> = [group.as_str(), &identity.version, &identity.kind]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    format!("{}{}", prefix, segments.join("-")).to_lowercase()
}

/// Check that a custom path is usable as a route
pub fn validate_custom_path(path: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }

    let pattern = Regex::new(CUSTOM_PATH_PATTERN).map_err(|e| invalid(&e.to_string()))?;
    if !pattern.is_match(path) {
        return Err(invalid(
            "segments must be non-empty and contain only letters, digits, '.', '_', '~' or '-'",
        ));
    }
    Ok(())
}
