//! AdmissionReview wire codec.
//!
//! Two envelope schemas are supported, selected only by the `apiVersion`
//! tag of the envelope:
//! - `admission.k8s.io/v1`: envelope `kind` is required
//! - `admission.k8s.io/v1beta1`: envelope `kind` may be omitted by legacy clients
//!
//! Both require `request.uid`, `request.kind`, `request.resource` and
//! `request.operation`. Responses are always written in the version the
//! request declared.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::admission::{
    AdmissionRequest, Decision, GroupVersionKind, GroupVersionResource, Operation, PatchType,
    UserInfo,
};
use crate::error::DecodeError;

/// Envelope kind for both request and response
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

/// Supported envelope schema versions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvelopeVersion {
    V1,
    V1Beta1,
}

impl EnvelopeVersion {
    pub const ALL: [EnvelopeVersion; 2] = [EnvelopeVersion::V1, EnvelopeVersion::V1Beta1];

    pub fn api_version(self) -> &'static str {
        match self {
            EnvelopeVersion::V1 => "admission.k8s.io/v1",
            EnvelopeVersion::V1Beta1 => "admission.k8s.io/v1beta1",
        }
    }

    pub fn from_api_version(api_version: &str) -> Result<Self, DecodeError> {
        Self::ALL
            .into_iter()
            .find(|v| v.api_version() == api_version)
            .ok_or_else(|| DecodeError::UnsupportedVersion(api_version.to_string()))
    }

    /// Read the declared version from the envelope header only
    pub fn detect(body: &[u8]) -> Result<Self, DecodeError> {
        if body.is_empty() {
            return Err(DecodeError::EmptyBody);
        }
        let header: TypeHeader = serde_json::from_slice(body)?;
        match header.api_version {
            Some(api_version) => Self::from_api_version(&api_version),
            None => Err(DecodeError::UnsupportedVersion(String::new())),
        }
    }

    /// Decode `body` with this version's schema.
    ///
    /// A body declaring another version is rejected rather than decoded
    /// with the wrong field mapping.
    pub fn decode_review(self, body: &[u8]) -> Result<AdmissionRequest, DecodeError> {
        if body.is_empty() {
            return Err(DecodeError::EmptyBody);
        }
        let request = match self {
            EnvelopeVersion::V1 => {
                let review: v1::AdmissionReview = serde_json::from_slice(body)?;
                self.check_api_version(&review.api_version)?;
                if review.kind != ADMISSION_REVIEW_KIND {
                    return Err(DecodeError::InvalidKind(review.kind));
                }
                review.request
            }
            EnvelopeVersion::V1Beta1 => {
                let review: v1beta1::AdmissionReview = serde_json::from_slice(body)?;
                self.check_api_version(&review.api_version)?;
                if let Some(kind) = review.kind
                    && kind != ADMISSION_REVIEW_KIND
                {
                    return Err(DecodeError::InvalidKind(kind));
                }
                review.request
            }
        };
        request.into_request()
    }

    /// Encode `decision` as a response review in this version
    pub fn encode_review(self, uid: &str, decision: &Decision) -> Result<Vec<u8>, serde_json::Error> {
        let review = ResponseReview {
            api_version: self.api_version(),
            kind: ADMISSION_REVIEW_KIND,
            response: WireResponse {
                uid,
                allowed: decision.is_allowed(),
                status: WireStatus {
                    code: decision.code(),
                    message: decision.message(),
                },
                patch: decision.patch().map(|p| STANDARD.encode(p)),
                patch_type: decision.patch_type(),
                warnings: decision.warnings(),
            },
        };
        serde_json::to_vec(&review)
    }

    fn check_api_version(self, found: &str) -> Result<(), DecodeError> {
        if found == self.api_version() {
            Ok(())
        } else {
            Err(DecodeError::VersionMismatch {
                expected: self.api_version(),
                found: found.to_string(),
            })
        }
    }
}

/// Detect the declared version and decode the request with it
pub fn decode(body: &[u8]) -> Result<(EnvelopeVersion, AdmissionRequest), DecodeError> {
    let version = EnvelopeVersion::detect(body)?;
    let request = version.decode_review(body)?;
    Ok((version, request))
}

/// Best-effort read of `request.uid` from a body that failed to decode
pub fn peek_uid(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct UidOnly {
        request: UidRequest,
    }

    #[derive(Deserialize)]
    struct UidRequest {
        uid: String,
    }

    serde_json::from_slice::<UidOnly>(body)
        .ok()
        .map(|review| review.request.uid)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeHeader {
    #[serde(default)]
    api_version: Option<String>,
}

mod v1 {
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct AdmissionReview {
        pub api_version: String,
        pub kind: String,
        pub request: super::WireRequest,
    }
}

mod v1beta1 {
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct AdmissionReview {
        pub api_version: String,
        #[serde(default)]
        pub kind: Option<String>,
        pub request: super::WireRequest,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    uid: String,
    kind: GroupVersionKind,
    resource: GroupVersionResource,
    #[serde(default)]
    sub_resource: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    name: Option<String>,
    operation: String,
    #[serde(default)]
    user_info: Option<UserInfo>,
    #[serde(default)]
    object: Option<Value>,
    #[serde(default)]
    old_object: Option<Value>,
    #[serde(default)]
    dry_run: Option<bool>,
}

impl WireRequest {
    fn into_request(self) -> Result<AdmissionRequest, DecodeError> {
        let operation: Operation = self.operation.parse()?;
        Ok(AdmissionRequest {
            uid: self.uid,
            kind: self.kind,
            resource: self.resource,
            sub_resource: non_empty(self.sub_resource),
            namespace: non_empty(self.namespace),
            name: non_empty(self.name),
            operation,
            user_info: self.user_info.unwrap_or_default(),
            object: self.object.filter(|v| !v.is_null()),
            old_object: self.old_object.filter(|v| !v.is_null()),
            dry_run: self.dry_run.unwrap_or(false),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponseReview<'a> {
    api_version: &'static str,
    kind: &'static str,
    response: WireResponse<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse<'a> {
    uid: &'a str,
    allowed: bool,
    status: WireStatus<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    patch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    patch_type: Option<PatchType>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    warnings: &'a [String],
}

#[derive(Serialize)]
struct WireStatus<'a> {
    code: u16,
    #[serde(skip_serializing_if = "str::is_empty")]
    message: &'a str,
}
