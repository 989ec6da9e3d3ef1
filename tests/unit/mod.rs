// Test code is allowed to panic on failure
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

//! Unit tests for admission-dispatch.
//!
//! These tests exercise the public API of individual components in
//! isolation, without a router or a listener.

#[path = "../common/mod.rs"]
mod common;

mod router_tests {
    use admission_dispatch::router::{default_path, validate_custom_path};
    use admission_dispatch::{ConfigError, ResourceIdentity, WebhookKind, mutate_path, validate_path};

    #[test]
    fn test_default_paths_for_named_group() {
        let identity = ResourceIdentity::new("foo.test.org", "v1", "TestDefaulter", "testdefaulters");
        assert_eq!(mutate_path(&identity), "/mutate-foo-test-org-v1-testdefaulter");
        assert_eq!(validate_path(&identity), "/validate-foo-test-org-v1-testdefaulter");
    }

    #[test]
    fn test_default_paths_for_core_group() {
        let identity = ResourceIdentity::new("", "v1", "Pod", "pods");
        assert_eq!(mutate_path(&identity), "/mutate-v1-pod");
        assert_eq!(
            default_path(WebhookKind::Validating, &identity),
            "/validate-v1-pod"
        );
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(WebhookKind::Mutating.to_string(), "mutating");
        assert_eq!(WebhookKind::Validating.to_string(), "validating");
    }

    #[test]
    fn test_custom_path_shapes() {
        for path in ["/custom-defaulting-path", "/a/b/c", "/v1.2_x~y"] {
            assert!(validate_custom_path(path).is_ok(), "{path}");
        }
        for path in ["", "custom", "/", "/trailing/", "//double", "/with space", "/{capture}"] {
            assert!(
                matches!(validate_custom_path(path), Err(ConfigError::InvalidPath { .. })),
                "{path}"
            );
        }
    }
}

mod codec_tests {
    use admission_dispatch::codec::decode;
    use admission_dispatch::{DecodeError, Decision, EnvelopeVersion, HandlerError, Operation};
    use serde_json::{Value, json};

    use crate::common::{ReviewBuilder, TEST_UID};

    #[test]
    fn test_decode_detects_version() {
        for version in EnvelopeVersion::ALL {
            let body = ReviewBuilder::new(version, "TestValidator")
                .operation(Operation::Update)
                .object(json!({"replica": 2}))
                .old_object(json!({"replica": 1}))
                .dry_run(true)
                .to_bytes();

            let (detected, request) = decode(&body).unwrap();
            assert_eq!(detected, version);
            assert_eq!(request.uid, TEST_UID);
            assert_eq!(request.kind.kind, "TestValidator");
            assert_eq!(request.resource.resource, "testvalidators");
            assert_eq!(request.operation, Operation::Update);
            assert_eq!(request.namespace.as_deref(), Some("default"));
            assert_eq!(request.user_info.username, "system:admin");
            assert_eq!(request.object, Some(json!({"replica": 2})));
            assert_eq!(request.old_object, Some(json!({"replica": 1})));
            assert!(request.dry_run);
        }
    }

    #[test]
    fn test_cross_version_decode_rejected() {
        let body = ReviewBuilder::new(EnvelopeVersion::V1Beta1, "TestValidator")
            .object(json!({}))
            .to_bytes();
        assert!(matches!(
            EnvelopeVersion::V1.decode_review(&body),
            Err(DecodeError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_envelope_kind_rejected() {
        let mut review = ReviewBuilder::new(EnvelopeVersion::V1Beta1, "TestValidator").build();
        review["kind"] = json!("ConversionReview");
        let body = serde_json::to_vec(&review).unwrap();
        assert!(matches!(
            EnvelopeVersion::V1Beta1.decode_review(&body),
            Err(DecodeError::InvalidKind(kind)) if kind == "ConversionReview"
        ));
    }

    #[test]
    fn test_missing_uid_rejected() {
        let mut review = ReviewBuilder::new(EnvelopeVersion::V1, "TestValidator").build();
        review["request"].as_object_mut().unwrap().remove("uid");
        let body = serde_json::to_vec(&review).unwrap();
        assert!(matches!(decode(&body), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_missing_api_version_rejected() {
        let body = br#"{"kind":"AdmissionReview","request":{}}"#;
        assert!(matches!(
            EnvelopeVersion::detect(body),
            Err(DecodeError::UnsupportedVersion(v)) if v.is_empty()
        ));
    }

    #[test]
    fn test_encode_denial_in_each_version() {
        let decision = Decision::from_handler_error(HandlerError::new("nope"), 403);
        for version in EnvelopeVersion::ALL {
            let body: Value =
                serde_json::from_slice(&version.encode_review("abc", &decision).unwrap()).unwrap();
            assert_eq!(
                body,
                json!({
                    "apiVersion": version.api_version(),
                    "kind": "AdmissionReview",
                    "response": {
                        "uid": "abc",
                        "allowed": false,
                        "status": {"code": 403, "message": "nope"}
                    }
                })
            );
        }
    }
}

mod decision_tests {
    use admission_dispatch::{Decision, HandlerError, PatchType};
    use serde_json::json;

    #[test]
    fn test_allow_defaults() {
        let decision = Decision::allow();
        assert!(decision.is_allowed());
        assert_eq!(decision.code(), 200);
        assert!(decision.patch().is_none());
        assert!(decision.patch_type().is_none());
    }

    #[test]
    fn test_patched_sets_type() {
        let patch = json_patch::diff(&json!({"a": 1}), &json!({"a": 2}));
        let decision = Decision::patched(&patch).unwrap();
        assert!(decision.is_allowed());
        assert_eq!(decision.patch_type(), Some(PatchType::JsonPatch));
    }

    #[test]
    fn test_empty_patch_is_plain_allow() {
        let patch = json_patch::diff(&json!({"a": 1}), &json!({"a": 1}));
        assert_eq!(Decision::patched(&patch).unwrap(), Decision::allow());
    }

    #[test]
    fn test_handler_status_wins() {
        let decision = Decision::from_handler_error(HandlerError::with_status(409, "conflict"), 403);
        assert!(!decision.is_allowed());
        assert_eq!(decision.code(), 409);
        assert_eq!(decision.message(), "conflict");
    }
}

mod builder_tests {
    use admission_dispatch::{ConfigError, Scheme, WebhookBuilder, WebhookKind};

    use crate::common::{
        TestCustomDefaulter, TestCustomValidator, TestDefaulter, TestValidator, test_scheme,
    };

    #[test]
    fn test_defaulter_only_binds_mutating_path() {
        let webhook = WebhookBuilder::new()
            .for_type::<TestDefaulter>()
            .with_defaulter(TestCustomDefaulter)
            .complete(&test_scheme())
            .unwrap();

        assert_eq!(webhook.identity().kind, "TestDefaulter");
        assert_eq!(webhook.bindings().len(), 1);
        assert_eq!(
            webhook.path(WebhookKind::Mutating),
            Some("/mutate-foo-test-org-v1-testdefaulter")
        );
        assert_eq!(webhook.path(WebhookKind::Validating), None);
    }

    #[test]
    fn test_custom_path_overrides_default() {
        let webhook = WebhookBuilder::new()
            .for_type::<TestValidator>()
            .with_validator(TestCustomValidator)
            .with_custom_path("/custom-validating-path")
            .complete(&test_scheme())
            .unwrap();
        assert_eq!(
            webhook.path(WebhookKind::Validating),
            Some("/custom-validating-path")
        );
    }

    #[test]
    fn test_two_target_types_rejected() {
        let err = WebhookBuilder::new()
            .for_type::<TestDefaulter>()
            .for_type::<TestValidator>()
            .with_validator(TestCustomValidator)
            .complete(&test_scheme())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::MultipleTargets(targets) if targets.len() == 2));
    }

    #[test]
    fn test_unregistered_type_rejected() {
        let err = WebhookBuilder::new()
            .for_type::<TestDefaulter>()
            .with_defaulter(TestCustomDefaulter)
            .complete(&Scheme::new())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::UnregisteredType(_)));
    }

    #[test]
    fn test_missing_handler_rejected() {
        let err = WebhookBuilder::new()
            .for_type::<TestDefaulter>()
            .complete(&test_scheme())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::MissingHandler(_)));
    }

    #[test]
    fn test_invalid_custom_path_rejected() {
        let err = WebhookBuilder::new()
            .for_type::<TestDefaulter>()
            .with_defaulter(TestCustomDefaulter)
            .with_custom_path("no-leading-slash")
            .complete(&test_scheme())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::InvalidPath { .. }));
    }
}

mod scheme_tests {
    use admission_dispatch::Scheme;
    use admission_dispatch::admission::GroupVersionKind;

    use crate::common::{TestDefaulter, TestValidator};

    #[test]
    fn test_registration_covers_list_kind() {
        let mut scheme = Scheme::new();
        scheme.register::<TestDefaulter>().unwrap();

        let list = GroupVersionKind {
            group: "foo.test.org".into(),
            version: "v1".into(),
            kind: "TestDefaulterList".into(),
        };
        assert!(scheme.recognizes::<TestDefaulter>());
        assert!(scheme.recognizes_kind(&list));
        assert!(!scheme.recognizes::<TestValidator>());
    }

    #[test]
    fn test_repeat_registration_is_idempotent() {
        let mut scheme = Scheme::new();
        scheme.register::<TestValidator>().unwrap();
        assert!(scheme.register::<TestValidator>().is_ok());
    }
}

mod policy_tests {
    use admission_dispatch::policies::{
        MIN_REPLICAS, MonotonicReplicaValidator, ReplicaDefaulter, Workload,
    };
    use admission_dispatch::{Scheme, WebhookBuilder, WebhookKind};

    #[test]
    fn test_builtin_policies_register() {
        let mut scheme = Scheme::new();
        scheme.register::<Workload>().unwrap();

        let webhook = WebhookBuilder::new()
            .for_type::<Workload>()
            .with_defaulter(ReplicaDefaulter)
            .with_validator(MonotonicReplicaValidator)
            .complete(&scheme)
            .unwrap();

        assert_eq!(
            webhook.path(WebhookKind::Mutating),
            Some("/mutate-demo-admission-io-v1-workload")
        );
        assert_eq!(
            webhook.path(WebhookKind::Validating),
            Some("/validate-demo-admission-io-v1-workload")
        );
        assert_eq!(MIN_REPLICAS, 2);
    }
}

mod path_collision_tests {
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    use admission_dispatch::{
        AdmissionContext, AdmissionObject, ConfigError, Defaulter, HandlerError,
        ResourceIdentity, Scheme, WebhookBuilder, WebhookServer,
    };

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct DashedIssuer {}

    impl AdmissionObject for DashedIssuer {
        fn identity() -> ResourceIdentity {
            ResourceIdentity::new("cert-manager.io", "v1", "Issuer", "issuers")
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct DottedIssuer {}

    impl AdmissionObject for DottedIssuer {
        fn identity() -> ResourceIdentity {
            ResourceIdentity::new("cert.manager.io", "v1", "Issuer", "issuers")
        }
    }

    struct Unchanged;

    #[async_trait]
    impl<T: Send> Defaulter<T> for Unchanged {
        async fn default(&self, _ctx: &AdmissionContext, _obj: &mut T) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn test_colliding_default_paths_rejected() {
        let mut scheme = Scheme::new();
        scheme
            .register::<DashedIssuer>()
            .unwrap()
            .register::<DottedIssuer>()
            .unwrap();

        let mut server = WebhookServer::new();
        server
            .register(
                WebhookBuilder::new()
                    .for_type::<DashedIssuer>()
                    .with_defaulter(Unchanged)
                    .complete(&scheme)
                    .unwrap(),
            )
            .unwrap();

        let err = server
            .register(
                WebhookBuilder::new()
                    .for_type::<DottedIssuer>()
                    .with_defaulter(Unchanged)
                    .complete(&scheme)
                    .unwrap(),
            )
            .err()
            .unwrap();
        assert_eq!(
            err,
            ConfigError::DuplicatePath("/mutate-cert-manager-io-v1-issuer".to_string())
        );
        assert_eq!(server.paths().count(), 1);
    }
}
