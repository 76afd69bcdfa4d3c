//! Configuration and seed loading from disk

use std::io::Write;
use std::time::Duration;
use tempfile::{Builder, NamedTempFile};
use warden_authz::engine::OverflowPolicy;
use warden_authz::seed::SeedDocument;
use warden_authz::{AuthzError, DecisionReason, DecisionRequest, PermissionResolver, WardenConfig};

fn write_temp(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const SEED_TOML: &str = r#"
roles = ["viewer", "editor", "manager"]
actions = ["read", "view"]

[[edges]]
parent = "viewer"
child = "editor"

[[resources]]
name = "doc"

[[resources]]
name = "salary"
attributes = [{ key = "department", value = "HR" }]

[[users]]
id = 1
roles = ["editor"]

[[users]]
id = 2
roles = ["manager"]
attributes = [{ key = "department", value = "IT" }]

[[users]]
id = 3
roles = ["manager"]
attributes = [{ key = "department", value = "HR" }]

[[simple_grants]]
role = "viewer"
resource = "doc"
action = "read"

[[extended_grants]]
role = "manager"
resource = "salary"
action = "view"
priority = 1
conditions = [
    { scope = "user", key = "department", op = "==", value = { scope = "resource", key = "department" } },
]
"#;

const SEED_JSON: &str = r#"{
    "roles": ["operator"],
    "actions": ["restart"],
    "resources": [
        { "name": "cluster" },
        { "name": "cluster.node", "parent": "cluster" }
    ],
    "users": [
        { "id": 10, "roles": ["operator"], "attributes": [{ "key": "on_call", "value": "true", "type": "boolean" }] }
    ],
    "extended_grants": [
        {
            "role": "operator",
            "resource": "cluster.node",
            "action": "restart",
            "priority": 3,
            "conditions": [
                { "scope": "user", "key": "on_call", "comparator": "eq", "value": true }
            ]
        }
    ]
}"#;

// ============================================================================
// CONFIGURATION FILES
// ============================================================================

#[test]
fn test_load_config_file() {
    let file = write_temp(
        ".toml",
        r#"
[engine]
decision_timeout_ms = 250
inherit_resource_grants = true
latency_window = 500

[audit]
capacity = 64
overflow = "drop-newest"

[logging]
level = "warden=debug"
"#,
    );

    let config = WardenConfig::from_file(file.path()).unwrap();
    config.validate().unwrap();

    let engine = config.engine_config();
    assert_eq!(engine.decision_timeout, Some(Duration::from_millis(250)));
    assert!(engine.inherit_resource_grants);
    assert!(engine.enable_metrics);
    assert_eq!(engine.latency_window, 500);

    let audit = config.audit_config();
    assert_eq!(audit.capacity, 64);
    assert_eq!(audit.batch_size, 256);
    assert_eq!(audit.overflow, OverflowPolicy::DropNewest);
    assert_eq!(config.logging.level, "warden=debug");
}

#[test]
fn test_missing_config_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = WardenConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, AuthzError::Io(_)));
}

#[test]
fn test_unknown_overflow_policy_is_rejected() {
    let file = write_temp(".toml", "[audit]\noverflow = \"block\"\n");
    let err = WardenConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, AuthzError::Config(_)));
}

#[test]
fn test_zero_latency_window_is_rejected() {
    let file = write_temp(".toml", "[engine]\nlatency_window = 0\n");
    let config = WardenConfig::from_file(file.path()).unwrap();
    assert!(matches!(config.validate(), Err(AuthzError::Config(_))));
}

#[tokio::test]
async fn test_latency_window_bounds_resolver_samples() {
    let config = WardenConfig::from_toml_str("[engine]\nlatency_window = 3\n").unwrap();
    let resolver = PermissionResolver::in_memory(config.engine_config(), config.audit_config());

    for _ in 0..10 {
        resolver.decide(&DecisionRequest::new(1, "doc", "read")).await.unwrap();
    }

    let metrics = resolver.get_metrics().unwrap();
    assert_eq!(metrics.total_decisions, 10);
    assert_eq!(metrics.latency_samples, 3);
}

#[test]
fn test_config_round_trips_through_toml() {
    let mut config = WardenConfig::default();
    config.engine.decision_timeout_ms = 0;
    config.seed.path = Some("seed.toml".into());

    let rendered = toml::to_string_pretty(&config).unwrap();
    let parsed = WardenConfig::from_toml_str(&rendered).unwrap();
    assert_eq!(parsed, config);
    assert_eq!(parsed.engine_config().decision_timeout, None);
}

// ============================================================================
// SEED FILES
// ============================================================================

#[tokio::test]
async fn test_toml_seed_file_drives_decisions() {
    let file = write_temp(".toml", SEED_TOML);
    let seed = SeedDocument::from_file(file.path()).unwrap();

    let resolver = PermissionResolver::in_memory(Default::default(), Default::default());
    let summary = seed.apply(&resolver, 0).await.unwrap();
    assert_eq!(summary.users, 3);
    assert_eq!(summary.grants, 2);

    let editor = resolver
        .decide(&DecisionRequest::new(1, "doc", "read"))
        .await
        .unwrap();
    assert_eq!(editor.outcome(), (true, DecisionReason::SimpleGrantMatch));

    let it_manager = resolver
        .decide(&DecisionRequest::new(2, "salary", "view"))
        .await
        .unwrap();
    assert_eq!(it_manager.outcome(), (false, DecisionReason::NoMatchingGrant));

    let hr_manager = resolver
        .decide(&DecisionRequest::new(3, "salary", "view"))
        .await
        .unwrap();
    assert_eq!(hr_manager.outcome(), (true, DecisionReason::ExtendedGrantPriority(1)));
}

#[tokio::test]
async fn test_json_seed_file_is_detected_by_extension() {
    let file = write_temp(".json", SEED_JSON);
    let seed = SeedDocument::from_file(file.path()).unwrap();
    assert_eq!(seed.resources[1].parent.as_deref(), Some("cluster"));

    let resolver = PermissionResolver::in_memory(Default::default(), Default::default());
    seed.apply(&resolver, 0).await.unwrap();

    let decision = resolver
        .decide(&DecisionRequest::new(10, "cluster.node", "restart"))
        .await
        .unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.reason.code(), "extended-grant-priority-3");
}

#[tokio::test]
async fn test_seed_with_unknown_role_fails() {
    let file = write_temp(
        ".toml",
        "roles = [\"viewer\"]\n\n[[users]]\nid = 1\nroles = [\"ghost\"]\n",
    );
    let seed = SeedDocument::from_file(file.path()).unwrap();

    let resolver = PermissionResolver::in_memory(Default::default(), Default::default());
    let err = seed.apply(&resolver, 0).await.unwrap_err();
    assert!(matches!(err, AuthzError::NotFound(_)));
}

#[test]
fn test_malformed_json_seed_is_config_error() {
    let file = write_temp(".json", "{ \"roles\": [");
    let err = SeedDocument::from_file(file.path()).unwrap_err();
    assert!(matches!(err, AuthzError::Config(_)));
}
