//! Flag-driven dispatch across hook invocations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use che_charm::charm::{Action, FlagSet, Installer, dispatch, flags_for_hook};
use che_charm::config::CharmConfig;
use che_charm::host::WorkloadStatus;
use che_charm::service::ServiceEndpoint;
use che_charm::state::{JsonStateStore, MemoryStateStore, StateStore, flags};
use che_charm::testing::{HostCall, MockCheServer, MockRuntime, RecordingHost};

fn config(endpoint: &ServiceEndpoint, charm_dir: &std::path::Path) -> CharmConfig {
    let vars: HashMap<String, String> = [
        ("CHARM_DIR", charm_dir.display().to_string()),
        ("CHE_HOME", charm_dir.join("home").display().to_string()),
        ("CHE_ENDPOINT_HOST", endpoint.host.clone()),
        ("CHE_ENDPOINT_PORT", endpoint.port.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    let mut config = CharmConfig::resolve(&vars, None).unwrap();
    config.poll_interval = Duration::from_millis(10);
    config
}

fn hook_flags(hook: &str, runtime_up: bool) -> FlagSet {
    let flags = FlagSet::new().extend(flags_for_hook(hook));
    if runtime_up {
        flags.with(flags::DOCKER_AVAILABLE)
    } else {
        flags
    }
}

#[tokio::test]
async fn test_waits_for_runtime_then_installs_once() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockCheServer::builder().start().await;
    let runtime = Arc::new(MockRuntime::new("abc123"));
    let host = Arc::new(RecordingHost::new());
    let installer = Installer::new(
        config(&server.endpoint(), dir.path()),
        runtime.clone(),
        host.clone(),
    );
    let state_file = dir.path().join("state.json");

    // install hook fires before the docker layer is ready
    let mut state = JsonStateStore::open(&state_file).unwrap();
    let report = dispatch(&installer, &mut state, &hook_flags("install", false))
        .await
        .unwrap();
    assert_eq!(report.executed, vec![Action::AwaitRuntime]);
    assert!(runtime.calls().is_empty());
    assert_eq!(
        host.last_status(),
        Some((WorkloadStatus::Waiting, "Waiting for Docker".to_string()))
    );

    // runtime comes up on a later hook
    let mut state = JsonStateStore::open(&state_file).unwrap();
    let report = dispatch(&installer, &mut state, &hook_flags("update-status", true))
        .await
        .unwrap();
    assert_eq!(report.executed, vec![Action::Install]);
    assert!(report.install.is_some());
    let calls_after_install = runtime.calls().len();

    // every further hook is a no-op, even without the runtime
    for (hook, up) in [("update-status", true), ("config-changed", true), ("start", false)] {
        let mut state = JsonStateStore::open(&state_file).unwrap();
        let report = dispatch(&installer, &mut state, &hook_flags(hook, up))
            .await
            .unwrap();
        assert!(report.executed.is_empty(), "{} re-ran {:?}", hook, report.executed);
    }
    assert_eq!(runtime.calls().len(), calls_after_install);
    assert_eq!(server.probe_count(), 1);
}

#[tokio::test]
async fn test_editor_relation_in_same_hook_as_install() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockCheServer::builder().start().await;
    let host = Arc::new(RecordingHost::new().with_private_address("10.20.30.40"));
    let installer = Installer::new(
        config(&server.endpoint(), dir.path()),
        Arc::new(MockRuntime::new("abc123")),
        host.clone(),
    );
    let mut state = MemoryStateStore::new();

    let report = dispatch(
        &installer,
        &mut state,
        &hook_flags("editor-relation-joined", true),
    )
    .await
    .unwrap();

    assert_eq!(
        report.executed,
        vec![Action::Install, Action::ConfigureEditorRelation]
    );
    assert_eq!(
        host.calls().last(),
        Some(&HostCall::RelationSet {
            relation: "editor".to_string(),
            settings: vec![
                ("hostname".to_string(), "10.20.30.40".to_string()),
                ("port".to_string(), "8080".to_string()),
            ],
        })
    );
    // editor.available is never persisted
    assert_eq!(state.flags(), vec![flags::CHE_AVAILABLE.to_string()]);
}

#[tokio::test]
async fn test_editor_relation_before_runtime_does_nothing_for_editor() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockCheServer::builder().start().await;
    let host = Arc::new(RecordingHost::new());
    let installer = Installer::new(
        config(&server.endpoint(), dir.path()),
        Arc::new(MockRuntime::new("abc123")),
        host.clone(),
    );
    let mut state = MemoryStateStore::new();

    let report = dispatch(
        &installer,
        &mut state,
        &hook_flags("editor-relation-changed", false),
    )
    .await
    .unwrap();

    assert_eq!(report.executed, vec![Action::AwaitRuntime]);
    assert!(
        !host
            .calls()
            .iter()
            .any(|c| matches!(c, HostCall::RelationSet { .. }))
    );
}

#[tokio::test]
async fn test_installed_unit_answers_editor_relation() {
    let server = MockCheServer::builder().start().await;
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(RecordingHost::new());
    let runtime = Arc::new(MockRuntime::new("abc123"));
    let installer = Installer::new(
        config(&server.endpoint(), dir.path()),
        runtime.clone(),
        host.clone(),
    );
    let mut state = MemoryStateStore::with_flags(&[flags::CHE_AVAILABLE]);

    let report = dispatch(
        &installer,
        &mut state,
        &hook_flags("editor-relation-changed", true),
    )
    .await
    .unwrap();

    assert_eq!(report.executed, vec![Action::ConfigureEditorRelation]);
    assert!(report.install.is_none());
    assert!(runtime.calls().is_empty());
    assert_eq!(server.probe_count(), 0);
}

#[tokio::test]
async fn test_failed_install_leaves_unit_blocked() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockCheServer::builder().start().await;
    let host = Arc::new(RecordingHost::new());
    let installer = Installer::new(
        config(&server.endpoint(), dir.path()),
        Arc::new(MockRuntime::new("abc123").fail_remove()),
        host.clone(),
    );
    let mut state = MemoryStateStore::new();

    let result = dispatch(&installer, &mut state, &hook_flags("install", true)).await;

    assert!(result.is_err());
    let (status, message) = host.last_status().unwrap();
    assert_eq!(status, WorkloadStatus::Blocked);
    assert!(message.starts_with("install failed: "), "{}", message);
    assert!(!state.is_set(flags::CHE_AVAILABLE));
}
