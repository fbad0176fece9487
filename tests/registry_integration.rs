//! Registry integration tests — drives the public API against the in-memory
//! framework and checks handle accounting end to end.

use app_registry::native::{AppEntry, ErrorCode, MemoryFramework, SharedFramework};
use app_registry::{AppFilter, AppManager, Error, FilterKey, MetadataFilter};
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;
use std::sync::Arc;

/// Helper: a framework with a small device image installed.
fn device() -> (Arc<MemoryFramework>, AppManager) {
    let memory = Arc::new(MemoryFramework::with_apps([
        AppEntry::new("org.example.clock")
            .with_label("Clock")
            .with_category("http://tizen.org/category/homeapp"),
        AppEntry::new("org.example.settings")
            .with_label("Settings")
            .with_metadata("http://tizen.org/metadata/prefer_dotnet_aot", "true"),
        AppEntry::new("org.example.indicator")
            .with_type("svcapp")
            .with_no_display(true)
            .with_task_manage(false),
    ]));
    let shared: SharedFramework = memory.clone();
    (memory, AppManager::new(shared))
}

fn ids(records: &[app_registry::ApplicationInfo]) -> Vec<String> {
    records.iter().map(|r| r.app_id().to_string()).collect()
}

#[tokio::test]
async fn test_filtered_enumeration_by_type_and_flags() {
    let (memory, manager) = device();

    let filter = AppFilter::new()
        .with(FilterKey::Type, "capp")
        .with(FilterKey::TaskManage, "true");
    let records = manager.list_installed_filtered(&filter).await.unwrap();

    assert_eq!(ids(&records), vec!["org.example.clock", "org.example.settings"]);
    assert_eq!(memory.live_handles().filters, 0);
}

#[tokio::test]
async fn test_metadata_enumeration() {
    let (memory, manager) = device();

    let filter = MetadataFilter::new().with("http://tizen.org/metadata/prefer_dotnet_aot", "");
    let records = manager.list_installed_by_metadata(&filter).await.unwrap();

    assert_eq!(ids(&records), vec!["org.example.settings"]);
    assert_eq!(memory.live_handles().metadata_filters, 0);
}

#[tokio::test]
async fn test_clone_failure_is_not_fatal() {
    let (memory, manager) = device();
    memory.fail_clone_of("org.example.settings");

    let records = manager.list_installed().await.unwrap();

    assert_eq!(ids(&records), vec!["org.example.clock", "org.example.indicator"]);
}

#[tokio::test]
async fn test_enumeration_failure_carries_native_code() {
    let (memory, manager) = device();
    memory.fail_enumeration(1, ErrorCode::PermissionDenied);

    match manager.list_installed().await {
        Err(Error::OperationFailed { code, message }) => {
            assert_eq!(code, ErrorCode::PermissionDenied);
            assert!(message.contains("installed applications"));
        }
        other => panic!("expected OperationFailed, got {other:?}"),
    }
    assert_eq!(memory.live_handles().total(), 0);
}

#[tokio::test]
async fn test_lookup_and_snapshot() {
    let (_memory, manager) = device();

    let clock = manager.get_installed("org.example.clock").unwrap();
    let snapshot = clock.snapshot().unwrap();
    assert_eq!(snapshot.label, "Clock");
    assert_eq!(snapshot.categories, vec!["http://tizen.org/category/homeapp"]);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["app_id"], "org.example.clock");

    let err = manager.get_installed("org.example.nope").unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(err.native_code(), Some(ErrorCode::NoSuchApp));
}

#[tokio::test]
async fn test_running_enumeration_skips_unknown_processes() {
    let (memory, manager) = device();
    memory.launch("org.example.clock");
    memory.launch("org.example.sideloaded");
    memory.launch_service("org.example.indicator");

    assert_eq!(ids(&manager.list_running().await.unwrap()), vec!["org.example.clock"]);
    assert_eq!(
        ids(&manager.list_all_running().await.unwrap()),
        vec!["org.example.clock", "org.example.indicator"]
    );

    let contexts = manager.list_all_running_contexts().await.unwrap();
    assert_eq!(contexts.len(), 3);
    drop(contexts);
    assert_eq!(memory.live_handles().total(), 0);
}

#[test]
fn test_event_monitor_reference_counting() {
    let (memory, mut manager) = device();

    let first = manager.on_launched(|_| {}).unwrap();
    let second = manager.on_launched(|_| {}).unwrap();
    let third = manager.on_terminated(|_| {}).unwrap();

    for token in [&first, &second, &third] {
        assert!(manager.unsubscribe(token));
    }

    let stats = memory.stats();
    assert_eq!(stats.monitor_creates, 1);
    assert_eq!(stats.monitor_destroys, 1);
    assert_eq!(memory.registered_callbacks(), 0);
}

#[test]
fn test_launch_and_terminate_are_delivered() {
    let (memory, mut manager) = device();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let launched = Arc::clone(&seen);
    manager
        .on_launched(move |args| {
            let label = args.application.label().unwrap();
            launched.lock().push(format!("launched {label}"));
        })
        .unwrap();
    let terminated = Arc::clone(&seen);
    manager
        .on_terminated(move |args| {
            terminated
                .lock()
                .push(format!("terminated {}", args.application.app_id()));
        })
        .unwrap();

    memory.launch("org.example.clock");
    memory.terminate("org.example.clock");

    assert_eq!(
        *seen.lock(),
        vec!["launched Clock", "terminated org.example.clock"]
    );
}

#[test]
fn test_panicking_handler_is_isolated() {
    let (memory, mut manager) = device();
    let delivered = Arc::new(AtomicUsize::new(0));

    manager
        .on_launched(|_| panic!("listener bug"))
        .unwrap();
    let counter = Arc::clone(&delivered);
    manager
        .on_launched(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    memory.launch("org.example.clock");
    memory.launch("org.example.settings");

    assert_eq!(delivered.load(Ordering::SeqCst), 2);
}

#[test]
fn test_enable_disable_events() {
    let (memory, mut manager) = device();
    let enabled = Arc::new(AtomicUsize::new(0));
    let disabled = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&enabled);
    let enabled_token = manager
        .on_enabled(move |args| {
            assert_eq!(args.app_id.as_str(), "org.example.clock");
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    let counter = Arc::clone(&disabled);
    manager
        .on_disabled(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    memory.set_enabled("org.example.clock", false);
    memory.set_enabled("org.example.clock", true);
    assert_eq!(enabled.load(Ordering::SeqCst), 2);
    assert_eq!(disabled.load(Ordering::SeqCst), 2);

    // The other member of the pair keeps the monitor alive.
    manager.unsubscribe(&enabled_token);
    assert!(manager.events().is_status_monitor_active());
    memory.set_enabled("org.example.clock", true);
    assert_eq!(enabled.load(Ordering::SeqCst), 2);
}
