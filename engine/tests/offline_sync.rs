//! Scenario tests for the offline sync manager.
//!
//! All tests run on a paused clock, so timer ticks are driven by
//! `tokio::time::sleep` instead of wall time.

use async_trait::async_trait;
use cardsales_sync::{
    payload_from_value, ChannelNotifier, Connectivity, DurableStorage, Level, MemoryStorage,
    Notification, OperationKind, Payload, PendingOperation, RecordId, RemoteError, RemoteResult,
    RemoteStore, SyncConfig, SyncManager,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const KEY: &str = "cardsales_pending_operations";

/// A remote call as seen by the mock store.
#[derive(Debug, Clone, PartialEq)]
struct Call {
    kind: OperationKind,
    collection: String,
    data: Payload,
    id: Option<RecordId>,
}

/// Remote store that fails for selected `name` values and can be slowed
/// down.
#[derive(Default)]
struct MockStore {
    calls: Mutex<Vec<Call>>,
    failing_names: Mutex<HashSet<String>>,
    fail_all: Mutex<bool>,
    latency: Mutex<Option<Duration>>,
}

impl MockStore {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn fail_name(&self, name: &str) {
        self.failing_names.lock().unwrap().insert(name.to_string());
    }

    fn set_fail_all(&self, fail: bool) {
        *self.fail_all.lock().unwrap() = fail;
    }

    fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    async fn record(&self, call: Call) -> RemoteResult<Value> {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let name = call
            .data
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let fail = *self.fail_all.lock().unwrap() || self.failing_names.lock().unwrap().contains(&name);

        let mut record = call.data.clone();
        self.calls.lock().unwrap().push(call);

        if fail {
            return Err(RemoteError::Status {
                status: 500,
                message: "Database error".into(),
            });
        }
        record.insert("id".into(), json!(101));
        Ok(Value::Object(record))
    }
}

#[async_trait]
impl RemoteStore for MockStore {
    async fn insert(&self, collection: &str, data: &Payload) -> RemoteResult<Value> {
        self.record(Call {
            kind: OperationKind::Insert,
            collection: collection.to_string(),
            data: data.clone(),
            id: None,
        })
        .await
    }

    async fn update(&self, collection: &str, id: &RecordId, data: &Payload) -> RemoteResult<Value> {
        self.record(Call {
            kind: OperationKind::Update,
            collection: collection.to_string(),
            data: data.clone(),
            id: Some(id.clone()),
        })
        .await
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> RemoteResult<()> {
        self.record(Call {
            kind: OperationKind::Delete,
            collection: collection.to_string(),
            data: Payload::new(),
            id: Some(id.clone()),
        })
        .await
        .map(|_| ())
    }

    async fn select(&self, _collection: &str, _filter: &Payload) -> RemoteResult<Vec<Value>> {
        Ok(vec![])
    }
}

struct Harness {
    manager: SyncManager,
    remote: Arc<MockStore>,
    storage: Arc<MemoryStorage>,
    connectivity: Connectivity,
    notifications: UnboundedReceiver<Notification>,
}

impl Harness {
    fn new(online: bool) -> Self {
        Self::with_storage(online, Arc::new(MemoryStorage::new()))
    }

    fn with_storage(online: bool, storage: Arc<MemoryStorage>) -> Self {
        let remote = Arc::new(MockStore::default());
        let connectivity = Connectivity::new(online);
        let (notifier, notifications) = ChannelNotifier::new();
        let manager = SyncManager::new(
            SyncConfig::default(),
            storage.clone(),
            remote.clone(),
            Arc::new(notifier),
            connectivity.clone(),
        );

        Self {
            manager,
            remote,
            storage,
            connectivity,
            notifications,
        }
    }

    fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            out.push(n);
        }
        out
    }
}

fn customer(name: &str) -> Payload {
    payload_from_value(json!({ "name": name }))
}

/// Let spawned tasks run without crossing a timer tick.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn queue_survives_manager_rebuild() {
    let storage = Arc::new(MemoryStorage::new());
    let first = Harness::with_storage(false, storage.clone());

    first
        .manager
        .queue_operation("customers", OperationKind::Insert, customer("A"), None)
        .unwrap();
    first
        .manager
        .queue_operation("customers", OperationKind::Update, customer("B"), Some(7.into()))
        .unwrap();
    first
        .manager
        .queue_operation("credit_cards", OperationKind::Delete, Payload::new(), Some("card-9".into()))
        .unwrap();
    let before = first.manager.pending_operations();
    first.manager.cleanup();

    let second = Harness::with_storage(false, storage);
    assert_eq!(second.manager.pending_operations(), before);
    assert_eq!(
        before,
        vec![
            PendingOperation::insert("customers", customer("A")),
            PendingOperation::update("customers", 7, customer("B")),
            PendingOperation::delete("credit_cards", "card-9"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn offline_insert_replays_once_when_back_online() {
    let mut h = Harness::new(false);

    h.manager
        .queue_operation("customers", OperationKind::Insert, customer("A"), None)
        .unwrap();
    assert_eq!(h.manager.pending_operations_count(), 1);
    settle().await;
    assert_eq!(h.remote.call_count(), 0);

    h.connectivity.set_online(true);
    settle().await;

    assert_eq!(
        h.remote.calls(),
        vec![Call {
            kind: OperationKind::Insert,
            collection: "customers".into(),
            data: customer("A"),
            id: None,
        }]
    );
    assert_eq!(h.manager.pending_operations_count(), 0);

    let levels: Vec<Level> = h.drain_notifications().iter().map(|n| n.level).collect();
    assert_eq!(levels, vec![Level::Warning, Level::Info, Level::Success]);
}

#[tokio::test(start_paused = true)]
async fn partial_failure_keeps_only_failed_operation() {
    let h = Harness::new(true);
    h.remote.fail_name("B");

    h.manager
        .queue_operation("customers", OperationKind::Insert, customer("A"), None)
        .unwrap();
    h.manager
        .queue_operation("customers", OperationKind::Insert, customer("B"), None)
        .unwrap();
    settle().await;

    assert_eq!(h.remote.call_count(), 2);
    assert_eq!(h.manager.pending_operations_count(), 1);
    assert_eq!(
        h.manager.pending_operations(),
        vec![PendingOperation::insert("customers", customer("B"))]
    );

    // What is left on disk matches what is left in memory.
    let stored: Vec<PendingOperation> =
        serde_json::from_str(&h.storage.get(KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored, h.manager.pending_operations());
}

#[tokio::test(start_paused = true)]
async fn perform_operation_falls_back_to_queue_on_remote_failure() {
    let h = Harness::new(true);
    h.remote.set_fail_all(true);

    let result = h
        .manager
        .perform_operation("customers", OperationKind::Insert, customer("A"), None)
        .await
        .unwrap();

    assert_eq!(result, None);
    assert_eq!(h.manager.pending_operations_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn perform_operation_success_bypasses_queue() {
    let h = Harness::new(true);

    let result = h
        .manager
        .perform_operation("customers", OperationKind::Insert, customer("A"), None)
        .await
        .unwrap();

    assert_eq!(result, Some(json!({"name": "A", "id": 101})));
    assert_eq!(h.manager.pending_operations_count(), 0);
    assert_eq!(h.storage.get(KEY).unwrap(), None);

    let deleted = h
        .manager
        .perform_operation("customers", OperationKind::Delete, Payload::new(), Some(101.into()))
        .await
        .unwrap();
    assert_eq!(deleted, Some(json!({"id": 101})));
}

#[tokio::test(start_paused = true)]
async fn perform_operation_offline_makes_no_remote_call() {
    let h = Harness::new(false);

    let result = h
        .manager
        .perform_operation("customers", OperationKind::Insert, customer("A"), None)
        .await
        .unwrap();

    assert_eq!(result, None);
    assert_eq!(h.remote.call_count(), 0);
    assert_eq!(h.manager.pending_operations_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn drained_queue_stops_timer() {
    let h = Harness::new(true);

    h.manager
        .queue_operation("customers", OperationKind::Insert, customer("A"), None)
        .unwrap();
    settle().await;
    assert_eq!(h.remote.call_count(), 1);
    assert!(!h.manager.is_timer_running());

    // Several intervals later nothing else went out.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.remote.call_count(), 1);

    // A new operation restarts the timer.
    h.manager
        .queue_operation("customers", OperationKind::Insert, customer("B"), None)
        .unwrap();
    settle().await;
    assert_eq!(h.remote.call_count(), 2);
    assert_eq!(h.manager.pending_operations_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn corrupted_storage_starts_empty() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(KEY, "[{\"table\": \"customers\",").unwrap();

    let h = Harness::with_storage(true, storage);
    assert_eq!(h.manager.pending_operations_count(), 0);
    assert!(!h.manager.is_timer_running());
}

#[tokio::test(start_paused = true)]
async fn leftover_operations_sync_on_startup() {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .set(
            KEY,
            r#"[{"table":"customers","operation":"insert","data":{"name":"A"}}]"#,
        )
        .unwrap();

    let h = Harness::with_storage(true, storage);
    assert_eq!(h.manager.pending_operations_count(), 1);
    assert!(h.manager.is_timer_running());

    settle().await;
    assert_eq!(h.remote.call_count(), 1);
    assert_eq!(h.manager.pending_operations_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn operations_queued_during_a_pass_wait_for_the_next_one() {
    let h = Harness::new(true);
    h.remote.set_latency(Duration::from_secs(1));

    h.manager
        .queue_operation("customers", OperationKind::Insert, customer("A"), None)
        .unwrap();
    settle().await;
    assert!(h.manager.is_syncing());

    h.manager
        .queue_operation("customers", OperationKind::Insert, customer("B"), None)
        .unwrap();

    // First pass completes: only A was attempted and removed.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.remote.call_count(), 1);
    assert_eq!(
        h.manager.pending_operations(),
        vec![PendingOperation::insert("customers", customer("B"))]
    );

    // Next tick picks up B.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.remote.call_count(), 2);
    assert_eq!(h.manager.pending_operations_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn in_flight_pass_completes_after_going_offline() {
    let h = Harness::new(true);
    h.remote.set_latency(Duration::from_secs(1));

    h.manager
        .queue_operation("customers", OperationKind::Insert, customer("A"), None)
        .unwrap();
    settle().await;
    assert!(h.manager.is_syncing());

    h.connectivity.set_online(false);
    tokio::time::sleep(Duration::from_secs(2)).await;

    // The call that was already out still counted.
    assert_eq!(h.remote.call_count(), 1);
    assert_eq!(h.manager.pending_operations_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn manual_sync_delivers_without_waiting_for_tick() {
    let h = Harness::new(true);
    h.remote.set_fail_all(true);

    h.manager
        .queue_operation("customers", OperationKind::Insert, customer("A"), None)
        .unwrap();
    settle().await;
    assert_eq!(h.manager.pending_operations_count(), 1);

    h.remote.set_fail_all(false);
    let report = h.manager.perform_sync().await;

    assert_eq!(report.attempted, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.remaining, 0);
    assert!(!h.manager.is_timer_running());
}

#[tokio::test(start_paused = true)]
async fn duplicate_operations_are_both_delivered() {
    let h = Harness::new(false);

    for _ in 0..2 {
        h.manager
            .queue_operation("customers", OperationKind::Update, customer("A"), Some(3.into()))
            .unwrap();
    }

    h.connectivity.set_online(true);
    settle().await;

    assert_eq!(h.remote.call_count(), 2);
    assert_eq!(h.manager.pending_operations_count(), 0);
}
