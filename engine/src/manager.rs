//! The offline synchronization manager.
//!
//! [`SyncManager`] owns the pending queue. Writes that cannot reach the
//! remote store right now are appended to it and persisted; a background
//! timer replays them once the connection is back.
//!
//! ## Timer
//!
//! The sync timer runs iff the manager is online and the queue is
//! non-empty. Its first tick fires immediately, later ticks every
//! [`SyncConfig::sync_interval`]. It stops itself when a pass drains the
//! queue and is stopped on every transition to offline.
//!
//! ## Sync passes
//!
//! A pass snapshots the queue, submits every snapshot entry to the remote
//! store once, in queue order, and waits for all of them. Calls run
//! concurrently, so completion order is not guaranteed. Delivered entries
//! are then removed from the live queue by snapshot position. Entries
//! queued while the pass was in flight sit behind the snapshot and are
//! picked up by the next pass.
//!
//! Passes never overlap. A pass, once started, always runs to completion:
//! going offline or calling [`SyncManager::cleanup`] does not cancel
//! in-flight remote calls, and their outcome is still applied.

use crate::{
    config::SyncConfig,
    error::Result,
    notify::{Notification, Notifier},
    queue::PendingQueue,
    remote::{dispatch, RemoteStore},
    CollectionName, Connectivity, DurableStorage, OperationKind, Payload, PendingOperation,
    RecordId,
};
use futures::future::join_all;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{watch, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Outcome of one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Operations submitted to the remote store
    pub attempted: usize,
    /// Operations the remote store accepted
    pub succeeded: usize,
    /// Operations still queued after the pass
    pub remaining: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Timer,
    Manual,
}

/// Buffers writes while offline and replays them in the background.
///
/// Cheap to clone; all clones share one queue. Keep a single manager per
/// process (see [`crate::global`]): two managers on the same storage key
/// overwrite each other's queue.
#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: SyncConfig,
    storage_key: String,
    storage: Arc<dyn DurableStorage>,
    remote: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<State>,
    /// Held for the duration of a sync pass.
    pass_lock: Arc<tokio::sync::Mutex<()>>,
}

struct State {
    online: bool,
    queue: PendingQueue,
    timer: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
    closed: bool,
}

impl SyncManager {
    /// Create a manager, rehydrating the queue from `storage`.
    ///
    /// Starts listening to `connectivity` and, when online with operations
    /// left over from a previous run, starts syncing right away. Must be
    /// called from within a Tokio runtime.
    pub fn new(
        config: SyncConfig,
        storage: Arc<dyn DurableStorage>,
        remote: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
        connectivity: Connectivity,
    ) -> Self {
        let storage_key = config.storage_key();
        let queue = PendingQueue::load(storage.as_ref(), &storage_key);

        let mut changes = connectivity.subscribe();
        let online = *changes.borrow_and_update();
        let pending = queue.len();

        let inner = Arc::new(Inner {
            config,
            storage_key,
            storage,
            remote,
            notifier,
            state: Mutex::new(State {
                online,
                queue,
                timer: None,
                listener: None,
                closed: false,
            }),
            pass_lock: Arc::new(tokio::sync::Mutex::new(())),
        });

        let listener = spawn_listener(Arc::downgrade(&inner), changes);
        inner.state().listener = Some(listener);
        inner.ensure_timer();

        tracing::info!(
            key = %inner.storage_key,
            pending,
            online,
            "Sync manager started"
        );

        Self { inner }
    }

    /// Queue a mutation for later delivery.
    ///
    /// The queue is persisted before this returns. When online the sync
    /// timer is started if needed; when offline the user is told the change
    /// was saved locally. With validation enabled, an update or delete
    /// without a record id is refused with
    /// [`Error::MissingRecordId`](crate::Error::MissingRecordId).
    pub fn queue_operation(
        &self,
        collection: impl Into<CollectionName>,
        kind: OperationKind,
        payload: Payload,
        record_id: Option<RecordId>,
    ) -> Result<()> {
        self.enqueue(PendingOperation::new(collection, kind, payload, record_id))
    }

    /// Queue an already built operation. See [`SyncManager::queue_operation`].
    pub fn enqueue(&self, op: PendingOperation) -> Result<()> {
        if self.inner.config.validate_operations {
            op.validate()?;
        }
        self.inner.enqueue(op);
        Ok(())
    }

    /// Write now if possible, otherwise queue.
    ///
    /// Returns the remote result on success (the stored record, or
    /// `{"id": ..}` for deletes). Returns `Ok(None)` when the operation was
    /// queued instead, either because the manager is offline or because
    /// the remote call failed. `None` means "accepted for later delivery",
    /// not failure.
    pub async fn perform_operation(
        &self,
        collection: impl Into<CollectionName>,
        kind: OperationKind,
        payload: Payload,
        record_id: Option<RecordId>,
    ) -> Result<Option<Value>> {
        let op = PendingOperation::new(collection, kind, payload, record_id);
        if self.inner.config.validate_operations {
            op.validate()?;
        }

        if !self.is_online() {
            self.inner.enqueue(op);
            return Ok(None);
        }

        match dispatch(self.inner.remote.as_ref(), &op).await {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(
                    collection = %op.collection,
                    kind = %op.kind,
                    error = %e,
                    "Remote write failed, queued for retry"
                );
                self.inner.enqueue(op);
                Ok(None)
            }
        }
    }

    /// Run one sync pass now.
    ///
    /// Waits for a pass already in flight to finish first. Does nothing
    /// while offline. Unlike timer passes, a manual pass that leaves
    /// operations behind warns the user.
    pub async fn perform_sync(&self) -> SyncReport {
        let guard = self.inner.pass_lock.clone().lock_owned().await;
        let pass = tokio::spawn(self.inner.clone().run_pass(Trigger::Manual, guard));

        match pass.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "Sync pass aborted");
                SyncReport {
                    remaining: self.pending_operations_count(),
                    ..SyncReport::default()
                }
            }
        }
    }

    /// Number of operations awaiting delivery.
    pub fn pending_operations_count(&self) -> usize {
        self.inner.state().queue.len()
    }

    /// Copy of the queued operations, oldest first.
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        self.inner.state().queue.snapshot()
    }

    /// Last connectivity state seen by the manager.
    pub fn is_online(&self) -> bool {
        self.inner.state().online
    }

    /// Whether a sync pass is in flight.
    pub fn is_syncing(&self) -> bool {
        self.inner.pass_lock.try_lock().is_err()
    }

    /// Whether the background sync timer is running.
    pub fn is_timer_running(&self) -> bool {
        self.inner
            .state()
            .timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Stop listening to connectivity and stop the sync timer.
    ///
    /// The persisted queue is left alone so pending operations survive a
    /// restart. Operations queued afterwards are still persisted but no
    /// longer synced in the background.
    pub fn cleanup(&self) {
        let mut state = self.inner.state();
        state.closed = true;
        if let Some(listener) = state.listener.take() {
            listener.abort();
        }
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        tracing::debug!(pending = state.queue.len(), "Sync manager stopped");
    }
}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("SyncManager")
            .field("key", &self.inner.storage_key)
            .field("online", &state.online)
            .field("pending", &state.queue.len())
            .finish()
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(self: &Arc<Self>, op: PendingOperation) {
        let (online, pending) = {
            let mut state = self.state();
            tracing::debug!(
                collection = %op.collection,
                kind = %op.kind,
                "Operation queued"
            );
            state.queue.push(op);
            state.queue.persist(self.storage.as_ref(), &self.storage_key);
            (state.online, state.queue.len())
        };

        if online {
            self.ensure_timer();
        } else {
            tracing::debug!(pending, "Offline, operation kept for later");
            self.notifier.notify(Notification::warning(
                "You are offline. Changes will be synced when the connection returns.",
            ));
        }
    }

    /// Start the timer if online, the queue is non-empty and it is not
    /// already running.
    fn ensure_timer(self: &Arc<Self>) {
        let mut state = self.state();
        if state.closed || !state.online || state.queue.is_empty() {
            return;
        }
        if state.timer.as_ref().is_some_and(|timer| !timer.is_finished()) {
            return;
        }

        tracing::debug!(pending = state.queue.len(), "Sync timer started");
        state.timer = Some(spawn_timer(Arc::downgrade(self), self.config.sync_interval));
    }

    fn stop_timer(&self) {
        if let Some(timer) = self.state().timer.take() {
            timer.abort();
            tracing::debug!("Sync timer stopped");
        }
    }

    fn handle_online(self: &Arc<Self>) {
        let pending = {
            let mut state = self.state();
            if state.online {
                return;
            }
            state.online = true;
            state.queue.len()
        };

        tracing::info!(pending, "Connection restored");
        if pending > 0 {
            self.notifier.notify(Notification::info(format!(
                "Back online. Syncing {pending} pending change{}...",
                if pending == 1 { "" } else { "s" }
            )));
            self.ensure_timer();
        }
    }

    fn handle_offline(&self) {
        {
            let mut state = self.state();
            if !state.online {
                return;
            }
            state.online = false;
        }

        tracing::warn!("Connection lost");
        self.notifier.notify(Notification::warning(
            "You are offline. Changes will be saved locally.",
        ));
        self.stop_timer();
    }

    async fn run_pass(self: Arc<Self>, trigger: Trigger, _guard: OwnedMutexGuard<()>) -> SyncReport {
        let snapshot = {
            let state = self.state();
            if !state.online {
                tracing::debug!(?trigger, "Offline, sync pass skipped");
                return SyncReport {
                    remaining: state.queue.len(),
                    ..SyncReport::default()
                };
            }
            state.queue.snapshot()
        };

        if snapshot.is_empty() {
            return SyncReport::default();
        }

        tracing::debug!(?trigger, pending = snapshot.len(), "Sync pass started");

        let remote = self.remote.as_ref();
        let outcomes = join_all(snapshot.iter().map(|op| dispatch(remote, op))).await;

        let succeeded: Vec<bool> = snapshot
            .iter()
            .zip(&outcomes)
            .map(|(op, outcome)| match outcome {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(
                        collection = %op.collection,
                        kind = %op.kind,
                        error = %e,
                        "Sync failed, will retry"
                    );
                    false
                }
            })
            .collect();
        let delivered = succeeded.iter().filter(|ok| **ok).count();

        let remaining = {
            let mut state = self.state();
            if state.queue.remove_succeeded(&succeeded) > 0 {
                state.queue.persist(self.storage.as_ref(), &self.storage_key);
            }
            let remaining = state.queue.len();
            if remaining == 0 {
                if let Some(timer) = state.timer.take() {
                    timer.abort();
                }
            }
            remaining
        };

        tracing::info!(
            ?trigger,
            attempted = snapshot.len(),
            succeeded = delivered,
            remaining,
            "Sync pass finished"
        );

        if remaining == 0 && delivered > 0 {
            self.notifier
                .notify(Notification::success("All changes synchronized"));
        } else if remaining > 0 && trigger == Trigger::Manual {
            self.notifier.notify(Notification::warning(format!(
                "{remaining} change{} could not be synchronized yet",
                if remaining == 1 { "" } else { "s" }
            )));
        }

        SyncReport {
            attempted: snapshot.len(),
            succeeded: delivered,
            remaining,
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(listener) = state.listener.take() {
            listener.abort();
        }
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }
}

fn spawn_listener(inner: Weak<Inner>, mut changes: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let online = *changes.borrow_and_update();
            let Some(inner) = inner.upgrade() else {
                break;
            };
            if online {
                inner.handle_online();
            } else {
                inner.handle_offline();
            }
        }
    })
}

fn spawn_timer(inner: Weak<Inner>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(manager) = inner.upgrade() else {
                break;
            };
            // A pass still in flight covers this tick.
            let Ok(guard) = manager.pass_lock.clone().try_lock_owned() else {
                continue;
            };

            // Run the pass on its own task so stopping the timer never
            // cancels remote calls already submitted.
            let pass = tokio::spawn(manager.run_pass(Trigger::Timer, guard));
            if let Err(e) = pass.await {
                tracing::error!(error = %e, "Sync pass aborted");
            }
        }
    })
}
