//! The pending queue and its persistence.
//!
//! The queue is an ordered list of [`PendingOperation`]s, oldest first. It
//! is persisted as a JSON array under a single storage key and rewritten in
//! full after every mutation. Loading never fails: a missing, unreadable or
//! corrupted document yields an empty queue, and individual entries that
//! cannot be read back are dropped while the rest are kept.

use crate::{DurableStorage, PendingOperation};
use serde_json::Value;

/// Ordered buffer of operations awaiting delivery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingQueue {
    ops: Vec<PendingOperation>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate the queue stored under `key`.
    pub fn load(storage: &dyn DurableStorage, key: &str) -> Self {
        let raw = match storage.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Self::new(),
            Err(e) => {
                tracing::warn!(key, error = %e, "Pending queue unreadable, starting empty");
                return Self::new();
            }
        };

        let entries: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(key, error = %e, "Pending queue corrupted, starting empty");
                return Self::new();
            }
        };

        let before = entries.len();
        let ops: Vec<PendingOperation> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(position, entry)| {
                let op = match serde_json::from_value::<PendingOperation>(entry) {
                    Ok(op) => op,
                    Err(e) => {
                        tracing::warn!(position, error = %e, "Dropping unreadable stored operation");
                        return None;
                    }
                };
                match op.validate() {
                    Ok(()) => Some(op),
                    Err(e) => {
                        tracing::warn!(position, error = %e, "Dropping undeliverable stored operation");
                        None
                    }
                }
            })
            .collect();

        tracing::debug!(
            key,
            loaded = ops.len(),
            dropped = before - ops.len(),
            "Pending queue loaded"
        );

        Self { ops }
    }

    /// Overwrite the stored queue with the current contents.
    ///
    /// Failures are logged and otherwise ignored: the in-memory queue stays
    /// authoritative for this process.
    pub fn persist(&self, storage: &dyn DurableStorage, key: &str) {
        let json = match serde_json::to_string(&self.ops) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize pending queue");
                return;
            }
        };

        if let Err(e) = storage.set(key, &json) {
            tracing::warn!(key, error = %e, "Failed to persist pending queue");
        }
    }

    /// Append an operation at the back.
    pub fn push(&mut self, op: PendingOperation) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingOperation> {
        self.ops.iter()
    }

    /// Copy of the current contents for a sync pass.
    pub fn snapshot(&self) -> Vec<PendingOperation> {
        self.ops.clone()
    }

    /// Remove the entries a sync pass delivered.
    ///
    /// `succeeded[i]` refers to position `i` of the snapshot the pass worked
    /// on. Entries appended after the snapshot lie beyond `succeeded.len()`
    /// and are kept. Returns the number of entries removed.
    pub fn remove_succeeded(&mut self, succeeded: &[bool]) -> usize {
        let before = self.ops.len();
        let mut position = 0;
        self.ops.retain(|_| {
            let delivered = succeeded.get(position).copied().unwrap_or(false);
            position += 1;
            !delivered
        });
        before - self.ops.len()
    }
}

impl FromIterator<PendingOperation> for PendingQueue {
    fn from_iter<I: IntoIterator<Item = PendingOperation>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}
