//! Remote data store contract.
//!
//! The remote store exposes insert, update, delete-by-id and select over
//! named collections. Every call is asynchronous and may fail for any
//! reason; the sync manager treats all failures alike.

use crate::{OperationKind, Payload, PendingOperation, RecordId, RemoteError};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Result type for remote calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// The backing data store operations are replayed against.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Insert a new record and return it as stored.
    async fn insert(&self, collection: &str, data: &Payload) -> RemoteResult<Value>;

    /// Update an existing record and return it as stored.
    async fn update(&self, collection: &str, id: &RecordId, data: &Payload)
        -> RemoteResult<Value>;

    /// Delete a record by id.
    async fn delete(&self, collection: &str, id: &RecordId) -> RemoteResult<()>;

    /// List records whose fields equal every entry of `filter`.
    async fn select(&self, collection: &str, filter: &Payload) -> RemoteResult<Vec<Value>>;
}

/// Send one pending operation to the remote store.
///
/// Inserts and updates resolve to the stored record; deletes resolve to
/// `{"id": <id>}`. An update or delete without a record id is rejected
/// without contacting the remote.
pub async fn dispatch(remote: &dyn RemoteStore, op: &PendingOperation) -> RemoteResult<Value> {
    match (op.kind, &op.record_id) {
        (OperationKind::Insert, _) => remote.insert(&op.collection, &op.payload).await,
        (OperationKind::Update, Some(id)) => remote.update(&op.collection, id, &op.payload).await,
        (OperationKind::Delete, Some(id)) => {
            remote.delete(&op.collection, id).await?;
            Ok(json!({ "id": Value::from(id.clone()) }))
        }
        (kind, None) => Err(RemoteError::Rejected(format!(
            "{kind} on '{}' has no record id",
            op.collection
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload_from_value;
    use std::sync::Mutex;

    /// Records every call and answers with canned values.
    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RemoteStore for RecordingStore {
        async fn insert(&self, collection: &str, data: &Payload) -> RemoteResult<Value> {
            self.calls.lock().unwrap().push(format!("insert {collection}"));
            let mut record = data.clone();
            record.insert("id".into(), json!(1));
            Ok(Value::Object(record))
        }

        async fn update(
            &self,
            collection: &str,
            id: &RecordId,
            data: &Payload,
        ) -> RemoteResult<Value> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("update {collection} {id}"));
            Ok(Value::Object(data.clone()))
        }

        async fn delete(&self, collection: &str, id: &RecordId) -> RemoteResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("delete {collection} {id}"));
            Ok(())
        }

        async fn select(&self, _collection: &str, _filter: &Payload) -> RemoteResult<Vec<Value>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn dispatch_routes_by_kind() {
        let store = RecordingStore::default();

        let inserted = dispatch(
            &store,
            &PendingOperation::insert("customers", payload_from_value(json!({"name": "A"}))),
        )
        .await
        .unwrap();
        assert_eq!(inserted, json!({"name": "A", "id": 1}));

        dispatch(
            &store,
            &PendingOperation::update("customers", 1, payload_from_value(json!({"name": "B"}))),
        )
        .await
        .unwrap();

        let deleted = dispatch(&store, &PendingOperation::delete("customers", "c-9"))
            .await
            .unwrap();
        assert_eq!(deleted, json!({"id": "c-9"}));

        assert_eq!(
            *store.calls.lock().unwrap(),
            vec![
                "insert customers".to_string(),
                "update customers 1".to_string(),
                "delete customers c-9".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn dispatch_rejects_missing_id_without_remote_call() {
        let store = RecordingStore::default();
        let op = PendingOperation::new("customers", OperationKind::Delete, Payload::new(), None);

        let err = dispatch(&store, &op).await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected(_)));
        assert!(store.calls.lock().unwrap().is_empty());
    }
}
