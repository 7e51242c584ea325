//! Pending operation types.
//!
//! A [`PendingOperation`] describes one mutation that has not yet been
//! confirmed by the remote data store. The serialized shape is the on-disk
//! format of the pending queue, so field names are fixed:
//!
//! ```json
//! { "table": "customers", "operation": "update", "data": {"name": "A"}, "id": 7 }
//! ```

use crate::{error::Result, CollectionName, Error, Payload};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The kind of mutation a pending operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
}

impl OperationKind {
    /// Whether this kind targets an existing record.
    pub fn requires_record_id(self) -> bool {
        matches!(self, OperationKind::Update | OperationKind::Delete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a remote record: numeric primary keys and string keys
/// both occur.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(id) => write!(f, "{id}"),
            RecordId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Int(id)
    }
}

impl From<i32> for RecordId {
    fn from(id: i32) -> Self {
        RecordId::Int(i64::from(id))
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId::Text(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        RecordId::Text(id)
    }
}

impl From<RecordId> for serde_json::Value {
    fn from(id: RecordId) -> Self {
        match id {
            RecordId::Int(id) => serde_json::Value::from(id),
            RecordId::Text(id) => serde_json::Value::String(id),
        }
    }
}

/// One buffered mutation awaiting confirmed delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Target collection
    #[serde(rename = "table")]
    pub collection: CollectionName,
    /// Mutation kind
    #[serde(rename = "operation")]
    pub kind: OperationKind,
    /// Fields to write (ignored for deletes)
    #[serde(rename = "data", default, deserialize_with = "null_as_empty")]
    pub payload: Payload,
    /// Target record, required for updates and deletes
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<RecordId>,
}

impl PendingOperation {
    /// Build an operation from raw parts without validating it.
    pub fn new(
        collection: impl Into<CollectionName>,
        kind: OperationKind,
        payload: Payload,
        record_id: Option<RecordId>,
    ) -> Self {
        Self {
            collection: collection.into(),
            kind,
            payload,
            record_id,
        }
    }

    pub fn insert(collection: impl Into<CollectionName>, payload: Payload) -> Self {
        Self::new(collection, OperationKind::Insert, payload, None)
    }

    pub fn update(
        collection: impl Into<CollectionName>,
        id: impl Into<RecordId>,
        payload: Payload,
    ) -> Self {
        Self::new(collection, OperationKind::Update, payload, Some(id.into()))
    }

    pub fn delete(collection: impl Into<CollectionName>, id: impl Into<RecordId>) -> Self {
        Self::new(collection, OperationKind::Delete, Payload::new(), Some(id.into()))
    }

    /// Check that updates and deletes name their target record.
    ///
    /// An operation failing this check can never be delivered and would
    /// stay in the queue forever.
    pub fn validate(&self) -> Result<()> {
        if self.kind.requires_record_id() && self.record_id.is_none() {
            return Err(Error::MissingRecordId {
                kind: self.kind,
                collection: self.collection.clone(),
            });
        }
        Ok(())
    }
}

/// Stored deletes may carry `"data": null`.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Payload, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Payload>::deserialize(deserializer)?.unwrap_or_default())
}

/// Convert a JSON value into a payload, treating anything that is not an
/// object as empty.
pub fn payload_from_value(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Payload::new(),
    }
}
