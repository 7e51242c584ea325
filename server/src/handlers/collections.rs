//! Collection handlers - insert, update, delete and select records.

use crate::db;
use crate::error::{AppError, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;

/// Default number of records returned by a select.
pub const DEFAULT_SELECT_LIMIT: i64 = 100;

/// Upper bound on records returned by a select.
pub const MAX_SELECT_LIMIT: i64 = 1000;

/// Query parameters for selecting records.
#[derive(Debug, Default, Deserialize)]
pub struct SelectQuery {
    /// JSON object; records must contain every field with an equal value
    pub filter: Option<String>,
    /// Maximum number of records to return
    pub limit: Option<i64>,
}

/// Check a collection name: 1 to 64 ASCII letters, digits or underscores.
pub fn validate_collection(collection: &str) -> Result<()> {
    let valid = !collection.is_empty()
        && collection.len() <= 64
        && collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "invalid collection name: {collection}"
        )))
    }
}

/// Parse a record id from the path.
pub fn parse_record_id(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid record id: {raw}")))
}

fn require_object(body: Value) -> Result<Value> {
    match body {
        Value::Object(mut map) => {
            // Server-managed fields are never taken from the client.
            map.remove("id");
            map.remove("created_at");
            map.remove("updated_at");
            Ok(Value::Object(map))
        }
        _ => Err(AppError::BadRequest(
            "request body must be a JSON object".to_string(),
        )),
    }
}

fn parse_select(query: SelectQuery) -> Result<(Value, i64)> {
    let filter = match query.filter.as_deref() {
        None | Some("") => json!({}),
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(filter @ Value::Object(_)) => filter,
            _ => {
                return Err(AppError::BadRequest(
                    "filter must be a JSON object".to_string(),
                ))
            }
        },
    };

    let limit = query
        .limit
        .unwrap_or(DEFAULT_SELECT_LIMIT)
        .clamp(1, MAX_SELECT_LIMIT);

    Ok((filter, limit))
}

/// Insert a record.
pub async fn handle_insert(pool: &PgPool, collection: &str, body: Value) -> Result<Value> {
    validate_collection(collection)?;
    let data = require_object(body)?;

    let record = db::insert_record(pool, collection, &data).await?;
    tracing::debug!(collection, id = record.id, "Record inserted");

    Ok(record.to_json())
}

/// Merge fields into an existing record.
pub async fn handle_update(
    pool: &PgPool,
    collection: &str,
    raw_id: &str,
    body: Value,
) -> Result<Value> {
    validate_collection(collection)?;
    let id = parse_record_id(raw_id)?;
    let data = require_object(body)?;

    let record = db::update_record(pool, collection, id, &data)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{collection}/{id}")))?;
    tracing::debug!(collection, id, "Record updated");

    Ok(record.to_json())
}

/// Delete a record.
///
/// Deleting a record that is already gone succeeds: clients replay queued
/// deletes whose first attempt may have committed without a response.
pub async fn handle_delete(pool: &PgPool, collection: &str, raw_id: &str) -> Result<Value> {
    validate_collection(collection)?;
    let id = parse_record_id(raw_id)?;

    let removed = db::delete_record(pool, collection, id).await?;
    tracing::debug!(collection, id, removed, "Record deleted");

    Ok(json!({ "id": id }))
}

/// List records matching a filter.
pub async fn handle_select(pool: &PgPool, collection: &str, query: SelectQuery) -> Result<Value> {
    validate_collection(collection)?;
    let (filter, limit) = parse_select(query)?;

    let records = db::select_records(pool, collection, &filter, limit).await?;

    Ok(Value::Array(records.iter().map(|r| r.to_json()).collect()))
}
