//! Database operations for the collection_records table.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};

/// A stored record row from the database.
#[derive(Debug)]
pub struct StoredRecord {
    pub id: i64,
    #[allow(dead_code)]
    pub collection: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredRecord {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredRecord {
            id: row.try_get("id")?,
            collection: row.try_get("collection")?,
            data: row.try_get("data")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredRecord {
    /// Flatten the row into the JSON shape clients see: the stored fields
    /// plus `id`, `created_at` and `updated_at`.
    pub fn to_json(&self) -> Value {
        let mut record = match &self.data {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        record.insert("id".into(), Value::from(self.id));
        record.insert(
            "created_at".into(),
            Value::String(self.created_at.to_rfc3339()),
        );
        record.insert(
            "updated_at".into(),
            Value::String(self.updated_at.to_rfc3339()),
        );
        Value::Object(record)
    }
}

/// Insert a record into a collection.
pub async fn insert_record(
    pool: &PgPool,
    collection: &str,
    data: &Value,
) -> Result<StoredRecord, sqlx::Error> {
    sqlx::query_as::<_, StoredRecord>(
        r#"
        INSERT INTO collection_records (collection, data)
        VALUES ($1, $2)
        RETURNING id, collection, data, created_at, updated_at
        "#,
    )
    .bind(collection)
    .bind(data)
    .fetch_one(pool)
    .await
}

/// Merge `data` into an existing record. Returns `None` if it does not exist.
pub async fn update_record(
    pool: &PgPool,
    collection: &str,
    id: i64,
    data: &Value,
) -> Result<Option<StoredRecord>, sqlx::Error> {
    sqlx::query_as::<_, StoredRecord>(
        r#"
        UPDATE collection_records
        SET data = data || $3, updated_at = now()
        WHERE collection = $1 AND id = $2
        RETURNING id, collection, data, created_at, updated_at
        "#,
    )
    .bind(collection)
    .bind(id)
    .bind(data)
    .fetch_optional(pool)
    .await
}

/// Delete a record. Returns whether a row was removed.
pub async fn delete_record(pool: &PgPool, collection: &str, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM collection_records
        WHERE collection = $1 AND id = $2
        "#,
    )
    .bind(collection)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// List records of a collection whose data contains `filter`, newest first.
pub async fn select_records(
    pool: &PgPool,
    collection: &str,
    filter: &Value,
    limit: i64,
) -> Result<Vec<StoredRecord>, sqlx::Error> {
    sqlx::query_as::<_, StoredRecord>(
        r#"
        SELECT id, collection, data, created_at, updated_at
        FROM collection_records
        WHERE collection = $1 AND data @> $2
        ORDER BY id DESC
        LIMIT $3
        "#,
    )
    .bind(collection)
    .bind(filter)
    .bind(limit)
    .fetch_all(pool)
    .await
}
