//! Collection endpoint routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde_json::Value;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{handle_delete, handle_insert, handle_select, handle_update, SelectQuery};
use crate::AppState;

/// Create collection routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/collections/{collection}",
            get(select_handler).post(insert_handler),
        )
        .route(
            "/collections/{collection}/{id}",
            patch(update_handler).delete(delete_handler),
        )
}

/// POST /collections/{collection} - Insert a record.
async fn insert_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    let record = handle_insert(&state.pool, &collection, body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// PATCH /collections/{collection}/{id} - Update a record.
async fn update_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    let record = handle_update(&state.pool, &collection, &id, body).await?;
    Ok(Json(record))
}

/// DELETE /collections/{collection}/{id} - Delete a record.
async fn delete_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let removed = handle_delete(&state.pool, &collection, &id).await?;
    Ok(Json(removed))
}

/// GET /collections/{collection} - Select records.
async fn select_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(collection): Path<String>,
    Query(query): Query<SelectQuery>,
) -> Result<Json<Value>> {
    let records = handle_select(&state.pool, &collection, query).await?;
    Ok(Json(records))
}
