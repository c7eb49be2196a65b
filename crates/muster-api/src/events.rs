//! Handlers for the `/releases` and `/updates` log endpoints — the write
//! interface consumed by collectors.
//!
//! Appends refresh the affected index entry synchronously in the store, so
//! a 201 response means the corresponding lookup is already current.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use muster_core::{
  event::{NewReleaseEvent, NewUpdateEvent, ReleaseEvent, UpdateEvent},
  store::InventoryStore,
};

use crate::error::ApiError;

// ─── Release log ─────────────────────────────────────────────────────────────

/// `POST /releases` — append a release event. 404 for an unknown package.
pub async fn create_release<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewReleaseEvent>,
) -> Result<impl IntoResponse, ApiError>
where
  S: InventoryStore,
{
  let event = store.append_release(body).await?;
  Ok((StatusCode::CREATED, Json(event)))
}

/// `GET /releases/:id`
pub async fn get_release<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<ReleaseEvent>, ApiError>
where
  S: InventoryStore,
{
  let event = store
    .release(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("release event {id} not found")))?;
  Ok(Json(event))
}

/// `DELETE /releases/:id` — the index row pointing at the event (if any)
/// disappears and is only repointed by a later refresh or rebuild.
pub async fn delete_release<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: InventoryStore,
{
  store.delete_release(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Update log ──────────────────────────────────────────────────────────────

/// `POST /updates` — append a host update event. 404 for unknown host,
/// package, or release; 400 when the release belongs to another package.
pub async fn create_update<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewUpdateEvent>,
) -> Result<impl IntoResponse, ApiError>
where
  S: InventoryStore,
{
  let event = store.append_update(body).await?;
  Ok((StatusCode::CREATED, Json(event)))
}

/// `GET /updates/:id`
pub async fn get_update<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<UpdateEvent>, ApiError>
where
  S: InventoryStore,
{
  let event = store
    .update(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("update event {id} not found")))?;
  Ok(Json(event))
}
