//! Handlers for `/admin/rebuild` — operator-triggered index reconstruction.

use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use muster_core::store::InventoryStore;
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct RebuildStatus {
  /// When the indexes were last rebuilt from scratch, if ever.
  pub last_rebuild_at: Option<DateTime<Utc>>,
}

/// `POST /admin/rebuild` — reconstruct both indexes from the logs.
/// Returns the new freshness stamp on success; on failure the previous
/// index is untouched and the call may simply be retried.
pub async fn rebuild<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<RebuildStatus>, ApiError>
where
  S: InventoryStore,
{
  store.rebuild_indexes().await?;
  let last_rebuild_at = store.last_rebuild().await?;
  Ok(Json(RebuildStatus { last_rebuild_at }))
}

/// `GET /admin/rebuild` — the index freshness signal.
pub async fn last_rebuild<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<RebuildStatus>, ApiError>
where
  S: InventoryStore,
{
  let last_rebuild_at = store.last_rebuild().await?;
  Ok(Json(RebuildStatus { last_rebuild_at }))
}
