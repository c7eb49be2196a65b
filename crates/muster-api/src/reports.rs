//! Handler for `GET /reports/outdated`.

use std::sync::Arc;

use axum::{Json, extract::State};
use muster_core::{store::InventoryStore, view::OutdatedInstall};

use crate::error::ApiError;

/// `GET /reports/outdated` — every (host, package) whose installed release
/// differs from the package's current release, joined with descriptive
/// attributes at query time.
pub async fn outdated<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<OutdatedInstall>>, ApiError>
where
  S: InventoryStore,
{
  Ok(Json(store.outdated_hosts().await?))
}
