//! Handlers for `/hosts` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/hosts` | All hosts |
//! | `POST`   | `/hosts` | Body: [`NewHost`]; returns 201 + stored row |
//! | `GET`    | `/hosts/:id` | 404 if not found |
//! | `DELETE` | `/hosts/:id` | Cascades history and index rows |
//! | `POST`   | `/hosts/:id/checkin` | Body: `{"at":"..."}`, defaults to now |
//! | `POST`   | `/hosts/:id/updated` | Same body; stamps `last_update` |
//! | `DELETE` | `/hosts/:id/history` | First-boot wipe; keeps the host |
//! | `GET`    | `/hosts/:id/packages` | Full inventory, joined on read |
//! | `GET`    | `/hosts/:id/packages/:package_id` | One inventory entry |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use muster_core::{
  host::{Host, NewHost},
  store::InventoryStore,
  view::HostPackage,
};
use serde::Deserialize;

use crate::error::ApiError;

/// `GET /hosts`
pub async fn list<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Host>>, ApiError>
where
  S: InventoryStore,
{
  Ok(Json(store.list_hosts().await?))
}

/// `POST /hosts` — returns 201 + the stored [`Host`].
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewHost>,
) -> Result<impl IntoResponse, ApiError>
where
  S: InventoryStore,
{
  let host = store.add_host(body).await?;
  Ok((StatusCode::CREATED, Json(host)))
}

/// `GET /hosts/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Host>, ApiError>
where
  S: InventoryStore,
{
  let host = store
    .get_host(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("host {id} not found")))?;
  Ok(Json(host))
}

/// `DELETE /hosts/:id`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: InventoryStore,
{
  store.delete_host(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Check-in bookkeeping ─────────────────────────────────────────────────────

/// JSON body accepted by the check-in and updated stamps.
#[derive(Debug, Default, Deserialize)]
pub struct StampBody {
  /// Defaults to the server's current time when omitted.
  pub at: Option<DateTime<Utc>>,
}

/// `POST /hosts/:id/checkin`
pub async fn checkin<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  body: Option<Json<StampBody>>,
) -> Result<StatusCode, ApiError>
where
  S: InventoryStore,
{
  let at = body.and_then(|Json(b)| b.at).unwrap_or_else(Utc::now);
  store.record_checkin(id, at).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /hosts/:id/updated`
pub async fn updated<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  body: Option<Json<StampBody>>,
) -> Result<StatusCode, ApiError>
where
  S: InventoryStore,
{
  let at = body.and_then(|Json(b)| b.at).unwrap_or_else(Utc::now);
  store.record_host_update(id, at).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /hosts/:id/history` — wipe the host's update log and index rows.
pub async fn clear_history<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: InventoryStore,
{
  store.clear_host_history(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Inventory reads ──────────────────────────────────────────────────────────

/// `GET /hosts/:id/packages`
pub async fn inventory<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Vec<HostPackage>>, ApiError>
where
  S: InventoryStore,
{
  if store.get_host(id).await?.is_none() {
    return Err(ApiError::NotFound(format!("host {id} not found")));
  }
  Ok(Json(store.host_inventory(id).await?))
}

/// `GET /hosts/:id/packages/:package_id`
pub async fn inventory_one<S>(
  State(store): State<Arc<S>>,
  Path((id, package_id)): Path<(i64, i64)>,
) -> Result<Json<HostPackage>, ApiError>
where
  S: InventoryStore,
{
  let entry = store.host_package(id, package_id).await?.ok_or_else(|| {
    ApiError::NotFound(format!(
      "no installed release recorded for host {id}, package {package_id}"
    ))
  })?;
  Ok(Json(entry))
}
