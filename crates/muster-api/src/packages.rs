//! Handlers for `/packages` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/packages` | All packages |
//! | `POST`   | `/packages` | Body: [`NewPackage`]; returns 201 + stored row |
//! | `GET`    | `/packages/:id` | 404 if not found |
//! | `DELETE` | `/packages/:id` | Cascades history and index rows |
//! | `GET`    | `/packages/:id/current` | Latest-release lookup, resolved |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use muster_core::{
  event::ReleaseEvent,
  package::{NewPackage, Package},
  store::InventoryStore,
};

use crate::error::ApiError;

/// `GET /packages`
pub async fn list<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Package>>, ApiError>
where
  S: InventoryStore,
{
  Ok(Json(store.list_packages().await?))
}

/// `POST /packages` — returns 201 + the stored [`Package`].
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewPackage>,
) -> Result<impl IntoResponse, ApiError>
where
  S: InventoryStore,
{
  let package = store.add_package(body).await?;
  Ok((StatusCode::CREATED, Json(package)))
}

/// `GET /packages/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Package>, ApiError>
where
  S: InventoryStore,
{
  let package = store
    .get_package(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("package {id} not found")))?;
  Ok(Json(package))
}

/// `DELETE /packages/:id`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: InventoryStore,
{
  store.delete_package(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /packages/:id/current` — the release event with the greatest id.
///
/// 404 both for an unknown package and for a package with no release
/// history; an empty index entry is a valid empty result, not a fault.
pub async fn current<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<ReleaseEvent>, ApiError>
where
  S: InventoryStore,
{
  if store.get_package(id).await?.is_none() {
    return Err(ApiError::NotFound(format!("package {id} not found")));
  }
  let release = store.current_release(id).await?.ok_or_else(|| {
    ApiError::NotFound(format!("package {id} has no release history"))
  })?;
  Ok(Json(release))
}
