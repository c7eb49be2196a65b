//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// An index row points at a vanished log entry. Not healed here — the
  /// caller is told to trigger a rebuild.
  #[error("stale index: {0}")]
  StaleIndex(String),

  #[error("store error: {0}")]
  Store(String),
}

impl From<muster_core::Error> for ApiError {
  fn from(e: muster_core::Error) -> Self {
    use muster_core::Error as E;
    match &e {
      E::NoSuchPackage(_) | E::NoSuchHost(_) | E::NoSuchRelease(_)
      | E::NoSuchUpdate(_) => Self::NotFound(e.to_string()),
      E::DuplicatePackage { .. } | E::DuplicateHost { .. } => {
        Self::Conflict(e.to_string())
      }
      E::ReleasePackageMismatch { .. } | E::Malformed(_) => {
        Self::BadRequest(e.to_string())
      }
      E::StaleReleaseIndex { .. } | E::StaleInstallIndex { .. } => {
        Self::StaleIndex(e.to_string())
      }
      E::RebuildInterrupted(_) | E::Storage(_) => Self::Store(e.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::StaleIndex(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
      ApiError::Store(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
