//! JSON REST API for Muster.
//!
//! Exposes an axum [`Router`] backed by any
//! [`muster_core::store::InventoryStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", muster_api::api_router(store.clone()))
//! ```

pub mod admin;
pub mod error;
pub mod events;
pub mod hosts;
pub mod packages;
pub mod reports;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use muster_core::store::InventoryStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: InventoryStore + 'static,
{
  Router::new()
    // Packages
    .route("/packages", get(packages::list::<S>).post(packages::create::<S>))
    .route(
      "/packages/{id}",
      get(packages::get_one::<S>).delete(packages::delete_one::<S>),
    )
    .route("/packages/{id}/current", get(packages::current::<S>))
    // Hosts
    .route("/hosts", get(hosts::list::<S>).post(hosts::create::<S>))
    .route(
      "/hosts/{id}",
      get(hosts::get_one::<S>).delete(hosts::delete_one::<S>),
    )
    .route("/hosts/{id}/checkin", post(hosts::checkin::<S>))
    .route("/hosts/{id}/updated", post(hosts::updated::<S>))
    .route("/hosts/{id}/history", delete(hosts::clear_history::<S>))
    .route("/hosts/{id}/packages", get(hosts::inventory::<S>))
    .route(
      "/hosts/{id}/packages/{package_id}",
      get(hosts::inventory_one::<S>),
    )
    // Event logs
    .route("/releases", post(events::create_release::<S>))
    .route(
      "/releases/{id}",
      get(events::get_release::<S>).delete(events::delete_release::<S>),
    )
    .route("/updates", post(events::create_update::<S>))
    .route("/updates/{id}", get(events::get_update::<S>))
    // Reports and admin
    .route("/reports/outdated", get(reports::outdated::<S>))
    .route(
      "/admin/rebuild",
      get(admin::last_rebuild::<S>).post(admin::rebuild::<S>),
    )
    .with_state(store)
}

// ─── Integration tests ────────────────────────────────────────────────────────
