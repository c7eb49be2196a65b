//! The `InventoryStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `muster-store-sqlite`).
//! Higher layers (`muster-api`, `muster-server`) depend on this abstraction,
//! not on any concrete backend.
//!
//! Two append-only logs (release events, update events) are the source of
//! truth. Two derived indexes — current release per package, installed
//! release per (host, package) — are caches over them, maintained by the
//! `refresh_*` operations and reconstructed wholesale by `rebuild_indexes`.
//! "Latest" always means greatest event id, never greatest timestamp.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  Result,
  event::{NewReleaseEvent, NewUpdateEvent, ReleaseEvent, UpdateEvent},
  host::{Host, NewHost},
  package::{NewPackage, Package, PackageContents, PackageKind},
  view::{HostPackage, OutdatedInstall},
};

/// Abstraction over a Muster inventory store backend.
///
/// Lookups return `Option`/empty collections for absent keys — an empty
/// result is valid data, not an error. Constraint violations, index
/// staleness, and interrupted rebuilds surface as [`crate::Error`].
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait InventoryStore: Send + Sync {
  // ── Packages ──────────────────────────────────────────────────────────

  /// Create a package. Fails with `DuplicatePackage` if the
  /// `(name, kind, contents)` natural key is taken.
  fn add_package(
    &self,
    input: NewPackage,
  ) -> impl Future<Output = Result<Package>> + Send + '_;

  fn get_package(
    &self,
    package_id: i64,
  ) -> impl Future<Output = Result<Option<Package>>> + Send + '_;

  /// Look a package up by its natural key.
  fn find_package<'a>(
    &'a self,
    name: &'a str,
    kind: PackageKind,
    contents: &'a PackageContents,
  ) -> impl Future<Output = Result<Option<Package>>> + Send + 'a;

  fn list_packages(
    &self,
  ) -> impl Future<Output = Result<Vec<Package>>> + Send + '_;

  /// Delete a package and, by cascade, its release events, the update
  /// events reporting them, and every index row derived from either.
  fn delete_package(
    &self,
    package_id: i64,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Hosts ─────────────────────────────────────────────────────────────

  /// Register a host. Fails with `DuplicateHost` if `(name, domain)` is
  /// taken.
  fn add_host(
    &self,
    input: NewHost,
  ) -> impl Future<Output = Result<Host>> + Send + '_;

  fn get_host(
    &self,
    host_id: i64,
  ) -> impl Future<Output = Result<Option<Host>>> + Send + '_;

  fn find_host<'a>(
    &'a self,
    name: &'a str,
    domain: &'a str,
  ) -> impl Future<Output = Result<Option<Host>>> + Send + 'a;

  fn list_hosts(&self) -> impl Future<Output = Result<Vec<Host>>> + Send + '_;

  /// Delete a host and, by cascade, its update events and index rows.
  fn delete_host(
    &self,
    host_id: i64,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Stamp the host's `last_checkin`.
  fn record_checkin(
    &self,
    host_id: i64,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Stamp the host's `last_update` after a remediation run.
  fn record_host_update(
    &self,
    host_id: i64,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Wipe the host's update log and installed-release index rows, keeping
  /// the host itself. Used when a machine reports first boot after a
  /// rebuild or reimage.
  fn clear_host_history(
    &self,
    host_id: i64,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Event logs — append-only writes ───────────────────────────────────

  /// Append a release event and synchronously refresh the package's
  /// current-release index entry. Fails with `NoSuchPackage` before any
  /// mutation if the package does not exist. Out-of-order `occurred_at`
  /// values are accepted; ordering is by the assigned id.
  fn append_release(
    &self,
    input: NewReleaseEvent,
  ) -> impl Future<Output = Result<ReleaseEvent>> + Send + '_;

  /// Append an update event and synchronously refresh the pair's
  /// installed-release index entry. Fails before any mutation if the host,
  /// package, or release does not exist, or if the release belongs to a
  /// different package.
  fn append_update(
    &self,
    input: NewUpdateEvent,
  ) -> impl Future<Output = Result<UpdateEvent>> + Send + '_;

  fn release(
    &self,
    event_id: i64,
  ) -> impl Future<Output = Result<Option<ReleaseEvent>>> + Send + '_;

  fn update(
    &self,
    event_id: i64,
  ) -> impl Future<Output = Result<Option<UpdateEvent>>> + Send + '_;

  /// All release events for a package in id order.
  fn release_history(
    &self,
    package_id: i64,
  ) -> impl Future<Output = Result<Vec<ReleaseEvent>>> + Send + '_;

  /// All update events for a (host, package) pair in id order.
  fn update_history(
    &self,
    host_id: i64,
    package_id: i64,
  ) -> impl Future<Output = Result<Vec<UpdateEvent>>> + Send + '_;

  /// Delete a single release event. The index row pointing at it (if any)
  /// disappears by cascade and is **not** repointed; call
  /// [`Self::refresh_current_release`] to recompute the winner.
  fn delete_release(
    &self,
    event_id: i64,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Latest-release index ──────────────────────────────────────────────

  /// The release event with the greatest id for a package, resolved
  /// through the index. `None` for packages with no indexed history;
  /// `StaleReleaseIndex` if the row points at a vanished event.
  fn current_release(
    &self,
    package_id: i64,
  ) -> impl Future<Output = Result<Option<ReleaseEvent>>> + Send + '_;

  /// Recompute the index entry for one package by scanning only its
  /// release events: greatest id wins, and an emptied history drops the
  /// row. Idempotent; the read-max-then-write sequence is atomic per key.
  fn refresh_current_release(
    &self,
    package_id: i64,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Drop the index row for a package. A no-op if none exists.
  fn remove_current_release(
    &self,
    package_id: i64,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Latest-install index ──────────────────────────────────────────────

  /// The update event with the greatest id for a (host, package) pair,
  /// resolved through the index.
  fn installed_release(
    &self,
    host_id: i64,
    package_id: i64,
  ) -> impl Future<Output = Result<Option<UpdateEvent>>> + Send + '_;

  /// Recompute the index entry for one pair over exactly that pair's
  /// update events. Idempotent and atomic per key.
  fn refresh_installed_release(
    &self,
    host_id: i64,
    package_id: i64,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Drop the index row for a pair. A no-op if none exists.
  fn remove_installed_release(
    &self,
    host_id: i64,
    package_id: i64,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// One read pass over a host's installed-release rows, joined with
  /// package attributes and the reported release at query time. A
  /// materialized snapshot: finite, restartable by calling again.
  fn host_inventory(
    &self,
    host_id: i64,
  ) -> impl Future<Output = Result<Vec<HostPackage>>> + Send + '_;

  /// The resolved inventory entry for a single (host, package) pair.
  fn host_package(
    &self,
    host_id: i64,
    package_id: i64,
  ) -> impl Future<Output = Result<Option<HostPackage>>> + Send + '_;

  // ── Rebuild ───────────────────────────────────────────────────────────

  /// Reconstruct both indexes from the logs in one atomic step: readers
  /// observe either the old index or the new one, never a mixture. On
  /// failure the previous index is untouched and `RebuildInterrupted` is
  /// returned; retrying is always safe.
  fn rebuild_indexes(&self) -> impl Future<Output = Result<()>> + Send + '_;

  /// When the indexes were last rebuilt, if ever. The only freshness
  /// signal this store exposes.
  fn last_rebuild(
    &self,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>>> + Send + '_;

  // ── Reports ───────────────────────────────────────────────────────────

  /// Every (host, package) whose installed release differs from the
  /// package's current release. Drives remediation scheduling.
  fn outdated_hosts(
    &self,
  ) -> impl Future<Output = Result<Vec<OutdatedInstall>>> + Send + '_;
}
