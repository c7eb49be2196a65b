//! Error types for `muster-core`.
//!
//! The taxonomy is part of the store contract: callers distinguish missing
//! references, uniqueness violations, index staleness, and interrupted
//! rebuilds, so the [`crate::store::InventoryStore`] trait fixes this error
//! type rather than leaving it backend-defined.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("package {0} does not exist")]
  NoSuchPackage(i64),

  #[error("host {0} does not exist")]
  NoSuchHost(i64),

  #[error("release event {0} does not exist")]
  NoSuchRelease(i64),

  #[error("update event {0} does not exist")]
  NoSuchUpdate(i64),

  #[error("package {name:?} already exists with the same kind and contents")]
  DuplicatePackage { name: String },

  #[error("host {name:?} already exists on domain {domain:?}")]
  DuplicateHost { name: String, domain: String },

  #[error(
    "release event {release_id} belongs to package {actual}, not package {claimed}"
  )]
  ReleasePackageMismatch {
    release_id: i64,
    claimed:    i64,
    actual:     i64,
  },

  /// The current-release row for a package points at a release event that no
  /// longer exists. Not repaired on the read path; run a rebuild.
  #[error(
    "current-release row for package {package_id} points at missing release \
     event {release_id}; rebuild required"
  )]
  StaleReleaseIndex { package_id: i64, release_id: i64 },

  /// The installed-release row for a (host, package) pair points at an update
  /// event that no longer exists. Not repaired on the read path; run a rebuild.
  #[error(
    "installed-release row for host {host_id}, package {package_id} points at \
     missing update event {update_id}; rebuild required"
  )]
  StaleInstallIndex {
    host_id:    i64,
    package_id: i64,
    update_id:  i64,
  },

  /// A rebuild did not complete. The previous index was left untouched and
  /// remains authoritative; the rebuild may be retried.
  #[error("index rebuild interrupted; the previous index remains authoritative")]
  RebuildInterrupted(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// A stored or submitted value could not be parsed into its domain type.
  #[error("malformed value: {0}")]
  Malformed(String),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend fault (I/O, SQL, pool) as a [`Error::Storage`].
  pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(source))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
