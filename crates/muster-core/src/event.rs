//! Event types — the append-only units of the two inventory logs.
//!
//! Events are never updated. Recency is always judged by `event_id`, which
//! the store assigns in strictly increasing insertion order; the carried
//! timestamps are collector-reported observations and may arrive out of
//! order across machines with skewed clocks.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── ReleaseKind ─────────────────────────────────────────────────────────────

/// What happened to a package in its repository.
///
/// `Provisional` marks a version first observed running on a host before the
/// repository scan confirmed it; a later repository event supersedes it by
/// plain id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
  Added,
  Updated,
  Removed,
  Provisional,
}

impl ReleaseKind {
  /// The discriminant string stored in the `kind` column.
  /// Must match the `rename_all = "lowercase"` serde tags above.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Added => "added",
      Self::Updated => "updated",
      Self::Removed => "removed",
      Self::Provisional => "provisional",
    }
  }
}

impl FromStr for ReleaseKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "added" => Ok(Self::Added),
      "updated" => Ok(Self::Updated),
      "removed" => Ok(Self::Removed),
      "provisional" => Ok(Self::Provisional),
      other => Err(Error::Malformed(format!("unknown release kind: {other:?}"))),
    }
  }
}

impl fmt::Display for ReleaseKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── ReleaseEvent ────────────────────────────────────────────────────────────

/// An immutable record of a package reaching a particular version,
/// independent of any host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseEvent {
  pub event_id:    i64,
  pub package_id:  i64,
  pub version:     String,
  pub kind:        ReleaseKind,
  /// Collector-reported time of the repository change. Informational only;
  /// never used for ordering.
  pub occurred_at: DateTime<Utc>,
  /// Origin repository, when the event came from a repository scan.
  pub repository:  Option<String>,
}

/// Input to [`crate::store::InventoryStore::append_release`].
/// The id is always assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReleaseEvent {
  pub package_id:  i64,
  pub version:     String,
  pub kind:        ReleaseKind,
  pub occurred_at: DateTime<Utc>,
  #[serde(default)]
  pub repository:  Option<String>,
}

// ─── UpdateEvent ─────────────────────────────────────────────────────────────

/// An immutable record that a specific host was observed running a specific
/// release of a package at a specific time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEvent {
  pub event_id:    i64,
  pub host_id:     i64,
  pub package_id:  i64,
  /// The release event describing the version the host was running.
  /// Its package must match `package_id`.
  pub release_id:  i64,
  pub observed_at: DateTime<Utc>,
}

/// Input to [`crate::store::InventoryStore::append_update`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUpdateEvent {
  pub host_id:     i64,
  pub package_id:  i64,
  pub release_id:  i64,
  pub observed_at: DateTime<Utc>,
}
