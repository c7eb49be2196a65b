//! Host identity and check-in bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A managed machine. `(name, domain)` is unique. The check-in stamps are
/// maintained by collectors through the dedicated store operations, never
/// derived from the event logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
  pub host_id:      i64,
  pub name:         String,
  pub domain:       String,
  pub os_name:      String,
  pub os_version:   String,
  pub dist_name:    String,
  pub dist_version: String,
  /// Last time the host phoned home.
  pub last_checkin: Option<DateTime<Utc>>,
  /// Last time a remediation run completed against the host.
  pub last_update:  Option<DateTime<Utc>>,
}

/// Input to [`crate::store::InventoryStore::add_host`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHost {
  pub name:         String,
  pub domain:       String,
  pub os_name:      String,
  pub os_version:   String,
  pub dist_name:    String,
  pub dist_version: String,
  /// Registration usually carries the first check-in time.
  #[serde(default)]
  pub last_checkin: Option<DateTime<Utc>>,
}
