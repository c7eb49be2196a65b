//! Resolved read models — computed on read by joining the derived indexes
//! back to the logs and identity tables, never stored.
//!
//! The index rows themselves hold only identifiers, so descriptive host and
//! package attributes in these views always reflect the latest state even
//! when the winning event is old.

use serde::{Deserialize, Serialize};

use crate::{
  event::{ReleaseEvent, UpdateEvent},
  host::Host,
  package::Package,
};

/// One entry of a host's inventory: the package, the winning update event
/// for the (host, package) pair, and the release that event reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostPackage {
  pub package: Package,
  pub update:  UpdateEvent,
  pub release: ReleaseEvent,
}

/// A host running a release other than the package's current one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutdatedInstall {
  pub host:      Host,
  pub package:   Package,
  /// What the host was last observed running.
  pub installed: ReleaseEvent,
  /// What the package's release log says is current.
  pub current:   ReleaseEvent,
}
