//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Enum discriminants reuse
//! the `as_str`/`FromStr` codecs defined alongside the core types. Ids are
//! native `INTEGER` columns and need no translation.

use chrono::{DateTime, Utc};
use muster_core::{
  Error, Result,
  event::{ReleaseEvent, UpdateEvent},
  host::Host,
  package::Package,
  view::{HostPackage, OutdatedInstall},
};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Malformed(format!("bad timestamp {s:?}: {e}")))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw columns of a `packages` row.
pub struct RawPackage {
  pub package_id: i64,
  pub name:       String,
  pub kind:       String,
  pub contents:   String,
}

impl RawPackage {
  pub fn into_package(self) -> Result<Package> {
    Ok(Package {
      package_id: self.package_id,
      name:       self.name,
      kind:       self.kind.parse()?,
      contents:   self.contents.parse()?,
    })
  }
}

/// Raw columns of a `hosts` row.
pub struct RawHost {
  pub host_id:      i64,
  pub name:         String,
  pub domain:       String,
  pub os_name:      String,
  pub os_version:   String,
  pub dist_name:    String,
  pub dist_version: String,
  pub last_checkin: Option<String>,
  pub last_update:  Option<String>,
}

impl RawHost {
  pub fn into_host(self) -> Result<Host> {
    Ok(Host {
      host_id:      self.host_id,
      name:         self.name,
      domain:       self.domain,
      os_name:      self.os_name,
      os_version:   self.os_version,
      dist_name:    self.dist_name,
      dist_version: self.dist_version,
      last_checkin: decode_opt_dt(self.last_checkin.as_deref())?,
      last_update:  decode_opt_dt(self.last_update.as_deref())?,
    })
  }
}

/// Raw columns of a `release_events` row.
pub struct RawReleaseEvent {
  pub event_id:    i64,
  pub package_id:  i64,
  pub version:     String,
  pub kind:        String,
  pub occurred_at: String,
  pub repository:  Option<String>,
}

impl RawReleaseEvent {
  pub fn into_release_event(self) -> Result<ReleaseEvent> {
    Ok(ReleaseEvent {
      event_id:    self.event_id,
      package_id:  self.package_id,
      version:     self.version,
      kind:        self.kind.parse()?,
      occurred_at: decode_dt(&self.occurred_at)?,
      repository:  self.repository,
    })
  }
}

/// Raw columns of an `update_events` row.
pub struct RawUpdateEvent {
  pub event_id:    i64,
  pub host_id:     i64,
  pub package_id:  i64,
  pub release_id:  i64,
  pub observed_at: String,
}

impl RawUpdateEvent {
  pub fn into_update_event(self) -> Result<UpdateEvent> {
    Ok(UpdateEvent {
      event_id:    self.event_id,
      host_id:     self.host_id,
      package_id:  self.package_id,
      release_id:  self.release_id,
      observed_at: decode_dt(&self.observed_at)?,
    })
  }
}

/// One `installed_releases` row joined (LEFT) with its winning update event
/// and the release that event reported. The pointer is kept separately so a
/// dangling row can be reported precisely.
pub struct RawHostPackage {
  pub package:        RawPackage,
  pub update_pointer: i64,
  pub update:         Option<RawUpdateEvent>,
  pub release:        Option<RawReleaseEvent>,
}

impl RawHostPackage {
  pub fn into_host_package(self, host_id: i64) -> Result<HostPackage> {
    let package_id = self.package.package_id;
    let (Some(update), Some(release)) = (self.update, self.release) else {
      return Err(Error::StaleInstallIndex {
        host_id,
        package_id,
        update_id: self.update_pointer,
      });
    };
    Ok(HostPackage {
      package: self.package.into_package()?,
      update:  update.into_update_event()?,
      release: release.into_release_event()?,
    })
  }
}

/// One row of the outdated-hosts report join.
pub struct RawOutdatedInstall {
  pub host:      RawHost,
  pub package:   RawPackage,
  pub installed: RawReleaseEvent,
  pub current:   RawReleaseEvent,
}

impl RawOutdatedInstall {
  pub fn into_outdated(self) -> Result<OutdatedInstall> {
    Ok(OutdatedInstall {
      host:      self.host.into_host()?,
      package:   self.package.into_package()?,
      installed: self.installed.into_release_event()?,
      current:   self.current.into_release_event()?,
    })
  }
}
