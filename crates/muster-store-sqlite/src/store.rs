//! [`SqliteStore`] — the SQLite implementation of [`InventoryStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use muster_core::{
  Error, Result,
  event::{NewReleaseEvent, NewUpdateEvent, ReleaseEvent, UpdateEvent},
  host::{Host, NewHost},
  package::{NewPackage, Package, PackageContents, PackageKind},
  store::InventoryStore,
  view::{HostPackage, OutdatedInstall},
};
use rusqlite::OptionalExtension as _;

use crate::{
  encode::{
    RawHost, RawHostPackage, RawOutdatedInstall, RawPackage, RawReleaseEvent,
    RawUpdateEvent, decode_dt, encode_dt,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Muster inventory store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All calls
/// queue onto one dedicated database thread, so every store operation runs
/// to completion before the next begins; per-key refresh atomicity follows
/// from that serialization plus the per-operation transactions below.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(Error::storage)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(Error::storage)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
      .map_err(Error::storage)
  }
}

// ─── Row mappers ─────────────────────────────────────────────────────────────

fn package_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPackage> {
  Ok(RawPackage {
    package_id: row.get(0)?,
    name:       row.get(1)?,
    kind:       row.get(2)?,
    contents:   row.get(3)?,
  })
}

fn host_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawHost> {
  Ok(RawHost {
    host_id:      row.get(0)?,
    name:         row.get(1)?,
    domain:       row.get(2)?,
    os_name:      row.get(3)?,
    os_version:   row.get(4)?,
    dist_name:    row.get(5)?,
    dist_version: row.get(6)?,
    last_checkin: row.get(7)?,
    last_update:  row.get(8)?,
  })
}

fn release_from_row(
  row: &rusqlite::Row<'_>,
  base: usize,
) -> rusqlite::Result<RawReleaseEvent> {
  Ok(RawReleaseEvent {
    event_id:    row.get(base)?,
    package_id:  row.get(base + 1)?,
    version:     row.get(base + 2)?,
    kind:        row.get(base + 3)?,
    occurred_at: row.get(base + 4)?,
    repository:  row.get(base + 5)?,
  })
}

fn update_from_row(
  row: &rusqlite::Row<'_>,
  base: usize,
) -> rusqlite::Result<RawUpdateEvent> {
  Ok(RawUpdateEvent {
    event_id:    row.get(base)?,
    host_id:     row.get(base + 1)?,
    package_id:  row.get(base + 2)?,
    release_id:  row.get(base + 3)?,
    observed_at: row.get(base + 4)?,
  })
}

// ─── In-transaction refresh helpers ──────────────────────────────────────────

/// Recompute the current-release pointer for one package: greatest event id
/// wins; an empty history drops the row. Runs inside the caller's
/// transaction so the read-max-then-write pair commits as one step.
fn refresh_current_release_tx(
  tx: &rusqlite::Transaction<'_>,
  package_id: i64,
) -> rusqlite::Result<()> {
  let max: Option<i64> = tx.query_row(
    "SELECT MAX(event_id) FROM release_events WHERE package_id = ?1",
    [package_id],
    |row| row.get(0),
  )?;
  match max {
    Some(release_id) => {
      tx.execute(
        "INSERT INTO current_releases (package_id, release_id)
         VALUES (?1, ?2)
         ON CONFLICT(package_id) DO UPDATE SET release_id = excluded.release_id",
        [package_id, release_id],
      )?;
    }
    None => {
      tx.execute(
        "DELETE FROM current_releases WHERE package_id = ?1",
        [package_id],
      )?;
    }
  }
  Ok(())
}

/// Same recomputation for one (host, package) pair of the install index.
fn refresh_installed_release_tx(
  tx: &rusqlite::Transaction<'_>,
  host_id: i64,
  package_id: i64,
) -> rusqlite::Result<()> {
  let max: Option<i64> = tx.query_row(
    "SELECT MAX(event_id) FROM update_events
     WHERE host_id = ?1 AND package_id = ?2",
    [host_id, package_id],
    |row| row.get(0),
  )?;
  match max {
    Some(update_id) => {
      tx.execute(
        "INSERT INTO installed_releases (host_id, package_id, update_id)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(host_id, package_id) DO UPDATE SET update_id = excluded.update_id",
        [host_id, package_id, update_id],
      )?;
    }
    None => {
      tx.execute(
        "DELETE FROM installed_releases WHERE host_id = ?1 AND package_id = ?2",
        [host_id, package_id],
      )?;
    }
  }
  Ok(())
}

const HOST_COLUMNS: &str = "host_id, name, domain, os_name, os_version, \
                            dist_name, dist_version, last_checkin, last_update";

// ─── InventoryStore impl ─────────────────────────────────────────────────────

impl InventoryStore for SqliteStore {
  // ── Packages ──────────────────────────────────────────────────────────────

  async fn add_package(&self, input: NewPackage) -> Result<Package> {
    // Friendly error first; the UNIQUE constraint backstops races.
    if self
      .find_package(&input.name, input.kind, &input.contents)
      .await?
      .is_some()
    {
      return Err(Error::DuplicatePackage { name: input.name });
    }

    let name = input.name.clone();
    let kind = input.kind.as_str();
    let contents = input.contents.to_string();

    let package_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO packages (name, kind, contents) VALUES (?1, ?2, ?3)",
          rusqlite::params![name, kind, contents],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await
      .map_err(Error::storage)?;

    Ok(Package {
      package_id,
      name: input.name,
      kind: input.kind,
      contents: input.contents,
    })
  }

  async fn get_package(&self, package_id: i64) -> Result<Option<Package>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT package_id, name, kind, contents FROM packages
               WHERE package_id = ?1",
              [package_id],
              package_from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::storage)?;

    raw.map(RawPackage::into_package).transpose()
  }

  async fn find_package(
    &self,
    name: &str,
    kind: PackageKind,
    contents: &PackageContents,
  ) -> Result<Option<Package>> {
    let name = name.to_owned();
    let kind = kind.as_str();
    let contents = contents.to_string();

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT package_id, name, kind, contents FROM packages
               WHERE name = ?1 AND kind = ?2 AND contents = ?3",
              rusqlite::params![name, kind, contents],
              package_from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::storage)?;

    raw.map(RawPackage::into_package).transpose()
  }

  async fn list_packages(&self) -> Result<Vec<Package>> {
    let raws: Vec<RawPackage> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT package_id, name, kind, contents FROM packages ORDER BY name",
        )?;
        let rows = stmt
          .query_map([], package_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::storage)?;

    raws.into_iter().map(RawPackage::into_package).collect()
  }

  async fn delete_package(&self, package_id: i64) -> Result<()> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM packages WHERE package_id = ?1",
          [package_id],
        )?)
      })
      .await
      .map_err(Error::storage)?;

    if changed == 0 {
      return Err(Error::NoSuchPackage(package_id));
    }
    tracing::debug!(package_id, "package deleted with history and index rows");
    Ok(())
  }

  // ── Hosts ─────────────────────────────────────────────────────────────────

  async fn add_host(&self, input: NewHost) -> Result<Host> {
    if self.find_host(&input.name, &input.domain).await?.is_some() {
      return Err(Error::DuplicateHost {
        name:   input.name,
        domain: input.domain,
      });
    }

    let row = input.clone();
    let checkin = input.last_checkin.map(encode_dt);

    let host_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO hosts (name, domain, os_name, os_version,
                              dist_name, dist_version, last_checkin)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            row.name,
            row.domain,
            row.os_name,
            row.os_version,
            row.dist_name,
            row.dist_version,
            checkin,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await
      .map_err(Error::storage)?;

    Ok(Host {
      host_id,
      name: input.name,
      domain: input.domain,
      os_name: input.os_name,
      os_version: input.os_version,
      dist_name: input.dist_name,
      dist_version: input.dist_version,
      last_checkin: input.last_checkin,
      last_update: None,
    })
  }

  async fn get_host(&self, host_id: i64) -> Result<Option<Host>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {HOST_COLUMNS} FROM hosts WHERE host_id = ?1"),
              [host_id],
              host_from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::storage)?;

    raw.map(RawHost::into_host).transpose()
  }

  async fn find_host(&self, name: &str, domain: &str) -> Result<Option<Host>> {
    let name = name.to_owned();
    let domain = domain.to_owned();

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {HOST_COLUMNS} FROM hosts WHERE name = ?1 AND domain = ?2"
              ),
              rusqlite::params![name, domain],
              host_from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::storage)?;

    raw.map(RawHost::into_host).transpose()
  }

  async fn list_hosts(&self) -> Result<Vec<Host>> {
    let raws: Vec<RawHost> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {HOST_COLUMNS} FROM hosts ORDER BY domain, name"
        ))?;
        let rows = stmt
          .query_map([], host_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::storage)?;

    raws.into_iter().map(RawHost::into_host).collect()
  }

  async fn delete_host(&self, host_id: i64) -> Result<()> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM hosts WHERE host_id = ?1", [host_id])?)
      })
      .await
      .map_err(Error::storage)?;

    if changed == 0 {
      return Err(Error::NoSuchHost(host_id));
    }
    tracing::debug!(host_id, "host deleted with history and index rows");
    Ok(())
  }

  async fn record_checkin(&self, host_id: i64, at: DateTime<Utc>) -> Result<()> {
    let at = encode_dt(at);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE hosts SET last_checkin = ?1 WHERE host_id = ?2",
          rusqlite::params![at, host_id],
        )?)
      })
      .await
      .map_err(Error::storage)?;

    if changed == 0 {
      return Err(Error::NoSuchHost(host_id));
    }
    Ok(())
  }

  async fn record_host_update(
    &self,
    host_id: i64,
    at: DateTime<Utc>,
  ) -> Result<()> {
    let at = encode_dt(at);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE hosts SET last_update = ?1 WHERE host_id = ?2",
          rusqlite::params![at, host_id],
        )?)
      })
      .await
      .map_err(Error::storage)?;

    if changed == 0 {
      return Err(Error::NoSuchHost(host_id));
    }
    Ok(())
  }

  async fn clear_host_history(&self, host_id: i64) -> Result<()> {
    if self.get_host(host_id).await?.is_none() {
      return Err(Error::NoSuchHost(host_id));
    }

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM installed_releases WHERE host_id = ?1",
          [host_id],
        )?;
        tx.execute("DELETE FROM update_events WHERE host_id = ?1", [host_id])?;
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Error::storage)?;

    tracing::debug!(host_id, "host update history cleared");
    Ok(())
  }

  // ── Event logs — append-only writes ───────────────────────────────────────

  async fn append_release(&self, input: NewReleaseEvent) -> Result<ReleaseEvent> {
    // Friendly error before any mutation; the FK constraint backstops races.
    if self.get_package(input.package_id).await?.is_none() {
      return Err(Error::NoSuchPackage(input.package_id));
    }

    let package_id = input.package_id;
    let version = input.version.clone();
    let kind = input.kind.as_str();
    let occurred_at = encode_dt(input.occurred_at);
    let repository = input.repository.clone();

    let event_id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO release_events (package_id, version, kind, occurred_at, repository)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![package_id, version, kind, occurred_at, repository],
        )?;
        let event_id = tx.last_insert_rowid();
        refresh_current_release_tx(&tx, package_id)?;
        tx.commit()?;
        Ok(event_id)
      })
      .await
      .map_err(Error::storage)?;

    tracing::debug!(package_id, event_id, "release event appended");
    Ok(ReleaseEvent {
      event_id,
      package_id,
      version: input.version,
      kind: input.kind,
      occurred_at: input.occurred_at,
      repository: input.repository,
    })
  }

  async fn append_update(&self, input: NewUpdateEvent) -> Result<UpdateEvent> {
    let NewUpdateEvent { host_id, package_id, release_id, observed_at } = input;

    let (host_ok, package_ok, release_package): (bool, bool, Option<i64>) = self
      .conn
      .call(move |conn| {
        let host_ok: bool = conn
          .query_row("SELECT 1 FROM hosts WHERE host_id = ?1", [host_id], |_| {
            Ok(true)
          })
          .optional()?
          .unwrap_or(false);
        let package_ok: bool = conn
          .query_row(
            "SELECT 1 FROM packages WHERE package_id = ?1",
            [package_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        let release_package: Option<i64> = conn
          .query_row(
            "SELECT package_id FROM release_events WHERE event_id = ?1",
            [release_id],
            |row| row.get(0),
          )
          .optional()?;
        Ok((host_ok, package_ok, release_package))
      })
      .await
      .map_err(Error::storage)?;

    if !host_ok {
      return Err(Error::NoSuchHost(host_id));
    }
    if !package_ok {
      return Err(Error::NoSuchPackage(package_id));
    }
    let actual = release_package.ok_or(Error::NoSuchRelease(release_id))?;
    if actual != package_id {
      return Err(Error::ReleasePackageMismatch {
        release_id,
        claimed: package_id,
        actual,
      });
    }

    let observed_str = encode_dt(observed_at);
    let event_id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO update_events (host_id, package_id, release_id, observed_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![host_id, package_id, release_id, observed_str],
        )?;
        let event_id = tx.last_insert_rowid();
        refresh_installed_release_tx(&tx, host_id, package_id)?;
        tx.commit()?;
        Ok(event_id)
      })
      .await
      .map_err(Error::storage)?;

    tracing::debug!(host_id, package_id, event_id, "update event appended");
    Ok(UpdateEvent { event_id, host_id, package_id, release_id, observed_at })
  }

  async fn release(&self, event_id: i64) -> Result<Option<ReleaseEvent>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT event_id, package_id, version, kind, occurred_at, repository
               FROM release_events WHERE event_id = ?1",
              [event_id],
              |row| release_from_row(row, 0),
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::storage)?;

    raw.map(RawReleaseEvent::into_release_event).transpose()
  }

  async fn update(&self, event_id: i64) -> Result<Option<UpdateEvent>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT event_id, host_id, package_id, release_id, observed_at
               FROM update_events WHERE event_id = ?1",
              [event_id],
              |row| update_from_row(row, 0),
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::storage)?;

    raw.map(RawUpdateEvent::into_update_event).transpose()
  }

  async fn release_history(&self, package_id: i64) -> Result<Vec<ReleaseEvent>> {
    let raws: Vec<RawReleaseEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, package_id, version, kind, occurred_at, repository
           FROM release_events WHERE package_id = ?1 ORDER BY event_id",
        )?;
        let rows = stmt
          .query_map([package_id], |row| release_from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::storage)?;

    raws
      .into_iter()
      .map(RawReleaseEvent::into_release_event)
      .collect()
  }

  async fn update_history(
    &self,
    host_id: i64,
    package_id: i64,
  ) -> Result<Vec<UpdateEvent>> {
    let raws: Vec<RawUpdateEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, host_id, package_id, release_id, observed_at
           FROM update_events
           WHERE host_id = ?1 AND package_id = ?2 ORDER BY event_id",
        )?;
        let rows = stmt
          .query_map([host_id, package_id], |row| update_from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::storage)?;

    raws
      .into_iter()
      .map(RawUpdateEvent::into_update_event)
      .collect()
  }

  async fn delete_release(&self, event_id: i64) -> Result<()> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM release_events WHERE event_id = ?1",
          [event_id],
        )?)
      })
      .await
      .map_err(Error::storage)?;

    if changed == 0 {
      return Err(Error::NoSuchRelease(event_id));
    }
    tracing::debug!(event_id, "release event deleted");
    Ok(())
  }

  // ── Latest-release index ──────────────────────────────────────────────────

  async fn current_release(&self, package_id: i64) -> Result<Option<ReleaseEvent>> {
    let row: Option<(i64, Option<RawReleaseEvent>)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT cr.release_id,
                      re.event_id, re.package_id, re.version, re.kind,
                      re.occurred_at, re.repository
               FROM current_releases cr
               LEFT JOIN release_events re ON re.event_id = cr.release_id
               WHERE cr.package_id = ?1",
              [package_id],
              |row| {
                let pointer: i64 = row.get(0)?;
                let resolved: Option<i64> = row.get(1)?;
                let raw = match resolved {
                  Some(_) => Some(release_from_row(row, 1)?),
                  None => None,
                };
                Ok((pointer, raw))
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::storage)?;

    match row {
      None => Ok(None),
      Some((release_id, None)) => {
        tracing::warn!(
          package_id,
          release_id,
          "current-release row points at a missing event"
        );
        Err(Error::StaleReleaseIndex { package_id, release_id })
      }
      Some((_, Some(raw))) => Ok(Some(raw.into_release_event()?)),
    }
  }

  async fn refresh_current_release(&self, package_id: i64) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        refresh_current_release_tx(&tx, package_id)?;
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Error::storage)
  }

  async fn remove_current_release(&self, package_id: i64) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM current_releases WHERE package_id = ?1",
          [package_id],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::storage)
  }

  // ── Latest-install index ──────────────────────────────────────────────────

  async fn installed_release(
    &self,
    host_id: i64,
    package_id: i64,
  ) -> Result<Option<UpdateEvent>> {
    let row: Option<(i64, Option<RawUpdateEvent>)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT ir.update_id,
                      ue.event_id, ue.host_id, ue.package_id, ue.release_id,
                      ue.observed_at
               FROM installed_releases ir
               LEFT JOIN update_events ue ON ue.event_id = ir.update_id
               WHERE ir.host_id = ?1 AND ir.package_id = ?2",
              [host_id, package_id],
              |row| {
                let pointer: i64 = row.get(0)?;
                let resolved: Option<i64> = row.get(1)?;
                let raw = match resolved {
                  Some(_) => Some(update_from_row(row, 1)?),
                  None => None,
                };
                Ok((pointer, raw))
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::storage)?;

    match row {
      None => Ok(None),
      Some((update_id, None)) => {
        tracing::warn!(
          host_id,
          package_id,
          update_id,
          "installed-release row points at a missing event"
        );
        Err(Error::StaleInstallIndex { host_id, package_id, update_id })
      }
      Some((_, Some(raw))) => Ok(Some(raw.into_update_event()?)),
    }
  }

  async fn refresh_installed_release(
    &self,
    host_id: i64,
    package_id: i64,
  ) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        refresh_installed_release_tx(&tx, host_id, package_id)?;
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Error::storage)
  }

  async fn remove_installed_release(
    &self,
    host_id: i64,
    package_id: i64,
  ) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM installed_releases WHERE host_id = ?1 AND package_id = ?2",
          [host_id, package_id],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::storage)
  }

  async fn host_inventory(&self, host_id: i64) -> Result<Vec<HostPackage>> {
    let raws: Vec<RawHostPackage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT p.package_id, p.name, p.kind, p.contents,
                  ir.update_id,
                  ue.event_id, ue.host_id, ue.package_id, ue.release_id,
                  ue.observed_at,
                  re.event_id, re.package_id, re.version, re.kind,
                  re.occurred_at, re.repository
           FROM installed_releases ir
           JOIN packages p             ON p.package_id = ir.package_id
           LEFT JOIN update_events ue  ON ue.event_id  = ir.update_id
           LEFT JOIN release_events re ON re.event_id  = ue.release_id
           WHERE ir.host_id = ?1
           ORDER BY p.name",
        )?;
        let rows = stmt
          .query_map([host_id], host_package_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::storage)?;

    raws
      .into_iter()
      .map(|raw| raw.into_host_package(host_id))
      .collect()
  }

  async fn host_package(
    &self,
    host_id: i64,
    package_id: i64,
  ) -> Result<Option<HostPackage>> {
    let raw: Option<RawHostPackage> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT p.package_id, p.name, p.kind, p.contents,
                      ir.update_id,
                      ue.event_id, ue.host_id, ue.package_id, ue.release_id,
                      ue.observed_at,
                      re.event_id, re.package_id, re.version, re.kind,
                      re.occurred_at, re.repository
               FROM installed_releases ir
               JOIN packages p             ON p.package_id = ir.package_id
               LEFT JOIN update_events ue  ON ue.event_id  = ir.update_id
               LEFT JOIN release_events re ON re.event_id  = ue.release_id
               WHERE ir.host_id = ?1 AND ir.package_id = ?2",
              [host_id, package_id],
              host_package_from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::storage)?;

    raw.map(|raw| raw.into_host_package(host_id)).transpose()
  }

  // ── Rebuild ───────────────────────────────────────────────────────────────

  async fn rebuild_indexes(&self) -> Result<()> {
    let stamp = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM current_releases", [])?;
        tx.execute(
          "INSERT INTO current_releases (package_id, release_id)
           SELECT package_id, MAX(event_id)
           FROM release_events GROUP BY package_id",
          [],
        )?;
        tx.execute("DELETE FROM installed_releases", [])?;
        tx.execute(
          "INSERT INTO installed_releases (host_id, package_id, update_id)
           SELECT host_id, package_id, MAX(event_id)
           FROM update_events GROUP BY host_id, package_id",
          [],
        )?;
        tx.execute(
          "INSERT INTO index_state (id, last_rebuild_at) VALUES (1, ?1)
           ON CONFLICT(id) DO UPDATE SET last_rebuild_at = excluded.last_rebuild_at",
          rusqlite::params![stamp],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(|e| Error::RebuildInterrupted(Box::new(e)))?;

    tracing::info!("index rebuild complete");
    Ok(())
  }

  async fn last_rebuild(&self) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT last_rebuild_at FROM index_state WHERE id = 1",
              [],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::storage)?;

    raw.as_deref().map(decode_dt).transpose()
  }

  // ── Reports ───────────────────────────────────────────────────────────────

  async fn outdated_hosts(&self) -> Result<Vec<OutdatedInstall>> {
    let raws: Vec<RawOutdatedInstall> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT h.host_id, h.name, h.domain, h.os_name, h.os_version,
                  h.dist_name, h.dist_version, h.last_checkin, h.last_update,
                  p.package_id, p.name, p.kind, p.contents,
                  ri.event_id, ri.package_id, ri.version, ri.kind,
                  ri.occurred_at, ri.repository,
                  rc.event_id, rc.package_id, rc.version, rc.kind,
                  rc.occurred_at, rc.repository
           FROM installed_releases ir
           JOIN current_releases cr ON cr.package_id = ir.package_id
           JOIN update_events ue    ON ue.event_id   = ir.update_id
           JOIN release_events ri   ON ri.event_id   = ue.release_id
           JOIN release_events rc   ON rc.event_id   = cr.release_id
           JOIN hosts h             ON h.host_id     = ir.host_id
           JOIN packages p          ON p.package_id  = ir.package_id
           WHERE ue.release_id != cr.release_id
           ORDER BY h.domain, h.name, p.name",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawOutdatedInstall {
              host:      host_from_row(row)?,
              package:   RawPackage {
                package_id: row.get(9)?,
                name:       row.get(10)?,
                kind:       row.get(11)?,
                contents:   row.get(12)?,
              },
              installed: release_from_row(row, 13)?,
              current:   release_from_row(row, 19)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::storage)?;

    raws
      .into_iter()
      .map(RawOutdatedInstall::into_outdated)
      .collect()
  }
}

/// Map one row of the inventory join (package, pointer, update, release).
fn host_package_from_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<RawHostPackage> {
  let package = package_from_row(row)?;
  let update_pointer: i64 = row.get(4)?;
  let update_resolved: Option<i64> = row.get(5)?;
  let update = match update_resolved {
    Some(_) => Some(update_from_row(row, 5)?),
    None => None,
  };
  let release_resolved: Option<i64> = row.get(10)?;
  let release = match release_resolved {
    Some(_) => Some(release_from_row(row, 10)?),
    None => None,
  };
  Ok(RawHostPackage { package, update_pointer, update, release })
}
