//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{TimeZone, Utc};
use muster_core::{
  Error,
  event::{NewReleaseEvent, NewUpdateEvent, ReleaseKind},
  host::NewHost,
  package::{NewPackage, PackageContents, PackageKind},
  store::InventoryStore,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn deb(name: &str) -> NewPackage {
  NewPackage {
    name:     name.into(),
    kind:     PackageKind::Deb,
    contents: PackageContents::Binary { arch: "amd64".into() },
  }
}

fn host(name: &str) -> NewHost {
  NewHost {
    name:         name.into(),
    domain:       "example.net".into(),
    os_name:      "Linux".into(),
    os_version:   "6.8".into(),
    dist_name:    "Debian".into(),
    dist_version: "12".into(),
    last_checkin: None,
  }
}

fn new_release(package_id: i64, version: &str) -> NewReleaseEvent {
  NewReleaseEvent {
    package_id,
    version: version.into(),
    kind: ReleaseKind::Updated,
    occurred_at: Utc::now(),
    repository: Some("main".into()),
  }
}

fn observation(host_id: i64, package_id: i64, release_id: i64) -> NewUpdateEvent {
  NewUpdateEvent {
    host_id,
    package_id,
    release_id,
    observed_at: Utc::now(),
  }
}

/// Run raw SQL against the store, bypassing the public API.
/// Used to forge event ids and to simulate out-of-band corruption.
async fn exec(s: &SqliteStore, sql: String) {
  s.conn
    .call(move |conn| {
      conn.execute_batch(&sql)?;
      Ok(())
    })
    .await
    .expect("raw sql");
}

/// Snapshot the current-release index as (package_id, release_id) pairs.
async fn release_pointers(s: &SqliteStore) -> Vec<(i64, i64)> {
  s.conn
    .call(|conn| {
      let mut stmt = conn.prepare(
        "SELECT package_id, release_id FROM current_releases ORDER BY package_id",
      )?;
      let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await
    .expect("index snapshot")
}

/// Snapshot the install index as (host_id, package_id, update_id) triples.
async fn install_pointers(s: &SqliteStore) -> Vec<(i64, i64, i64)> {
  s.conn
    .call(|conn| {
      let mut stmt = conn.prepare(
        "SELECT host_id, package_id, update_id FROM installed_releases
         ORDER BY host_id, package_id",
      )?;
      let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await
    .expect("index snapshot")
}

// ─── Packages and hosts ──────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_package() {
  let s = store().await;

  let pkg = s.add_package(deb("openssl")).await.unwrap();
  assert_eq!(pkg.name, "openssl");

  let fetched = s.get_package(pkg.package_id).await.unwrap().unwrap();
  assert_eq!(fetched.package_id, pkg.package_id);
  assert_eq!(fetched.kind, PackageKind::Deb);
  assert_eq!(
    fetched.contents,
    PackageContents::Binary { arch: "amd64".into() }
  );
}

#[tokio::test]
async fn get_package_missing_returns_none() {
  let s = store().await;
  assert!(s.get_package(999).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_package_rejected() {
  let s = store().await;
  s.add_package(deb("openssl")).await.unwrap();

  let err = s.add_package(deb("openssl")).await.unwrap_err();
  assert!(matches!(err, Error::DuplicatePackage { .. }));

  // Same name with different contents is a different package.
  let src = NewPackage {
    name:     "openssl".into(),
    kind:     PackageKind::Deb,
    contents: PackageContents::Source,
  };
  s.add_package(src).await.unwrap();
  assert_eq!(s.list_packages().await.unwrap().len(), 2);
}

#[tokio::test]
async fn find_package_by_natural_key() {
  let s = store().await;
  let pkg = s.add_package(deb("nginx")).await.unwrap();

  let found = s
    .find_package(
      "nginx",
      PackageKind::Deb,
      &PackageContents::Binary { arch: "amd64".into() },
    )
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.package_id, pkg.package_id);

  let missing = s
    .find_package("nginx", PackageKind::Rpm, &PackageContents::Source)
    .await
    .unwrap();
  assert!(missing.is_none());
}

#[tokio::test]
async fn add_and_get_host() {
  let s = store().await;
  let h = s.add_host(host("web01")).await.unwrap();

  let fetched = s.get_host(h.host_id).await.unwrap().unwrap();
  assert_eq!(fetched.name, "web01");
  assert_eq!(fetched.domain, "example.net");
  assert!(fetched.last_checkin.is_none());
  assert!(fetched.last_update.is_none());
}

#[tokio::test]
async fn duplicate_host_rejected() {
  let s = store().await;
  s.add_host(host("web01")).await.unwrap();

  let err = s.add_host(host("web01")).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateHost { .. }));
}

#[tokio::test]
async fn checkin_and_update_stamps_persist() {
  let s = store().await;
  let h = s.add_host(host("web01")).await.unwrap();

  let checkin = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
  let updated = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
  s.record_checkin(h.host_id, checkin).await.unwrap();
  s.record_host_update(h.host_id, updated).await.unwrap();

  let fetched = s.get_host(h.host_id).await.unwrap().unwrap();
  assert_eq!(fetched.last_checkin, Some(checkin));
  assert_eq!(fetched.last_update, Some(updated));

  let err = s.record_checkin(999, checkin).await.unwrap_err();
  assert!(matches!(err, Error::NoSuchHost(999)));
}

// ─── Event log appends ───────────────────────────────────────────────────────

#[tokio::test]
async fn append_release_assigns_increasing_ids() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();

  let r1 = s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();
  let r2 = s.append_release(new_release(pkg.package_id, "1.1")).await.unwrap();
  assert!(r2.event_id > r1.event_id);

  let history = s.release_history(pkg.package_id).await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].event_id, r1.event_id);
  assert_eq!(history[1].event_id, r2.event_id);
}

#[tokio::test]
async fn append_release_unknown_package_rejected() {
  let s = store().await;
  let err = s.append_release(new_release(42, "1.0")).await.unwrap_err();
  assert!(matches!(err, Error::NoSuchPackage(42)));
}

#[tokio::test]
async fn append_update_unknown_references_rejected() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  let h = s.add_host(host("web01")).await.unwrap();
  let rel = s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();

  let err = s
    .append_update(observation(999, pkg.package_id, rel.event_id))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NoSuchHost(999)));

  let err = s
    .append_update(observation(h.host_id, 999, rel.event_id))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NoSuchPackage(999)));

  let err = s
    .append_update(observation(h.host_id, pkg.package_id, 999))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NoSuchRelease(999)));

  // Nothing was appended, and no index entry appeared.
  assert!(
    s.installed_release(h.host_id, pkg.package_id)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn append_update_release_package_mismatch_rejected() {
  let s = store().await;
  let pkg_a = s.add_package(deb("openssl")).await.unwrap();
  let pkg_b = s.add_package(deb("nginx")).await.unwrap();
  let h = s.add_host(host("web01")).await.unwrap();
  let rel_a = s.append_release(new_release(pkg_a.package_id, "1.0")).await.unwrap();

  let err = s
    .append_update(observation(h.host_id, pkg_b.package_id, rel_a.event_id))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::ReleasePackageMismatch { claimed, actual, .. }
      if claimed == pkg_b.package_id && actual == pkg_a.package_id
  ));
}

#[tokio::test]
async fn out_of_order_timestamps_accepted() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();

  let mut early = new_release(pkg.package_id, "1.1");
  early.occurred_at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
  let mut late = new_release(pkg.package_id, "1.0.1");
  late.occurred_at = Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap();

  s.append_release(early).await.unwrap();
  let newer = s.append_release(late).await.unwrap();

  // The later append wins even though its timestamp is older.
  let current = s.current_release(pkg.package_id).await.unwrap().unwrap();
  assert_eq!(current.event_id, newer.event_id);
  assert_eq!(current.version, "1.0.1");
}

// ─── Latest-release index ────────────────────────────────────────────────────

#[tokio::test]
async fn current_release_none_without_history() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  assert!(s.current_release(pkg.package_id).await.unwrap().is_none());
}

#[tokio::test]
async fn append_tracks_latest() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();

  s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();
  let r2 = s.append_release(new_release(pkg.package_id, "1.1")).await.unwrap();

  let current = s.current_release(pkg.package_id).await.unwrap().unwrap();
  assert_eq!(current.event_id, r2.event_id);
  assert_eq!(current.version, "1.1");
}

#[tokio::test]
async fn highest_id_wins_regardless_of_insertion_order() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  let pid = pkg.package_id;

  // Forge ids so that id 12 lands in the log *after* id 15, as would happen
  // with a bulk import replaying events out of order.
  exec(
    &s,
    format!(
      "INSERT INTO release_events (event_id, package_id, version, kind, occurred_at, repository)
       VALUES (10, {pid}, '1.0',   'updated', '2024-01-01T00:00:00+00:00', NULL),
              (15, {pid}, '1.1',   'updated', '2024-01-02T00:00:00+00:00', NULL),
              (12, {pid}, '1.0.1', 'updated', '2024-01-03T00:00:00+00:00', NULL);"
    ),
  )
  .await;

  s.refresh_current_release(pid).await.unwrap();

  let current = s.current_release(pid).await.unwrap().unwrap();
  assert_eq!(current.event_id, 15);
  assert_eq!(current.version, "1.1");
}

#[tokio::test]
async fn refresh_is_idempotent() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();

  s.refresh_current_release(pkg.package_id).await.unwrap();
  let first = release_pointers(&s).await;
  s.refresh_current_release(pkg.package_id).await.unwrap();
  let second = release_pointers(&s).await;

  assert_eq!(first, second);
  assert_eq!(first.len(), 1);
}

#[tokio::test]
async fn deleting_winning_release_drops_row_then_refresh_repoints() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  let r1 = s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();
  let r2 = s.append_release(new_release(pkg.package_id, "1.1")).await.unwrap();

  s.delete_release(r2.event_id).await.unwrap();

  // The row disappeared by cascade; it does not silently fall back.
  assert!(s.current_release(pkg.package_id).await.unwrap().is_none());

  s.refresh_current_release(pkg.package_id).await.unwrap();
  let current = s.current_release(pkg.package_id).await.unwrap().unwrap();
  assert_eq!(current.event_id, r1.event_id);
}

#[tokio::test]
async fn deleting_only_release_then_refresh_leaves_no_row() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  let r1 = s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();

  s.delete_release(r1.event_id).await.unwrap();
  s.refresh_current_release(pkg.package_id).await.unwrap();

  assert!(s.current_release(pkg.package_id).await.unwrap().is_none());
  assert!(release_pointers(&s).await.is_empty());
}

#[tokio::test]
async fn delete_release_missing_errors() {
  let s = store().await;
  let err = s.delete_release(7).await.unwrap_err();
  assert!(matches!(err, Error::NoSuchRelease(7)));
}

#[tokio::test]
async fn remove_current_release_drops_row() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();

  s.remove_current_release(pkg.package_id).await.unwrap();
  assert!(s.current_release(pkg.package_id).await.unwrap().is_none());

  // Removing an absent row is a no-op.
  s.remove_current_release(pkg.package_id).await.unwrap();
}

// ─── Latest-install index ────────────────────────────────────────────────────

#[tokio::test]
async fn install_index_tracks_pairs_independently() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  let h1 = s.add_host(host("web01")).await.unwrap();
  let h2 = s.add_host(host("web02")).await.unwrap();

  let r10 = s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();
  let r15 = s.append_release(new_release(pkg.package_id, "1.1")).await.unwrap();

  s.append_update(observation(h1.host_id, pkg.package_id, r10.event_id))
    .await
    .unwrap();
  s.append_update(observation(h1.host_id, pkg.package_id, r15.event_id))
    .await
    .unwrap();
  s.append_update(observation(h2.host_id, pkg.package_id, r10.event_id))
    .await
    .unwrap();

  let on_h1 = s
    .installed_release(h1.host_id, pkg.package_id)
    .await
    .unwrap()
    .unwrap();
  let on_h2 = s
    .installed_release(h2.host_id, pkg.package_id)
    .await
    .unwrap()
    .unwrap();

  assert_eq!(on_h1.release_id, r15.event_id);
  assert_eq!(on_h2.release_id, r10.event_id);
}

#[tokio::test]
async fn refresh_installed_release_recomputes() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  let h = s.add_host(host("web01")).await.unwrap();
  let rel = s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();
  let u1 = s
    .append_update(observation(h.host_id, pkg.package_id, rel.event_id))
    .await
    .unwrap();
  let u2 = s
    .append_update(observation(h.host_id, pkg.package_id, rel.event_id))
    .await
    .unwrap();

  // Corrupt the pointer, then refresh; the true maximum must come back.
  exec(
    &s,
    format!(
      "UPDATE installed_releases SET update_id = {} WHERE host_id = {} AND package_id = {};",
      u1.event_id, h.host_id, pkg.package_id
    ),
  )
  .await;

  s.refresh_installed_release(h.host_id, pkg.package_id)
    .await
    .unwrap();
  let winner = s
    .installed_release(h.host_id, pkg.package_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(winner.event_id, u2.event_id);
}

#[tokio::test]
async fn refresh_installed_release_drops_emptied_pair() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  let h = s.add_host(host("web01")).await.unwrap();
  let rel = s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();
  s.append_update(observation(h.host_id, pkg.package_id, rel.event_id))
    .await
    .unwrap();

  exec(
    &s,
    format!("DELETE FROM update_events WHERE host_id = {};", h.host_id),
  )
  .await;
  s.refresh_installed_release(h.host_id, pkg.package_id)
    .await
    .unwrap();

  assert!(
    s.installed_release(h.host_id, pkg.package_id)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn host_inventory_resolves_attributes_at_read_time() {
  let s = store().await;
  let openssl = s.add_package(deb("openssl")).await.unwrap();
  let nginx = s.add_package(deb("nginx")).await.unwrap();
  let h = s.add_host(host("web01")).await.unwrap();

  let r_ssl = s.append_release(new_release(openssl.package_id, "3.0")).await.unwrap();
  let r_ngx = s.append_release(new_release(nginx.package_id, "1.24")).await.unwrap();
  s.append_update(observation(h.host_id, openssl.package_id, r_ssl.event_id))
    .await
    .unwrap();
  s.append_update(observation(h.host_id, nginx.package_id, r_ngx.event_id))
    .await
    .unwrap();

  let inventory = s.host_inventory(h.host_id).await.unwrap();
  assert_eq!(inventory.len(), 2);

  // Ordered by package name: nginx before openssl.
  assert_eq!(inventory[0].package.name, "nginx");
  assert_eq!(inventory[0].release.version, "1.24");
  assert_eq!(inventory[1].package.name, "openssl");
  assert_eq!(inventory[1].release.version, "3.0");

  let single = s
    .host_package(h.host_id, nginx.package_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(single.release.version, "1.24");

  // Unknown host: empty result, indistinguishable from "no history".
  assert!(s.host_inventory(999).await.unwrap().is_empty());
}

// ─── Cascades ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deleting_package_removes_history_and_index_rows() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  let h = s.add_host(host("web01")).await.unwrap();
  let rel = s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();
  s.append_update(observation(h.host_id, pkg.package_id, rel.event_id))
    .await
    .unwrap();

  s.delete_package(pkg.package_id).await.unwrap();

  assert!(s.get_package(pkg.package_id).await.unwrap().is_none());
  assert!(s.release_history(pkg.package_id).await.unwrap().is_empty());
  assert!(s.current_release(pkg.package_id).await.unwrap().is_none());
  assert!(
    s.installed_release(h.host_id, pkg.package_id)
      .await
      .unwrap()
      .is_none()
  );
  assert!(release_pointers(&s).await.is_empty());
  assert!(install_pointers(&s).await.is_empty());
}

#[tokio::test]
async fn deleting_host_removes_install_rows() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  let h1 = s.add_host(host("web01")).await.unwrap();
  let h2 = s.add_host(host("web02")).await.unwrap();
  let rel = s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();
  s.append_update(observation(h1.host_id, pkg.package_id, rel.event_id))
    .await
    .unwrap();
  s.append_update(observation(h2.host_id, pkg.package_id, rel.event_id))
    .await
    .unwrap();

  s.delete_host(h1.host_id).await.unwrap();

  assert!(
    s.installed_release(h1.host_id, pkg.package_id)
      .await
      .unwrap()
      .is_none()
  );
  // The other host and the release index are untouched.
  assert!(
    s.installed_release(h2.host_id, pkg.package_id)
      .await
      .unwrap()
      .is_some()
  );
  assert!(s.current_release(pkg.package_id).await.unwrap().is_some());
}

#[tokio::test]
async fn deleting_release_cascades_into_dependent_updates() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  let h = s.add_host(host("web01")).await.unwrap();
  let r1 = s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();
  let r2 = s.append_release(new_release(pkg.package_id, "1.1")).await.unwrap();
  s.append_update(observation(h.host_id, pkg.package_id, r2.event_id))
    .await
    .unwrap();

  s.delete_release(r2.event_id).await.unwrap();

  // The update event reporting r2 is gone, and with it the install row.
  assert!(
    s.update_history(h.host_id, pkg.package_id)
      .await
      .unwrap()
      .is_empty()
  );
  assert!(
    s.installed_release(h.host_id, pkg.package_id)
      .await
      .unwrap()
      .is_none()
  );
  // r1 survives in the log.
  assert_eq!(s.release_history(pkg.package_id).await.unwrap().len(), 1);
  assert_eq!(
    s.release_history(pkg.package_id).await.unwrap()[0].event_id,
    r1.event_id
  );
}

#[tokio::test]
async fn clear_host_history_preserves_host() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  let h = s.add_host(host("web01")).await.unwrap();
  let rel = s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();
  s.append_update(observation(h.host_id, pkg.package_id, rel.event_id))
    .await
    .unwrap();

  s.clear_host_history(h.host_id).await.unwrap();

  assert!(s.get_host(h.host_id).await.unwrap().is_some());
  assert!(
    s.update_history(h.host_id, pkg.package_id)
      .await
      .unwrap()
      .is_empty()
  );
  assert!(
    s.installed_release(h.host_id, pkg.package_id)
      .await
      .unwrap()
      .is_none()
  );
}

// ─── Rebuild ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rebuild_matches_incrementally_maintained_indexes() {
  let s = store().await;
  let openssl = s.add_package(deb("openssl")).await.unwrap();
  let nginx = s.add_package(deb("nginx")).await.unwrap();
  let h1 = s.add_host(host("web01")).await.unwrap();
  let h2 = s.add_host(host("web02")).await.unwrap();

  let r1 = s.append_release(new_release(openssl.package_id, "1.0")).await.unwrap();
  s.append_release(new_release(openssl.package_id, "1.1")).await.unwrap();
  let rn = s.append_release(new_release(nginx.package_id, "1.24")).await.unwrap();
  s.append_update(observation(h1.host_id, openssl.package_id, r1.event_id))
    .await
    .unwrap();
  s.append_update(observation(h2.host_id, nginx.package_id, rn.event_id))
    .await
    .unwrap();

  let releases_live = release_pointers(&s).await;
  let installs_live = install_pointers(&s).await;

  // Corrupt one pointer and drop another, then rebuild.
  exec(
    &s,
    format!(
      "UPDATE current_releases SET release_id = {} WHERE package_id = {};
       DELETE FROM installed_releases WHERE host_id = {};",
      r1.event_id, openssl.package_id, h2.host_id
    ),
  )
  .await;

  s.rebuild_indexes().await.unwrap();
  assert_eq!(release_pointers(&s).await, releases_live);
  assert_eq!(install_pointers(&s).await, installs_live);

  // Rebuilding again over a correct index changes nothing.
  s.rebuild_indexes().await.unwrap();
  assert_eq!(release_pointers(&s).await, releases_live);
  assert_eq!(install_pointers(&s).await, installs_live);
}

#[tokio::test]
async fn rebuild_skips_packages_without_history() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  s.rebuild_indexes().await.unwrap();

  assert!(release_pointers(&s).await.is_empty());
  assert!(s.current_release(pkg.package_id).await.unwrap().is_none());
}

#[tokio::test]
async fn rebuild_stamps_freshness() {
  let s = store().await;
  assert!(s.last_rebuild().await.unwrap().is_none());

  s.rebuild_indexes().await.unwrap();
  let first = s.last_rebuild().await.unwrap().unwrap();

  s.rebuild_indexes().await.unwrap();
  let second = s.last_rebuild().await.unwrap().unwrap();
  assert!(second >= first);
}

// ─── Stale index detection ───────────────────────────────────────────────────

#[tokio::test]
async fn stale_release_index_detected_not_repaired() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  let rel = s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();

  // Out-of-band deletion bypassing the cascade rules.
  exec(
    &s,
    format!(
      "PRAGMA foreign_keys = OFF;
       DELETE FROM release_events WHERE event_id = {};
       PRAGMA foreign_keys = ON;",
      rel.event_id
    ),
  )
  .await;

  let err = s.current_release(pkg.package_id).await.unwrap_err();
  assert!(matches!(
    err,
    Error::StaleReleaseIndex { package_id, release_id }
      if package_id == pkg.package_id && release_id == rel.event_id
  ));

  // A rebuild — not the read path — heals the fault.
  s.rebuild_indexes().await.unwrap();
  assert!(s.current_release(pkg.package_id).await.unwrap().is_none());
}

#[tokio::test]
async fn stale_install_index_detected_not_repaired() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  let h = s.add_host(host("web01")).await.unwrap();
  let rel = s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();
  let upd = s
    .append_update(observation(h.host_id, pkg.package_id, rel.event_id))
    .await
    .unwrap();

  exec(
    &s,
    format!(
      "PRAGMA foreign_keys = OFF;
       DELETE FROM update_events WHERE event_id = {};
       PRAGMA foreign_keys = ON;",
      upd.event_id
    ),
  )
  .await;

  let err = s
    .installed_release(h.host_id, pkg.package_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::StaleInstallIndex { .. }));

  let err = s.host_inventory(h.host_id).await.unwrap_err();
  assert!(matches!(err, Error::StaleInstallIndex { .. }));
}

// ─── Outdated-hosts report ───────────────────────────────────────────────────

#[tokio::test]
async fn outdated_report_lists_hosts_behind_current() {
  let s = store().await;
  let pkg = s.add_package(deb("openssl")).await.unwrap();
  let behind = s.add_host(host("web01")).await.unwrap();
  let fresh = s.add_host(host("web02")).await.unwrap();

  let r1 = s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();
  let r2 = s.append_release(new_release(pkg.package_id, "1.1")).await.unwrap();
  s.append_update(observation(behind.host_id, pkg.package_id, r1.event_id))
    .await
    .unwrap();
  s.append_update(observation(fresh.host_id, pkg.package_id, r2.event_id))
    .await
    .unwrap();

  let report = s.outdated_hosts().await.unwrap();
  assert_eq!(report.len(), 1);
  assert_eq!(report[0].host.host_id, behind.host_id);
  assert_eq!(report[0].installed.event_id, r1.event_id);
  assert_eq!(report[0].current.event_id, r2.event_id);

  // Once the lagging host reports the new release, the report is empty.
  s.append_update(observation(behind.host_id, pkg.package_id, r2.event_id))
    .await
    .unwrap();
  assert!(s.outdated_hosts().await.unwrap().is_empty());
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn reopening_a_store_preserves_logs_and_indexes() {
  let dir = tempfile::tempdir().expect("tempdir");
  let path = dir.path().join("muster.db");

  let pkg_id;
  {
    let s = SqliteStore::open(&path).await.unwrap();
    let pkg = s.add_package(deb("openssl")).await.unwrap();
    s.append_release(new_release(pkg.package_id, "1.0")).await.unwrap();
    pkg_id = pkg.package_id;
  }

  let s = SqliteStore::open(&path).await.unwrap();
  let current = s.current_release(pkg_id).await.unwrap().unwrap();
  assert_eq!(current.version, "1.0");
}
