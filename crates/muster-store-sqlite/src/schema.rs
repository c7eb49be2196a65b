//! SQL schema for the Muster SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS packages (
    package_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    kind        TEXT NOT NULL,   -- 'deb' | 'rpm' | 'snap' | 'docker'
    contents    TEXT NOT NULL,   -- 'source' | 'translation' | 'binary-<arch>'
    UNIQUE (name, kind, contents)
);

CREATE TABLE IF NOT EXISTS hosts (
    host_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    name         TEXT NOT NULL,
    domain       TEXT NOT NULL,
    os_name      TEXT NOT NULL,
    os_version   TEXT NOT NULL,
    dist_name    TEXT NOT NULL,
    dist_version TEXT NOT NULL,
    last_checkin TEXT,           -- RFC 3339 UTC or NULL
    last_update  TEXT,
    UNIQUE (name, domain)
);

-- The event logs are append-only.
-- Rows are never updated; they go away only by explicit deletion or by
-- cascade from their owning package/host. event_id is the recency proxy:
-- AUTOINCREMENT assigns strictly increasing, never-reused ids.
CREATE TABLE IF NOT EXISTS release_events (
    event_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id  INTEGER NOT NULL REFERENCES packages(package_id) ON DELETE CASCADE,
    version     TEXT NOT NULL,
    kind        TEXT NOT NULL,   -- 'added' | 'updated' | 'removed' | 'provisional'
    occurred_at TEXT NOT NULL,   -- collector-reported; never used for ordering
    repository  TEXT
);

CREATE TABLE IF NOT EXISTS update_events (
    event_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    host_id     INTEGER NOT NULL REFERENCES hosts(host_id)             ON DELETE CASCADE,
    package_id  INTEGER NOT NULL REFERENCES packages(package_id)       ON DELETE CASCADE,
    release_id  INTEGER NOT NULL REFERENCES release_events(event_id)   ON DELETE CASCADE,
    observed_at TEXT NOT NULL
);

-- Derived indexes: thin pointer tables, at most one row per natural key,
-- pointing at the winning (greatest-id) log row. Caches over the logs, not
-- sources of truth. When the winning event is deleted the row disappears by
-- cascade; it is repointed only by an explicit refresh or rebuild.
CREATE TABLE IF NOT EXISTS current_releases (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id  INTEGER NOT NULL UNIQUE REFERENCES packages(package_id)    ON DELETE CASCADE,
    release_id  INTEGER NOT NULL REFERENCES release_events(event_id)       ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS installed_releases (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    host_id     INTEGER NOT NULL REFERENCES hosts(host_id)                 ON DELETE CASCADE,
    package_id  INTEGER NOT NULL REFERENCES packages(package_id)           ON DELETE CASCADE,
    update_id   INTEGER NOT NULL REFERENCES update_events(event_id)        ON DELETE CASCADE,
    UNIQUE (host_id, package_id)
);

-- Single-row bookkeeping: when the indexes were last rebuilt from scratch.
CREATE TABLE IF NOT EXISTS index_state (
    id              INTEGER PRIMARY KEY CHECK (id = 1),
    last_rebuild_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS release_events_package_idx ON release_events(package_id);
CREATE INDEX IF NOT EXISTS update_events_pair_idx     ON update_events(host_id, package_id);
CREATE INDEX IF NOT EXISTS update_events_release_idx  ON update_events(release_id);

PRAGMA user_version = 1;
";
