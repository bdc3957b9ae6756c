//! SQLite-backed key/value store.
//!
//! This is the serialization boundary between the route picker (planning
//! site) and the tracker (game page): the picker writes `route`, `originX`,
//! and `originY`; the tracker reads them back at activation. Every selection
//! also appends to an event log whose max sequence number doubles as the
//! store revision for UI sync.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use rusqlite::{Connection, OpenFlags};
use wayfarer_protocol::{keys, Coord};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(i64::MAX)
}

#[derive(Debug, Clone)]
pub struct Store {
    db_path: PathBuf,
}

/// Route selection read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SelectedRoute {
    pub route: String,
    pub origin: Coord,
}

impl Store {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn open(&self) -> anyhow::Result<Connection> {
        let path = self.db_path.clone();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create db dir: {}", dir.display()))?;
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("open sqlite db: {}", path.display()))?;

        // Durable + fast defaults.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        migrate(&conn)?;
        Ok(conn)
    }

    pub fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let conn = self.open()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let conn = self.open()?;
        upsert_kv(&conn, key, value)?;
        Ok(())
    }

    /// Persists a route selection atomically: all three keys plus a
    /// `route.selected` event in one transaction.
    pub fn select_route(&self, route: &str, origin: Coord) -> anyhow::Result<()> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        upsert_kv(&tx, keys::ROUTE, route)?;
        upsert_kv(&tx, keys::ORIGIN_X, &origin.x.to_string())?;
        upsert_kv(&tx, keys::ORIGIN_Y, &origin.y.to_string())?;
        append_event_tx(
            &tx,
            "route.selected",
            serde_json::json!({ "route": route, "origin": origin }),
        )?;
        tx.commit()?;
        Ok(())
    }

    /// The selection, or `None` when any of the three keys is absent (no
    /// route chosen yet).
    pub fn selected_route(&self) -> anyhow::Result<Option<SelectedRoute>> {
        let (Some(route), Some(x), Some(y)) = (
            self.get(keys::ROUTE)?,
            self.get(keys::ORIGIN_X)?,
            self.get(keys::ORIGIN_Y)?,
        ) else {
            return Ok(None);
        };
        let x: i64 = x
            .parse()
            .with_context(|| format!("stored {} is not an integer: {x:?}", keys::ORIGIN_X))?;
        let y: i64 = y
            .parse()
            .with_context(|| format!("stored {} is not an integer: {y:?}", keys::ORIGIN_Y))?;
        Ok(Some(SelectedRoute {
            route,
            origin: Coord::new(x, y),
        }))
    }

    pub fn rev(&self) -> anyhow::Result<i64> {
        let conn = self.open()?;
        let rev: Option<i64> =
            conn.query_row("SELECT MAX(seq) FROM event_log", [], |row| row.get(0))?;
        Ok(rev.unwrap_or(0))
    }
}

fn upsert_kv(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO kv (key, value, updated_at_ms) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at_ms = excluded.updated_at_ms",
        (key, value, now_ms()),
    )?;
    Ok(())
}

fn migrate(conn: &Connection) -> anyhow::Result<()> {
    // Lightweight migrations via `user_version` + IF NOT EXISTS; the schema
    // is small and installs should be resilient.
    let v: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if v < 1 {
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS kv (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at_ms INTEGER NOT NULL
);

-- Monotonic revision source for UI sync.
CREATE TABLE IF NOT EXISTS event_log (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  ts_ms INTEGER NOT NULL,
  kind TEXT NOT NULL,
  payload_json TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_event_log_ts ON event_log(ts_ms);
CREATE INDEX IF NOT EXISTS idx_event_log_kind ON event_log(kind);
"#,
        )?;

        conn.pragma_update(None, "user_version", 1_i64)?;
    }

    Ok(())
}

fn append_event_tx(
    tx: &rusqlite::Transaction<'_>,
    kind: &str,
    payload: serde_json::Value,
) -> anyhow::Result<i64> {
    tx.execute(
        "INSERT INTO event_log (ts_ms, kind, payload_json) VALUES (?1, ?2, ?3)",
        (now_ms(), kind, payload.to_string()),
    )?;
    Ok(tx.last_insert_rowid())
}
