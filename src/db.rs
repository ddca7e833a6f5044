//! Database connection abstraction.
//!
//! Supports multiple backends:
//! - Local SQLite file: `path/to/db.sqlite` or `file:path` or `sqlite://path`
//! - In-memory: `:memory:`
//! - Remote Turso: `libsql://...` or `https://...` (requires TURSO_AUTH_TOKEN env var)
//!
//! The server shares one connection behind an async mutex. A request holds
//! the lock for its whole fetch, check and mutate sequence, so ownership
//! checks always see the state they are about to change.

use std::sync::Arc;

use jiff::Timestamp;
use jiff::civil::Date;
use libsql::{Builder, Connection, Database, Row};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::Error;

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL DEFAULT '',
    password_hash TEXT NOT NULL,
    is_staff INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS roles (
    name TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS user_roles (
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role TEXT NOT NULL REFERENCES roles(name) ON DELETE CASCADE,
    PRIMARY KEY (user_id, role)
);

CREATE TABLE IF NOT EXISTS trees (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_by TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS members (
    id TEXT PRIMARY KEY,
    tree_id TEXT NOT NULL REFERENCES trees(id) ON DELETE CASCADE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    gender TEXT,
    birth_date TEXT,
    death_date TEXT,
    relationship TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT '',
    nickname TEXT NOT NULL DEFAULT '',
    location TEXT NOT NULL DEFAULT '',
    spouse_id TEXT REFERENCES members(id) ON DELETE SET NULL,
    is_alive INTEGER NOT NULL DEFAULT 1,
    added_by TEXT REFERENCES users(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS member_parents (
    member_id TEXT NOT NULL REFERENCES members(id) ON DELETE CASCADE,
    parent_id TEXT NOT NULL REFERENCES members(id) ON DELETE CASCADE,
    PRIMARY KEY (member_id, parent_id)
);

CREATE TABLE IF NOT EXISTS updates (
    id TEXT PRIMARY KEY,
    member_id TEXT NOT NULL REFERENCES members(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    media TEXT,
    created_by TEXT REFERENCES users(id) ON DELETE SET NULL,
    posted_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS history_events (
    id TEXT PRIMARY KEY,
    member_id TEXT NOT NULL REFERENCES members(id) ON DELETE CASCADE,
    event_type TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    target_user TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    event_date TEXT NOT NULL,
    related_member TEXT NOT NULL REFERENCES members(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_profiles (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    nickname TEXT NOT NULL DEFAULT '',
    profile_photo TEXT,
    current_location TEXT NOT NULL DEFAULT '',
    birthday TEXT
);
"#;

/// Connect to the database.
///
/// # URL formats
/// - Local file: `mydata.db`, `file:path/to/db.sqlite`, `sqlite://path`
/// - In-memory: `:memory:`
/// - Remote Turso: `libsql://your-db.turso.io` (requires `TURSO_AUTH_TOKEN` env var)
pub async fn connect(url: &str) -> crate::Result<Database> {
    let db = if url.starts_with("libsql://") || url.starts_with("https://") {
        // Remote Turso database
        let token = std::env::var("TURSO_AUTH_TOKEN").map_err(|_| {
            Error::Config("TURSO_AUTH_TOKEN not set for remote database".into())
        })?;
        Builder::new_remote(url.to_string(), token).build().await?
    } else if url == ":memory:" {
        Builder::new_local(":memory:").build().await?
    } else {
        // Local file - strip sqlite:// or file: prefix if present
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("file:"))
            .unwrap_or(url);
        Builder::new_local(path).build().await?
    };

    Ok(db)
}

/// Create every table that does not exist yet.
pub async fn migrate(conn: &Connection) -> crate::Result<()> {
    conn.execute_batch(SCHEMA).await?;
    Ok(())
}

/// Shared database handle.
///
/// Cloning is cheap; all clones serialise on the same connection.
#[derive(Clone)]
pub struct Handle {
    inner: Arc<Inner>,
}

struct Inner {
    // Keeps in-memory databases alive for as long as the handle exists.
    _db: Database,
    conn: Mutex<Connection>,
}

impl Handle {
    /// Connect to `url` and bring the schema up to date.
    pub async fn open(url: &str) -> crate::Result<Handle> {
        let db = connect(url).await?;
        let conn = db.connect()?;
        migrate(&conn).await?;
        Ok(Handle {
            inner: Arc::new(Inner {
                _db: db,
                conn: Mutex::new(conn),
            }),
        })
    }

    /// Wait for exclusive use of the connection.
    pub async fn lock(&self) -> MutexGuard<'_, Connection> {
        self.inner.conn.lock().await
    }
}

// Column decoding helpers. Identifiers, dates and timestamps are stored as text.

pub fn uuid_at(row: &Row, idx: i32) -> crate::Result<Uuid> {
    let raw: String = row.get(idx)?;
    parse_uuid(&raw)
}

pub fn opt_uuid_at(row: &Row, idx: i32) -> crate::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.as_deref().map(parse_uuid).transpose()
}

/// Ids packed into one column by `group_concat`, sorted. NULL is empty.
pub fn uuid_list_at(row: &Row, idx: i32) -> crate::Result<Vec<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    let mut ids = raw
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter(|id| !id.is_empty())
        .map(parse_uuid)
        .collect::<crate::Result<Vec<_>>>()?;
    ids.sort();
    Ok(ids)
}

pub fn date_at(row: &Row, idx: i32) -> crate::Result<Date> {
    let raw: String = row.get(idx)?;
    parse_date(&raw)
}

pub fn opt_date_at(row: &Row, idx: i32) -> crate::Result<Option<Date>> {
    let raw: Option<String> = row.get(idx)?;
    raw.as_deref().map(parse_date).transpose()
}

pub fn timestamp_at(row: &Row, idx: i32) -> crate::Result<Timestamp> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| Error::Internal(format!("Invalid timestamp {raw:?}: {e}")))
}

pub fn bool_at(row: &Row, idx: i32) -> crate::Result<bool> {
    let raw: i64 = row.get(idx)?;
    Ok(raw != 0)
}

fn parse_uuid(raw: &str) -> crate::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("Invalid id {raw:?}: {e}")))
}

fn parse_date(raw: &str) -> crate::Result<Date> {
    raw.parse()
        .map_err(|e| Error::Internal(format!("Invalid date {raw:?}: {e}")))
}

/// Text form of a timestamp, for binding.
///
/// Fixed nanosecond precision keeps text order equal to time order.
pub fn timestamp_text(ts: Timestamp) -> String {
    format!("{ts:.9}")
}

/// Text form of an optional id, for binding.
pub fn opt_text<T: ToString>(value: Option<T>) -> Option<String> {
    value.map(|v| v.to_string())
}
