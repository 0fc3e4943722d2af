//! SQL schema for the visitdesk SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS` / `INSERT OR IGNORE`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS perfiles (
    profile_id  INTEGER PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE
);

INSERT OR IGNORE INTO perfiles (profile_id, name)
VALUES (1, 'admin'), (2, 'reception'), (3, 'host');

CREATE TABLE IF NOT EXISTS areas (
    department_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL UNIQUE
);

-- Users are never deleted; deactivated_at marks a soft delete.
CREATE TABLE IF NOT EXISTS usuarios (
    user_id        TEXT PRIMARY KEY,
    national_id    TEXT NOT NULL UNIQUE,
    name           TEXT NOT NULL,
    email          TEXT NOT NULL,
    profile_id     INTEGER NOT NULL REFERENCES perfiles(profile_id),
    department_id  INTEGER REFERENCES areas(department_id),
    supervisor_id  TEXT REFERENCES usuarios(user_id),
    password_hash  TEXT,              -- argon2 PHC string
    deactivated_at TEXT,              -- ISO 8601 UTC or NULL
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS visitantes (
    visitor_id  TEXT PRIMARY KEY,
    national_id TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL,
    email       TEXT NOT NULL,
    company     TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- `number` doubles as the rowid; AUTOINCREMENT keeps it from being reused
-- after deletes.
CREATE TABLE IF NOT EXISTS visitas (
    number          INTEGER PRIMARY KEY AUTOINCREMENT,
    visit_id        TEXT NOT NULL UNIQUE,
    visitor_id      TEXT NOT NULL REFERENCES visitantes(visitor_id),
    host_id         TEXT NOT NULL REFERENCES usuarios(user_id),
    registered_by   TEXT REFERENCES usuarios(user_id),
    reason          TEXT NOT NULL,
    scheduled_start TEXT,
    scheduled_end   TEXT,
    phone           TEXT,
    location        TEXT,
    notes           TEXT,
    cancel_reason   TEXT,
    status          TEXT NOT NULL DEFAULT 'awaiting',
    access          TEXT NOT NULL DEFAULT 'preauthorized',
    created_at      TEXT NOT NULL,
    called_at       TEXT,
    started_at      TEXT,
    finished_at     TEXT,
    check_in        TEXT,
    check_out       TEXT
);

CREATE INDEX IF NOT EXISTS visitas_status_idx  ON visitas(status);
CREATE INDEX IF NOT EXISTS visitas_host_idx    ON visitas(host_id);
CREATE INDEX IF NOT EXISTS visitas_visitor_idx ON visitas(visitor_id);

PRAGMA user_version = 1;
";

/// Register the scalar functions the store's queries rely on.
///
/// `fold(text)` lowercases with full Unicode rules; SQLite's built-in
/// `lower()` and `LIKE` only fold ASCII. `NULL` stays `NULL`.
pub fn register_functions(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  use rusqlite::functions::FunctionFlags;

  conn.create_scalar_function(
    "fold",
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
  )
}
