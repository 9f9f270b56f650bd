use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;
use crate::migrations;

/// Default busy-timeout applied before `EVOTRACE_DB_BUSY_TIMEOUT_MS` is read
/// by the runtime crate; kept here so the store is usable standalone.
const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5000;

/// Owns the single `rusqlite::Connection` backing a workspace. Callers
/// serialize access externally (the runtime wraps this in a
/// `tokio::sync::Mutex` and drives it through `spawn_blocking`); nothing in
/// this type is thread-safe on its own.
pub struct Database {
    conn: Connection,
}

pub struct OpenOptions {
    pub wal: bool,
    pub busy_timeout_ms: u32,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            wal: true,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl Database {
    pub fn open(path: &Path, options: OpenOptions) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, options)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, OpenOptions::default())
    }

    fn from_connection(mut conn: Connection, options: OpenOptions) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(std::time::Duration::from_millis(options.busy_timeout_ms as u64))?;
        if options.wal {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }
        migrations::migrate(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
