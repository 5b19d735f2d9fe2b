//! # Caulk Store Crate
//!
//! Durable record stores backing the pull/seal scheduling engine, on SQLite.
//!
//! The store is the single source of truth shared by all scheduler loops:
//! none of them caches record status beyond one tick, which is what makes
//! every loop safe to restart at any point. Schema evolution happens through
//! ordered, named migration scripts applied once at open.
//!
//! ## Tables
//! - `file_record`: discovered files and their lifecycle status, one row per
//!   (cid, indexer)
//! - `pin_record`: seal attempts with sealed-byte progress over time
//! - `cleanup_record`: files whose replicas are confirmed gone on-chain
//! - `config`: generic key/value store for cooldown timestamps

mod cleanup_record;
mod file_record;
mod kv;
mod migrations;
mod pin_record;
pub mod types;

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::Connection;
use thiserror::Error;

pub use pin_record::{BucketStats, SealingStats};
pub use types::{
    CleanupRecord, CleanupStatus, FileInfo, FileRecord, FileStatus, PinRecord, PinStatus,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Handle to the SQLite-backed record stores.
///
/// All operations take `&self`; the connection is serialized behind a mutex,
/// which matches the low query rate of the scheduling loops.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Store> {
        Store::init(Connection::open(path.as_ref())?)
    }

    pub fn open_in_memory() -> Result<Store> {
        Store::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Store> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // journal_mode returns the resulting mode as a row
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |r| r.get(0))?;
        conn.execute_batch("PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")?;
        migrations::apply(&mut conn)?;
        Ok(Store { conn: Mutex::new(conn) })
    }

    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let conn = self.conn.lock();
        Ok(f(&conn)?)
    }
}
