//! SQLite-backed entry store
//!
//! This module provides the raw persistence primitives of the engine:
//! - get-by-id, ordered children of a scope, insert/update/delete
//! - a write boundary (`BEGIN IMMEDIATE`) that serializes writers
//! - a read boundary (one snapshot per query)
//!
//! No ordering rules live here. The unique index on
//! `(family, container_id, parent_id, idx)` is only a safety net.

mod queries;
mod schema;
mod types;

pub use types::*;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::core::error::{EngineError, EngineResult};
use crate::core::identity::{ContainerId, EntryId, ResourceRef};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Columns selected for every entry read, in `entry_from_row` order
const ENTRY_COLUMNS: &str = "id, container_id, parent_id, name, idx, external_ref, kind";

/// Connection options for file-backed stores
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long a writer waits for another writer before failing with `Busy`
    pub busy_timeout: Duration,
    pub wal_mode: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5000),
            wal_mode: true,
        }
    }
}

/// The entry store backed by SQLite
///
/// Cloning is cheap; clones share one connection.
#[derive(Clone)]
pub struct EntryStore {
    conn: Arc<Mutex<Connection>>,
}

impl EntryStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>, options: &StoreOptions) -> EngineResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::configure_connection(&conn, options)?;
        tracing::debug!(path = %path.as_ref().display(), "opened entry store");
        Self::from_connection(conn)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(
            &conn,
            &StoreOptions {
                wal_mode: false,
                ..Default::default()
            },
        )?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> EngineResult<Self> {
        schema::ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure_connection(conn: &Connection, options: &StoreOptions) -> EngineResult<()> {
        if options.wal_mode {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
        }
        conn.busy_timeout(options.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| EngineError::LockPoisoned)
    }

    /// Run `f` as one atomic unit of work holding the store's write lock
    ///
    /// Commits when `f` succeeds; any error rolls back every write `f` made.
    pub fn write<T>(
        &self,
        family: &str,
        f: impl FnOnce(&StoreTx<'_>) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&StoreTx {
            conn: &tx,
            family,
        })?;
        tx.commit()?;
        Ok(out)
    }

    /// Run `f` against one consistent snapshot of committed state
    pub fn read<T>(
        &self,
        family: &str,
        f: impl FnOnce(&StoreTx<'_>) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        f(&StoreTx {
            conn: &tx,
            family,
        })
    }
}

/// Raw primitives of one family, bound to the caller's transaction
pub struct StoreTx<'a> {
    conn: &'a Connection,
    family: &'a str,
}

impl StoreTx<'_> {
    pub fn family(&self) -> &str {
        self.family
    }

    /// Get entry by ID, or `None`
    pub fn find(&self, id: &EntryId) -> EngineResult<Option<Entry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE family = ?1 AND id = ?2");
        Ok(self
            .conn
            .query_row(&sql, params![self.family, id], entry_from_row)
            .optional()?)
    }

    /// Get entry by ID
    pub fn get(&self, id: &EntryId) -> EngineResult<Entry> {
        self.find(id)?.ok_or(EngineError::EntryNotFound(*id))
    }

    /// Direct children of a scope, ordered by index ascending
    pub fn children_of(&self, scope: &Scope) -> EngineResult<Vec<Entry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries \
             WHERE family = ?1 AND container_id = ?2 AND parent_id IS ?3 \
             ORDER BY idx ASC"
        );
        self.collect(&sql, params![self.family, scope.container_id, scope.parent_id])
    }

    /// Highest index in a scope
    pub fn max_index(&self, scope: &Scope) -> EngineResult<Option<i64>> {
        Ok(self.conn.query_row(
            "SELECT MAX(idx) FROM entries \
             WHERE family = ?1 AND container_id = ?2 AND parent_id IS ?3",
            params![self.family, scope.container_id, scope.parent_id],
            |row| row.get(0),
        )?)
    }

    /// Every entry of a container, in no particular order
    pub fn in_container(&self, container: &ContainerId) -> EngineResult<Vec<Entry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE family = ?1 AND container_id = ?2"
        );
        self.collect(&sql, params![self.family, container])
    }

    /// Entries referencing a resource, in one container or across all of them
    pub fn referencing(
        &self,
        resource: &ResourceRef,
        container: Option<&ContainerId>,
    ) -> EngineResult<Vec<Entry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries \
             WHERE family = ?1 AND external_ref = ?2 AND (?3 IS NULL OR container_id = ?3) \
             ORDER BY container_id, idx"
        );
        self.collect(&sql, params![self.family, resource, container])
    }

    pub fn insert(&self, entry: &Entry) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO entries (id, family, container_id, parent_id, name, idx, external_ref, kind) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.id,
                self.family,
                entry.container_id,
                entry.parent_id,
                entry.name,
                entry.index,
                entry.external_ref,
                entry.kind,
            ],
        )?;
        Ok(())
    }

    /// Overwrite the mutable fields of an entry
    pub fn update(&self, entry: &Entry) -> EngineResult<()> {
        let changed = self.conn.execute(
            "UPDATE entries SET parent_id = ?3, name = ?4, idx = ?5, external_ref = ?6, kind = ?7 \
             WHERE family = ?1 AND id = ?2",
            params![
                self.family,
                entry.id,
                entry.parent_id,
                entry.name,
                entry.index,
                entry.external_ref,
                entry.kind,
            ],
        )?;
        if changed == 0 {
            return Err(EngineError::EntryNotFound(entry.id));
        }
        Ok(())
    }

    pub fn set_index(&self, id: &EntryId, index: i64) -> EngineResult<()> {
        let changed = self.conn.execute(
            "UPDATE entries SET idx = ?3 WHERE family = ?1 AND id = ?2",
            params![self.family, id, index],
        )?;
        if changed == 0 {
            return Err(EngineError::EntryNotFound(*id));
        }
        Ok(())
    }

    /// Delete one entry; fails if it still has children
    pub fn delete(&self, id: &EntryId) -> EngineResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM entries WHERE family = ?1 AND id = ?2",
            params![self.family, id],
        )?;
        if changed == 0 {
            return Err(EngineError::EntryNotFound(*id));
        }
        Ok(())
    }

    /// Delete every entry of a container in one statement
    pub fn delete_container(&self, container: &ContainerId) -> EngineResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM entries WHERE family = ?1 AND container_id = ?2",
            params![self.family, container],
        )?)
    }

    fn collect(&self, sql: &str, params: impl rusqlite::Params) -> EngineResult<Vec<Entry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, entry_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        container_id: row.get(1)?,
        parent_id: row.get(2)?,
        name: row.get(3)?,
        index: row.get(4)?,
        external_ref: row.get(5)?,
        kind: row.get(6)?,
    })
}
