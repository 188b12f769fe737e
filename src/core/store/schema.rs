//! Database schema initialization

use rusqlite::{params, Connection, OptionalExtension};

use super::SCHEMA_VERSION;
use crate::core::error::{EngineError, EngineResult};

/// Create the schema on a fresh database, or verify the version of an existing one
pub(super) fn ensure_schema(conn: &Connection) -> EngineResult<()> {
    let has_version_table: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !has_version_table {
        return init_schema(conn);
    }

    let found: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    match found {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(version) => Err(EngineError::SchemaMismatch {
            found: version,
            expected: SCHEMA_VERSION,
        }),
        None => init_schema(conn),
    }
}

fn init_schema(conn: &Connection) -> EngineResult<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- Ordered entries; scope is (family, container_id, parent_id)
        CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY,
            family TEXT NOT NULL,
            container_id TEXT NOT NULL,
            parent_id TEXT REFERENCES entries(id),
            name TEXT,
            idx INTEGER NOT NULL,
            external_ref TEXT,
            kind TEXT NOT NULL
        );

        -- Index uniqueness per sibling group (NULL parent folded to '')
        CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_scope_index
            ON entries(family, container_id, COALESCE(parent_id, ''), idx);
        CREATE INDEX IF NOT EXISTS idx_entries_parent ON entries(parent_id);
        CREATE INDEX IF NOT EXISTS idx_entries_container ON entries(family, container_id);
        CREATE INDEX IF NOT EXISTS idx_entries_external_ref ON entries(family, external_ref);
        "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
        params![SCHEMA_VERSION],
    )?;

    Ok(())
}
