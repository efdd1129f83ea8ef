use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use super::{RedirectDatabase, RedirectEntry, TableName};

struct Inner {
    conn: Connection,
    known_tables: HashSet<TableName>,
}

/// Redirect tables in a SQLite database
///
/// Columns: `id` (primary key, hash of the source), `source_url`, `target_url`.
pub struct SqliteDatabase {
    inner: Mutex<Inner>,
}

impl SqliteDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open redirect database {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))?;

        info!("Opened redirect database at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Mutex::new(Inner {
                conn,
                known_tables: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_table(inner: &mut Inner, table: &TableName) -> Result<()> {
        if inner.known_tables.contains(table) {
            return Ok(());
        }

        // Table names are restricted to [A-Za-z0-9_] by TableName
        inner
            .conn
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS \"{table}\" (
                    id TEXT PRIMARY KEY NOT NULL,
                    source_url TEXT NOT NULL,
                    target_url TEXT NOT NULL
                );"
            ))
            .with_context(|| format!("Failed to create table {}", table))?;

        debug!("Ensured redirect table {}", table);
        inner.known_tables.insert(table.clone());
        Ok(())
    }
}

impl RedirectDatabase for SqliteDatabase {
    fn replace(&self, table: &TableName, id: &str, entry: &RedirectEntry) -> Result<()> {
        let mut inner = self.lock();
        Self::ensure_table(&mut inner, table)?;
        inner
            .conn
            .execute(
                &format!("REPLACE INTO \"{table}\" (id, source_url, target_url) VALUES (?1, ?2, ?3)"),
                params![id, entry.source_url, entry.target_url],
            )
            .with_context(|| format!("Failed to store redirect in {}", table))?;
        Ok(())
    }

    fn fetch(&self, table: &TableName, id: &str) -> Result<Option<RedirectEntry>> {
        let mut inner = self.lock();
        Self::ensure_table(&mut inner, table)?;
        let entry = inner
            .conn
            .query_row(
                &format!("SELECT source_url, target_url FROM \"{table}\" WHERE id = ?1 LIMIT 1"),
                params![id],
                |row| {
                    Ok(RedirectEntry {
                        source_url: row.get(0)?,
                        target_url: row.get(1)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("Failed to fetch redirect from {}", table))?;
        Ok(entry)
    }

    fn delete(&self, table: &TableName, id: &str) -> Result<bool> {
        let mut inner = self.lock();
        Self::ensure_table(&mut inner, table)?;
        let removed = inner
            .conn
            .execute(&format!("DELETE FROM \"{table}\" WHERE id = ?1"), params![id])
            .with_context(|| format!("Failed to delete redirect from {}", table))?;
        Ok(removed > 0)
    }

    fn fetch_all(&self, table: &TableName) -> Result<Vec<RedirectEntry>> {
        let mut inner = self.lock();
        Self::ensure_table(&mut inner, table)?;
        let mut stmt = inner
            .conn
            .prepare(&format!(
                "SELECT source_url, target_url FROM \"{table}\" ORDER BY source_url ASC"
            ))
            .with_context(|| format!("Failed to list redirects of {}", table))?;

        let rows = stmt.query_map([], |row| {
            Ok(RedirectEntry {
                source_url: row.get(0)?,
                target_url: row.get(1)?,
            })
        })?;

        let entries = rows
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read redirects of {}", table))?;
        Ok(entries)
    }

    fn count(&self, table: &TableName) -> Result<usize> {
        let mut inner = self.lock();
        Self::ensure_table(&mut inner, table)?;
        let count: i64 = inner
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))
            .with_context(|| format!("Failed to count redirects of {}", table))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
