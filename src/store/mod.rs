//! Persistence of redirect tables
//!
//! Each project owns one table; rows are addressed by an id derived from the
//! normalized source URL. [`RedirectDatabase`] is the seam to the storage
//! backend: SQLite for real installations, memory for tests and embedding.

pub mod memory;
pub mod models;
pub mod sqlite;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::site::Project;

pub use memory::MemoryDatabase;
pub use models::{ListQuery, RedirectEntry, RedirectPage};
pub use sqlite::SqliteDatabase;

/// Name of the table shared by all projects in the global scope
pub const GLOBAL_TABLE: &str = "redirects";

static TABLE_NAME_INVALID: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());

/// Name of a redirect table, restricted to `[A-Za-z0-9_]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName(String);

impl TableName {
    pub fn for_project(project: &Project) -> Self {
        Self::sanitized(&format!("{}_{}_redirects", project.name, project.lang))
    }

    pub fn global() -> Self {
        Self(GLOBAL_TABLE.to_string())
    }

    fn sanitized(raw: &str) -> Self {
        Self(TABLE_NAME_INVALID.replace_all(raw, "_").into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Row id for a normalized source URL: lowercase hex SHA-256
pub fn redirect_key(source_url: &str) -> String {
    let digest = Sha256::digest(source_url.as_bytes());
    format!("{:x}", digest)
}

/// Storage backend for redirect tables
///
/// Tables are created on first write. Reading from a table that was never
/// written behaves like reading an empty table.
pub trait RedirectDatabase: Send + Sync {
    /// Inserts or replaces the row with the given id
    fn replace(&self, table: &TableName, id: &str, entry: &RedirectEntry) -> Result<()>;

    /// Fetches a single row by id
    fn fetch(&self, table: &TableName, id: &str) -> Result<Option<RedirectEntry>>;

    /// Deletes a row; returns whether a row was removed
    fn delete(&self, table: &TableName, id: &str) -> Result<bool>;

    /// All rows of a table, ordered by source URL
    fn fetch_all(&self, table: &TableName) -> Result<Vec<RedirectEntry>>;

    fn count(&self, table: &TableName) -> Result<usize>;
}
