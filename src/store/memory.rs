use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing::trace;

use super::{RedirectDatabase, RedirectEntry, TableName};

/// Redirect tables kept in memory
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: RwLock<HashMap<TableName, BTreeMap<String, RedirectEntry>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RedirectDatabase for MemoryDatabase {
    fn replace(&self, table: &TableName, id: &str, entry: &RedirectEntry) -> Result<()> {
        trace!("memory replace {} in {}", id, table);
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables
            .entry(table.clone())
            .or_default()
            .insert(id.to_string(), entry.clone());
        Ok(())
    }

    fn fetch(&self, table: &TableName, id: &str) -> Result<Option<RedirectEntry>> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        Ok(tables.get(table).and_then(|rows| rows.get(id)).cloned())
    }

    fn delete(&self, table: &TableName, id: &str) -> Result<bool> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        Ok(tables
            .get_mut(table)
            .map(|rows| rows.remove(id).is_some())
            .unwrap_or(false))
    }

    fn fetch_all(&self, table: &TableName) -> Result<Vec<RedirectEntry>> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<RedirectEntry> = tables
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.source_url.cmp(&b.source_url));
        Ok(entries)
    }

    fn count(&self, table: &TableName) -> Result<usize> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        Ok(tables.get(table).map(BTreeMap::len).unwrap_or(0))
    }
}
