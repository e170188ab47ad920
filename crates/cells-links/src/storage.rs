//! Link table persistence.
//!
//! ```yaml
//! version: 1
//! links:
//!   "world:10:64:-3": jcell1
//! ```

use crate::error::{LinkError, Result};
use cells_types::write_atomic;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTable {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Location key to region id, both as stored
    #[serde(default)]
    pub links: BTreeMap<String, String>,
}

impl Default for LinkTable {
    fn default() -> Self {
        Self {
            version: default_version(),
            links: BTreeMap::new(),
        }
    }
}

fn default_version() -> u32 {
    1
}

pub trait LinkTableStorage: Send + Sync {
    fn load(&self) -> Result<Option<LinkTable>>;

    fn store(&self, table: &LinkTable) -> Result<()>;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct YamlLinkStorage {
    path: PathBuf,
}

impl YamlLinkStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LinkTableStorage for YamlLinkStorage {
    fn load(&self) -> Result<Option<LinkTable>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_yaml::from_str(&contents)?))
    }

    fn store(&self, table: &LinkTable) -> Result<()> {
        let contents = serde_yaml::to_string(table)?;
        write_atomic(&self.path, contents.as_bytes())?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Keeps the last stored table in memory.
#[derive(Debug, Default)]
pub struct InMemoryLinkStorage {
    table: RwLock<Option<LinkTable>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryLinkStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: LinkTable) -> Self {
        Self {
            table: RwLock::new(Some(table)),
            ..Default::default()
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Option<LinkTable> {
        self.table.read().clone()
    }
}

impl LinkTableStorage for InMemoryLinkStorage {
    fn load(&self) -> Result<Option<LinkTable>> {
        Ok(self.table.read().clone())
    }

    fn store(&self, table: &LinkTable) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LinkError::Storage("writes disabled".to_string()));
        }
        *self.table.write() = Some(table.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_store_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = YamlLinkStorage::new(dir.path().join("doors.yml"));
        assert!(storage.load().unwrap().is_none());

        let mut table = LinkTable::default();
        table
            .links
            .insert("world:1:64:2".to_string(), "jcell1".to_string());
        storage.store(&table).unwrap();

        let raw = fs::read_to_string(storage.path()).unwrap();
        assert!(raw.contains("world:1:64:2"));
        assert_eq!(storage.load().unwrap(), Some(table));
    }
}
