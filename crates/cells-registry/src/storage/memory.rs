//! In-memory group table storage.

use super::table::GroupTable;
use super::traits::GroupTableStorage;
use crate::error::{RegistryError, Result};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Keeps the last stored table in memory. Writes can be made to fail for
/// exercising persistence error paths.
#[derive(Debug, Default)]
pub struct InMemoryGroupStorage {
    table: RwLock<Option<GroupTable>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryGroupStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: GroupTable) -> Self {
        Self {
            table: RwLock::new(Some(table)),
            ..Default::default()
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Option<GroupTable> {
        self.table.read().clone()
    }
}

impl GroupTableStorage for InMemoryGroupStorage {
    fn load(&self) -> Result<Option<GroupTable>> {
        Ok(self.table.read().clone())
    }

    fn store(&self, table: &GroupTable) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RegistryError::Storage("writes disabled".to_string()));
        }
        *self.table.write() = Some(table.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
