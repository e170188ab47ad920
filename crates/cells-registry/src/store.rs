//! Group store
//!
//! Concurrent map of named groups plus the process-wide cell quota.
//! Persistence is explicit: nothing is written until [`GroupStore::save`].

use crate::error::{RegistryError, Result};
use crate::storage::{GroupRecord, GroupTable, GroupTableStorage, InMemoryGroupStorage};
use cells_types::{CellLimit, Group, GroupName};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct GroupStore {
    groups: DashMap<GroupName, Arc<Group>>,
    global_limit: RwLock<CellLimit>,
    storage: Arc<dyn GroupTableStorage>,
}

impl GroupStore {
    pub fn new(storage: Arc<dyn GroupTableStorage>) -> Self {
        Self {
            groups: DashMap::new(),
            global_limit: RwLock::new(CellLimit::UNLIMITED),
            storage,
        }
    }

    /// Store backed by [`InMemoryGroupStorage`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryGroupStorage::new()))
    }

    /// Create an empty group named `name`.
    pub fn create(&self, name: &str) -> Result<Arc<Group>> {
        self.insert_new(Group::new(name)?)
    }

    pub fn create_with_display_name(&self, name: &str, display_name: &str) -> Result<Arc<Group>> {
        self.insert_new(Group::with_display_name(name, display_name)?)
    }

    fn insert_new(&self, group: Group) -> Result<Arc<Group>> {
        match self.groups.entry(group.name().clone()) {
            Entry::Occupied(existing) => Err(RegistryError::AlreadyExists(existing.key().to_string())),
            Entry::Vacant(slot) => {
                let group = Arc::new(group);
                slot.insert(group.clone());
                info!(group = %group.name(), "Created group");
                Ok(group)
            }
        }
    }

    /// Remove a group. Emptiness is the caller's responsibility.
    pub fn delete(&self, name: &str) -> bool {
        let removed = self.groups.remove(name.trim()).is_some();
        if removed {
            info!(group = name.trim(), "Deleted group");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.get(name.trim()).map(|g| g.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name.trim())
    }

    /// All groups ordered by name.
    pub fn all(&self) -> BTreeMap<GroupName, Arc<Group>> {
        self.groups
            .iter()
            .map(|g| (g.key().clone(), g.value().clone()))
            .collect()
    }

    /// Groups containing `region`, ordered by name.
    pub fn groups_containing(&self, region: &str) -> Vec<Arc<Group>> {
        self.all()
            .into_values()
            .filter(|g| g.contains_region(region))
            .collect()
    }

    /// Whether any group lists `region`.
    pub fn is_grouped(&self, region: &str) -> bool {
        self.groups.iter().any(|g| g.contains_region(region))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn global_limit(&self) -> CellLimit {
        *self.global_limit.read()
    }

    pub fn set_global_limit(&self, limit: i32) -> Result<()> {
        let limit = CellLimit::new(limit)?;
        *self.global_limit.write() = limit;
        info!(limit = limit.get(), "Set global cell limit");
        Ok(())
    }

    /// Swap in a rebuilt group carrying a new display name.
    ///
    /// Handles obtained earlier keep pointing at the old instance; callers
    /// should re-fetch after this returns.
    pub fn replace_display_name(&self, name: &str, display_name: &str) -> Result<Arc<Group>> {
        let mut entry = self
            .groups
            .get_mut(name.trim())
            .ok_or_else(|| RegistryError::NotFound(name.trim().to_string()))?;
        let rebuilt = Arc::new(entry.rebuilt_with_display_name(display_name)?);
        *entry = rebuilt.clone();
        info!(group = %rebuilt.name(), display_name = rebuilt.display_name(), "Replaced display name");
        Ok(rebuilt)
    }

    /// Serializable view of the current contents.
    pub fn snapshot(&self) -> GroupTable {
        GroupTable {
            global_limit: self.global_limit().get(),
            groups: self
                .all()
                .into_iter()
                .map(|(name, group)| (name.to_string(), GroupRecord::from_group(&group)))
                .collect(),
            ..Default::default()
        }
    }

    /// Persist the whole table. On failure the in-memory state is kept and
    /// the save can be retried.
    pub fn save(&self) -> Result<()> {
        let table = self.snapshot();
        match self.storage.store(&table) {
            Ok(()) => {
                debug!(
                    groups = table.groups.len(),
                    storage = %self.storage.describe(),
                    "Saved group table"
                );
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, storage = %self.storage.describe(), "Failed to save group table");
                Err(e)
            }
        }
    }

    /// Replace the in-memory contents with the stored table.
    ///
    /// Groups that fail to hydrate are skipped. Returns the number of groups
    /// loaded; an absent table loads nothing and leaves the store untouched.
    pub fn load(&self) -> Result<usize> {
        let Some(table) = self.storage.load()? else {
            debug!(storage = %self.storage.describe(), "No stored group table");
            return Ok(0);
        };

        let mut loaded = Vec::with_capacity(table.groups.len());
        for (name, record) in &table.groups {
            match record.to_group(name) {
                Ok(group) => loaded.push(group),
                Err(e) => warn!(group = %name, error = %e, "Skipping stored group"),
            }
        }

        let global_limit = CellLimit::new(table.global_limit).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring stored global limit");
            CellLimit::UNLIMITED
        });

        self.groups.clear();
        for group in loaded {
            self.groups.insert(group.name().clone(), Arc::new(group));
        }
        *self.global_limit.write() = global_limit;

        info!(
            groups = self.groups.len(),
            global_limit = global_limit.get(),
            "Loaded group table"
        );
        Ok(self.groups.len())
    }
}

impl Default for GroupStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for GroupStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupStore")
            .field("groups", &self.groups.len())
            .field("global_limit", &self.global_limit())
            .field("storage", &self.storage.describe())
            .finish()
    }
}
