//! Location → region link table.
//!
//! Keys are canonical `world:x:y:z` strings of the lower door half. The
//! reverse mapping (region → doors) is derived by scanning; the table is small
//! compared to the number of regions.

use crate::config::LinkConfig;
use crate::error::Result;
use crate::storage::{InMemoryLinkStorage, LinkTable, LinkTableStorage};
use crate::world::{Half, Structure, StructureKind, WorldAccess};
use cells_gate::CooldownTracker;
use cells_types::{
    capabilities, AccessPolicy, ActorId, BlockLocation, Clock, RegionId, RegionSource,
};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Net effect of a toggle request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The door (and its twin, if any) changed state
    Applied { open: bool, twin: bool },
    /// The actor toggled too recently
    CoolingDown { remaining: Duration },
    /// Nothing openable at the location
    NoStructure,
    /// The primary door could not be changed
    Failed { reason: String },
    /// The twin failed and the primary was restored
    Reverted { reason: String },
    /// The twin failed and restoring the primary failed too
    Diverged { reason: String },
}

impl ToggleOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ToggleOutcome::Applied { .. })
    }
}

/// Result of re-checking the doors of one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorSync {
    /// No doors are linked to the region
    NoDoors,
    /// Region exists; its doors keep their links
    Synced { doors: usize, sold: bool },
    /// Region is gone; its doors were unlinked
    Unlinked { doors: usize },
    /// The region source could not answer
    Unavailable,
}

pub struct LinkIndex {
    links: DashMap<String, RegionId>,
    storage: Arc<dyn LinkTableStorage>,
    world: Arc<dyn WorldAccess>,
    regions: Arc<dyn RegionSource>,
    access: AccessPolicy,
    cooldowns: CooldownTracker,
    config: LinkConfig,
}

impl LinkIndex {
    pub fn new(
        config: LinkConfig,
        storage: Arc<dyn LinkTableStorage>,
        world: Arc<dyn WorldAccess>,
        regions: Arc<dyn RegionSource>,
        access: AccessPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cooldowns = CooldownTracker::new(config.toggle_cooldown(), clock);
        Self {
            links: DashMap::new(),
            storage,
            world,
            regions,
            access,
            cooldowns,
            config,
        }
    }

    /// Index backed by [`InMemoryLinkStorage`].
    pub fn in_memory(
        world: Arc<dyn WorldAccess>,
        regions: Arc<dyn RegionSource>,
        access: AccessPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(
            LinkConfig::default(),
            Arc::new(InMemoryLinkStorage::new()),
            world,
            regions,
            access,
            clock,
        )
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Whether `structure` is a linkable class.
    pub fn accepts(&self, structure: &Structure) -> bool {
        matches!(
            structure.kind,
            StructureKind::Door | StructureKind::Trapdoor | StructureKind::Gate
        ) && self.config.accepts_material(&structure.material)
    }

    fn accepted_structure_at(&self, location: &BlockLocation) -> Option<Structure> {
        self.world
            .structure_at(location)
            .filter(|s| self.accepts(s))
    }

    /// The location a link for `location` is stored under: the lower half
    /// of a door, otherwise the location itself.
    pub fn canonical(&self, location: &BlockLocation) -> BlockLocation {
        match self.accepted_structure_at(location) {
            Some(s) if s.kind == StructureKind::Door && s.half == Half::Upper => location.below(),
            _ => location.clone(),
        }
    }

    /// Whether `key` parses and still hosts a linkable structure.
    pub fn hosts_valid_structure(&self, key: &str) -> bool {
        let Ok(location) = key.parse::<BlockLocation>() else {
            return false;
        };
        self.world.world_exists(&location.world)
            && self.accepted_structure_at(&location).is_some()
    }

    // Table operations

    /// Link `location` to `region`, replacing any previous link. Persists only
    /// when the mapping changes.
    pub fn link(&self, location: &BlockLocation, region: RegionId) -> Result<()> {
        let key = self.canonical(location).key();
        let previous = self.links.insert(key.clone(), region.clone());
        if previous.as_ref() == Some(&region) {
            debug!(location = %key, region = %region, "Door already linked");
            return Ok(());
        }
        info!(location = %key, region = %region, "Linked door");
        self.save()
    }

    /// Remove the link at `location`, persisting only if one existed.
    pub fn unlink(&self, location: &BlockLocation) -> Result<Option<RegionId>> {
        let key = self.canonical(location).key();
        match self.links.remove(&key) {
            Some((_, region)) => {
                info!(location = %key, region = %region, "Unlinked door");
                self.save()?;
                Ok(Some(region))
            }
            None => Ok(None),
        }
    }

    pub fn linked_region(&self, location: &BlockLocation) -> Option<RegionId> {
        let key = self.canonical(location).key();
        self.links.get(&key).map(|r| r.value().clone())
    }

    pub fn is_linked(&self, location: &BlockLocation) -> bool {
        self.linked_region(location).is_some()
    }

    /// Doors linked to `region`, ordered by key.
    pub fn find_linked(&self, region: &str) -> Vec<BlockLocation> {
        let mut found: Vec<BlockLocation> = self
            .links
            .iter()
            .filter(|e| e.value().as_str() == region)
            .filter_map(|e| e.key().parse().ok())
            .collect();
        found.sort();
        found
    }

    /// Snapshot of the raw table.
    pub fn all_links(&self) -> BTreeMap<String, RegionId> {
        self.links
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Remove raw keys and persist once if anything was removed.
    ///
    /// Returns how many links left the index together with the save result;
    /// removals stand even when the save fails.
    pub fn remove_keys<'a, I>(&self, keys: I) -> (usize, Result<()>)
    where
        I: IntoIterator<Item = &'a String>,
    {
        let removed = keys
            .into_iter()
            .filter(|key| self.links.remove(key.as_str()).is_some())
            .count();
        let saved = if removed > 0 { self.save() } else { Ok(()) };
        (removed, saved)
    }

    // Access and interaction

    /// Unlinked doors are open to everyone. Linked doors require the region to
    /// exist and the actor to own it, be a member, or hold a bypass.
    pub async fn can_access(&self, actor: &ActorId, location: &BlockLocation) -> bool {
        let Some(region_id) = self.linked_region(location) else {
            return true;
        };

        match self.regions.find_region(&region_id).await {
            Ok(Some(region)) => {
                region.has_access(actor)
                    || self.access.is_bypassing(actor)
                    || self.access.has_capability(actor, capabilities::BYPASS_DOORS)
            }
            Ok(None) => {
                debug!(region = %region_id, "Linked region no longer exists");
                false
            }
            Err(e) => {
                warn!(region = %region_id, error = %e, "Denying door access, region lookup failed");
                false
            }
        }
    }

    /// Flip the door at `location` and its twin.
    ///
    /// A failed twin flip is compensated by restoring the primary once; the
    /// outcome reports what actually happened. The actor's cooldown starts
    /// only when the toggle applied.
    pub fn toggle(&self, location: &BlockLocation, actor: &ActorId) -> ToggleOutcome {
        if let Some(remaining) = self.cooldowns.remaining(actor) {
            return ToggleOutcome::CoolingDown { remaining };
        }

        let canonical = self.canonical(location);
        let Some(structure) = self.accepted_structure_at(&canonical) else {
            return ToggleOutcome::NoStructure;
        };

        let open = !structure.open;
        if let Err(e) = self.world.set_open(&canonical, open) {
            warn!(location = %canonical, error = %e, "Door toggle failed");
            return ToggleOutcome::Failed {
                reason: e.to_string(),
            };
        }

        let twin = self.find_twin(&canonical, &structure);
        if let Some(twin_location) = &twin {
            if let Err(e) = self.world.set_open(twin_location, open) {
                warn!(location = %canonical, twin = %twin_location, error = %e, "Twin door toggle failed, restoring primary");
                return match self.world.set_open(&canonical, structure.open) {
                    Ok(()) => ToggleOutcome::Reverted {
                        reason: e.to_string(),
                    },
                    Err(undo) => {
                        error!(location = %canonical, error = %undo, "Could not restore primary door");
                        ToggleOutcome::Diverged {
                            reason: format!("{e}; restore failed: {undo}"),
                        }
                    }
                };
            }
        }

        let sounds = &self.config.sounds;
        if sounds.enabled {
            let sound = if open { &sounds.open } else { &sounds.close };
            self.world
                .play_sound(&canonical, sound, sounds.volume, sounds.pitch);
        }

        self.cooldowns.record(actor);
        debug!(location = %canonical, open, twin = twin.is_some(), "Toggled door");
        ToggleOutcome::Applied {
            open,
            twin: twin.is_some(),
        }
    }

    fn find_twin(&self, at: &BlockLocation, structure: &Structure) -> Option<BlockLocation> {
        let candidate = structure.twin_location(at)?;
        let other = self.world.structure_at(&candidate)?;
        structure.pairs_with(&other).then_some(candidate)
    }

    pub fn clear_cooldown(&self, actor: &ActorId) {
        self.cooldowns.clear(actor);
    }

    // Maintenance

    /// Drop links whose region no longer exists. Lookup failures keep the
    /// link. Persists once at the end.
    pub async fn cleanup_invalid(&self) -> Result<usize> {
        let mut stale = Vec::new();
        for (key, region) in self.all_links() {
            match self.regions.find_region(&region).await {
                Ok(Some(_)) => {}
                Ok(None) => stale.push(key),
                Err(e) => warn!(location = %key, region = %region, error = %e, "Skipping link check"),
            }
        }

        let (removed, saved) = self.remove_keys(&stale);
        saved?;
        if removed > 0 {
            info!(removed, "Removed links to missing regions");
        }
        Ok(removed)
    }

    /// Re-check the doors of one region, unlinking them if it is gone.
    pub async fn sync_region_doors(&self, region: &RegionId) -> Result<DoorSync> {
        let keys: Vec<String> = self
            .links
            .iter()
            .filter(|e| e.value() == region)
            .map(|e| e.key().clone())
            .collect();
        if keys.is_empty() {
            return Ok(DoorSync::NoDoors);
        }

        match self.regions.find_region(region).await {
            Ok(Some(found)) => {
                if !found.is_sold() {
                    debug!(region = %region, doors = keys.len(), "Region has doors but is not sold");
                }
                Ok(DoorSync::Synced {
                    doors: keys.len(),
                    sold: found.is_sold(),
                })
            }
            Ok(None) => {
                let (doors, saved) = self.remove_keys(&keys);
                saved?;
                info!(region = %region, doors, "Unlinked doors of missing region");
                Ok(DoorSync::Unlinked { doors })
            }
            Err(e) => {
                warn!(region = %region, error = %e, "Could not sync doors");
                Ok(DoorSync::Unavailable)
            }
        }
    }

    // Persistence

    pub fn save(&self) -> Result<()> {
        let table = LinkTable {
            links: self
                .all_links()
                .into_iter()
                .map(|(key, region)| (key, region.to_string()))
                .collect(),
            ..Default::default()
        };
        self.storage.store(&table).map_err(|e| {
            warn!(error = %e, storage = %self.storage.describe(), "Failed to save link table");
            e
        })
    }

    /// Replace the table with the stored one. Entries with an invalid region
    /// id are dropped; unparsable location keys are kept for reconciliation.
    pub fn load(&self) -> Result<usize> {
        let Some(table) = self.storage.load()? else {
            return Ok(0);
        };

        self.links.clear();
        for (key, raw) in table.links {
            match RegionId::parse(&raw) {
                Ok(region) => {
                    self.links.insert(key, region);
                }
                Err(e) => warn!(location = %key, error = %e, "Skipping stored link"),
            }
        }
        info!(links = self.links.len(), storage = %self.storage.describe(), "Loaded link table");
        Ok(self.links.len())
    }
}

impl std::fmt::Debug for LinkIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkIndex")
            .field("links", &self.links.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
