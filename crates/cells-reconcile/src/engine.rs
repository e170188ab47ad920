//! The reconciliation engine.

use crate::error::Result;
use crate::result::{Pass, ReconcileMode, ReconciliationResult, ResultBuilder};
use crate::suggest::suggest_group;
use cells_links::{DoorSync, LinkIndex};
use cells_registry::GroupStore;
use cells_types::{Clock, Region, RegionId, RegionSource};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to a full sync running in the background.
///
/// Dropping the handle does not cancel the run.
#[derive(Debug)]
pub struct SyncHandle {
    inner: JoinHandle<ReconciliationResult>,
}

impl SyncHandle {
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Wait for the run to complete.
    pub async fn wait(self) -> Result<ReconciliationResult> {
        Ok(self.inner.await?)
    }
}

pub struct ReconciliationEngine {
    groups: Arc<GroupStore>,
    links: Arc<LinkIndex>,
    regions: Arc<dyn RegionSource>,
    clock: Arc<dyn Clock>,
    run_lock: Mutex<()>,
    last: RwLock<Option<ReconciliationResult>>,
}

impl ReconciliationEngine {
    pub fn new(
        groups: Arc<GroupStore>,
        links: Arc<LinkIndex>,
        regions: Arc<dyn RegionSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            groups,
            links,
            regions,
            clock,
            run_lock: Mutex::new(()),
            last: RwLock::new(None),
        }
    }

    /// Result of the most recent completed run.
    pub fn last_run(&self) -> Option<ReconciliationResult> {
        self.last.read().clone()
    }

    /// Start a full sync on a background task.
    pub fn spawn_full_sync(self: &Arc<Self>) -> SyncHandle {
        let engine = Arc::clone(self);
        SyncHandle {
            inner: tokio::spawn(async move { engine.full_sync().await }),
        }
    }

    /// Run every pass, repairing as it goes. Waits for any run in progress.
    pub async fn full_sync(&self) -> ReconciliationResult {
        let _guard = self.run_lock.lock().await;
        let started = Instant::now();
        let mut builder = ResultBuilder::new(ReconcileMode::Full);
        info!("Starting full reconciliation");

        let known = self.fetch_regions(&mut builder).await;

        self.validate_group_regions(known.as_ref(), true, &mut builder);
        self.cleanup_orphaned_links(known.as_ref(), &mut builder);
        if let Some(known) = &known {
            self.scan_ownership(known, &mut builder);
            self.detect_ungrouped(known, &mut builder);
        }
        self.resync_doors(&mut builder).await;

        self.finish(builder, started)
    }

    /// Validate group regions without removing anything.
    pub async fn quick_check(&self) -> ReconciliationResult {
        let _guard = self.run_lock.lock().await;
        let started = Instant::now();
        let mut builder = ResultBuilder::new(ReconcileMode::Quick);

        let known = self.fetch_regions(&mut builder).await;
        self.validate_group_regions(known.as_ref(), false, &mut builder);

        self.finish(builder, started)
    }

    fn finish(&self, builder: ResultBuilder, started: Instant) -> ReconciliationResult {
        let result = builder.build(started.elapsed(), self.clock.now());
        info!(
            mode = %result.mode(),
            valid = result.valid_regions(),
            invalid = result.invalid_regions(),
            orphaned_links = result.orphaned_links(),
            anomalies = result.ownership_anomalies(),
            suggestions = result.ungrouped_suggestions(),
            door_resyncs = result.door_resyncs(),
            findings = result.findings().len(),
            elapsed_ms = result.elapsed().as_millis() as u64,
            "Reconciliation completed"
        );
        *self.last.write() = Some(result.clone());
        result
    }

    async fn fetch_regions(&self, builder: &mut ResultBuilder) -> Option<BTreeMap<RegionId, Region>> {
        match self.regions.all_regions().await {
            Ok(all) => Some(all.into_iter().map(|r| (r.id.clone(), r)).collect()),
            Err(e) => {
                warn!(error = %e, "Region source unavailable, skipping marketplace checks");
                builder.finding(
                    Pass::GroupRegions,
                    format!("Region source unavailable: {e}"),
                );
                None
            }
        }
    }

    /// Pass 1: every group region must exist in the marketplace.
    fn validate_group_regions(
        &self,
        known: Option<&BTreeMap<RegionId, Region>>,
        repair: bool,
        builder: &mut ResultBuilder,
    ) {
        let Some(known) = known else {
            return;
        };

        let mut removed = 0usize;
        for (name, group) in self.groups.all() {
            for region in group.regions() {
                if known.contains_key(&region) {
                    builder.valid_regions += 1;
                    continue;
                }
                builder.invalid_regions += 1;
                builder.finding(
                    Pass::GroupRegions,
                    format!("Invalid region in group '{name}': {region}"),
                );
                if repair && group.remove_region(region.as_str()) {
                    removed += 1;
                    debug!(group = %name, region = %region, "Removed missing region from group");
                }
            }
        }

        if removed > 0 {
            info!(removed, "Removed missing regions from groups");
            if let Err(e) = self.groups.save() {
                builder.finding(
                    Pass::GroupRegions,
                    format!("Removed {removed} regions but saving groups failed: {e}"),
                );
            }
        }
    }

    /// Pass 2: drop links that point at missing regions or at locations
    /// without a linkable structure.
    fn cleanup_orphaned_links(
        &self,
        known: Option<&BTreeMap<RegionId, Region>>,
        builder: &mut ResultBuilder,
    ) {
        let mut stale = Vec::new();
        for (key, region) in self.links.all_links() {
            if !self.links.hosts_valid_structure(&key) {
                builder.finding(Pass::OrphanedLinks, format!("Invalid door location: {key}"));
                stale.push(key);
            } else if known.is_some_and(|known| !known.contains_key(&region)) {
                builder.finding(
                    Pass::OrphanedLinks,
                    format!("Orphaned door link: {key} -> {region}"),
                );
                stale.push(key);
            }
        }

        let (removed, saved) = self.links.remove_keys(&stale);
        builder.orphaned_links += removed;
        if let Err(e) = saved {
            builder.finding(
                Pass::OrphanedLinks,
                format!("Removed {removed} links but saving links failed: {e}"),
            );
        }
    }

    /// Pass 3: advisory ownership checks.
    fn scan_ownership(&self, known: &BTreeMap<RegionId, Region>, builder: &mut ResultBuilder) {
        for region in known.values() {
            if region.owner.is_none() && region.members().next().is_some() {
                builder.ownership_anomalies += 1;
                builder.finding(
                    Pass::Ownership,
                    format!("Region '{}' has members but no owner", region.id),
                );
            }
            if region.members.iter().any(Option::is_none) {
                builder.ownership_anomalies += 1;
                builder.finding(
                    Pass::Ownership,
                    format!("Region '{}' has an unresolved member reference", region.id),
                );
            }
        }
    }

    /// Pass 4: regions in no group, with a suggested group where one fits.
    fn detect_ungrouped(&self, known: &BTreeMap<RegionId, Region>, builder: &mut ResultBuilder) {
        let names: Vec<String> = self
            .groups
            .all()
            .into_keys()
            .map(|name| name.to_string())
            .collect();

        for id in known.keys() {
            if self.groups.is_grouped(id.as_str()) {
                continue;
            }
            if let Some(group) = suggest_group(id.as_str(), names.iter().map(String::as_str)) {
                builder.ungrouped_suggestions += 1;
                builder.finding(
                    Pass::Ungrouped,
                    format!("Region '{id}' is in no group, suggested '{group}'"),
                );
            }
        }
    }

    /// Pass 5: re-check the doors of every linked region.
    async fn resync_doors(&self, builder: &mut ResultBuilder) {
        let linked: BTreeSet<RegionId> = self.links.all_links().into_values().collect();
        for region in linked {
            match self.links.sync_region_doors(&region).await {
                Ok(DoorSync::Synced { .. }) => builder.door_resyncs += 1,
                Ok(DoorSync::Unlinked { doors }) => builder.orphaned_links += doors,
                Ok(DoorSync::NoDoors) => {}
                Ok(DoorSync::Unavailable) => builder.finding(
                    Pass::DoorResync,
                    format!("Could not check doors of region '{region}'"),
                ),
                Err(e) => builder.finding(
                    Pass::DoorResync,
                    format!("Unlinking doors of region '{region}' failed: {e}"),
                ),
            }
        }
    }
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("groups", &self.groups.len())
            .field("links", &self.links.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cells_links::{Facing, Hinge, InMemoryLinkStorage, InMemoryWorld, LinkConfig};
    use cells_types::{
        AccessPolicy, ActorId, BlockLocation, InMemoryRegionSource, ManualClock,
        StaticCapabilities,
    };

    struct Fixture {
        groups: Arc<GroupStore>,
        links: Arc<LinkIndex>,
        link_storage: Arc<InMemoryLinkStorage>,
        regions: Arc<InMemoryRegionSource>,
        world: Arc<InMemoryWorld>,
        engine: Arc<ReconciliationEngine>,
    }

    fn fixture() -> Fixture {
        let groups = Arc::new(GroupStore::in_memory());
        let regions = Arc::new(InMemoryRegionSource::new());
        let world = Arc::new(InMemoryWorld::new());
        let clock = Arc::new(ManualClock::default());
        let link_storage = Arc::new(InMemoryLinkStorage::new());
        let links = Arc::new(LinkIndex::new(
            LinkConfig::default(),
            link_storage.clone(),
            world.clone(),
            regions.clone(),
            AccessPolicy::new(Arc::new(StaticCapabilities::new())),
            clock.clone(),
        ));
        let engine = Arc::new(ReconciliationEngine::new(
            groups.clone(),
            links.clone(),
            regions.clone(),
            clock,
        ));
        Fixture {
            groups,
            links,
            link_storage,
            regions,
            world,
            engine,
        }
    }

    fn rid(raw: &str) -> RegionId {
        RegionId::parse(raw).unwrap()
    }

    fn seed(f: &Fixture) {
        for id in ["jcell1", "jcell2"] {
            f.regions.insert(Region::new(rid(id), "world").owned_by(ActorId::generate()));
        }
        let group = f.groups.create("jcells").unwrap();
        group.add_region("jcell1");
        group.add_region("jcell2");
        group.add_region("jcell3");
    }

    #[tokio::test]
    async fn test_quick_check_counts_without_removing() {
        let f = fixture();
        seed(&f);

        let result = f.engine.quick_check().await;
        assert_eq!(result.mode(), ReconcileMode::Quick);
        assert_eq!(result.valid_regions(), 2);
        assert_eq!(result.invalid_regions(), 1);
        assert_eq!(f.groups.get("jcells").unwrap().region_count(), 3);
        assert_eq!(f.engine.last_run(), Some(result));
    }

    #[tokio::test]
    async fn test_full_sync_repairs_and_converges() {
        let f = fixture();
        seed(&f);
        let door = BlockLocation::new("world", 0, 64, 0);
        f.world.place_door(&door, "oak_door", Facing::North, Hinge::Left);
        f.links.link(&door, rid("jcell1")).unwrap();
        f.links.link(&BlockLocation::new("world", 9, 64, 9), rid("jcell1")).unwrap();
        let gone = door.offset(4, 0, 0);
        f.world.place_door(&gone, "oak_door", Facing::North, Hinge::Left);
        f.links.link(&gone, rid("gone1")).unwrap();

        let first = f.engine.full_sync().await;
        assert_eq!(first.valid_regions(), 2);
        assert_eq!(first.invalid_regions(), 1);
        assert_eq!(first.orphaned_links(), 2);
        assert_eq!(first.door_resyncs(), 1);
        assert_eq!(f.groups.get("jcells").unwrap().region_count(), 2);
        assert_eq!(f.links.len(), 1);

        let messages: Vec<(Pass, &str)> = first
            .findings()
            .iter()
            .map(|finding| (finding.pass, finding.message.as_str()))
            .collect();
        assert_eq!(
            messages,
            vec![
                (Pass::GroupRegions, "Invalid region in group 'jcells': jcell3"),
                (Pass::OrphanedLinks, "Orphaned door link: world:4:64:0 -> gone1"),
                (Pass::OrphanedLinks, "Invalid door location: world:9:64:9"),
            ]
        );

        let second = f.engine.full_sync().await;
        assert_eq!(second.invalid_regions(), 0);
        assert_eq!(second.orphaned_links(), 0);
        assert!(!second.has_issues());
    }

    #[tokio::test]
    async fn test_orphaned_links_counted_when_save_fails() {
        let f = fixture();
        seed(&f);
        f.links.link(&BlockLocation::new("world", 9, 64, 9), rid("jcell1")).unwrap();
        f.link_storage.set_fail_writes(true);

        let result = f.engine.full_sync().await;
        assert_eq!(result.orphaned_links(), 1);
        assert!(f.links.is_empty());
        assert!(result
            .findings()
            .iter()
            .any(|finding| finding.message.starts_with("Removed 1 links but saving links failed")));
    }

    #[tokio::test]
    async fn test_source_failure_removes_nothing() {
        let f = fixture();
        seed(&f);
        let door = BlockLocation::new("world", 0, 64, 0);
        f.world.place_door(&door, "oak_door", Facing::North, Hinge::Left);
        f.links.link(&door, rid("gone1")).unwrap();
        f.regions.set_unavailable(true);

        let result = f.engine.full_sync().await;
        assert_eq!(result.invalid_regions(), 0);
        assert_eq!(result.orphaned_links(), 0);
        assert!(result.has_issues());
        assert_eq!(f.groups.get("jcells").unwrap().region_count(), 3);
        assert_eq!(f.links.len(), 1);
    }

    #[tokio::test]
    async fn test_advisory_passes() {
        let f = fixture();
        f.groups.create("acells").unwrap();
        f.regions.insert(Region::new(rid("acell4"), "world"));
        f.regions
            .insert(Region::new(rid("lonely"), "world").with_member(ActorId::generate()));
        f.regions.insert(
            Region::new(rid("ghosted"), "world")
                .owned_by(ActorId::generate())
                .with_unresolved_member(),
        );

        let result = f.engine.full_sync().await;
        assert_eq!(result.ungrouped_suggestions(), 1);
        assert_eq!(result.ownership_anomalies(), 2);
        assert!(result
            .findings()
            .iter()
            .any(|finding| finding.message == "Region 'lonely' has members but no owner"));
        assert_eq!(f.regions.len(), 3);
    }

    #[tokio::test]
    async fn test_spawned_sync() {
        let f = fixture();
        seed(&f);
        let handle = f.engine.spawn_full_sync();
        let result = handle.wait().await.unwrap();
        assert_eq!(result.mode(), ReconcileMode::Full);
        assert_eq!(f.engine.last_run().map(|r| r.invalid_regions()), Some(1));
    }
}
