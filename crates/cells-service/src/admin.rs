//! Administrative operations on groups, door links and reconciliation.
//!
//! Every operation requires `cells.admin`. Group edits are rate limited as
//! `group_edit` and bulk additions as `bulk_add`. Mutations persist
//! immediately; a failed save is returned to the caller while the in-memory
//! change stays in place.

use crate::error::{Result, ServiceError};
use cells_gate::{actions, RateGate};
use cells_links::LinkIndex;
use cells_reconcile::{ReconciliationEngine, ReconciliationResult, SyncHandle};
use cells_registry::{
    bulk_add, BulkAddOutcome, GroupResolver, GroupStore, LimitSummary, RegionPattern,
    RegistryError,
};
use cells_types::{
    capabilities, AccessPolicy, ActorId, BlockLocation, Group, RegionId, RegionSource,
    TeleportAccess,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AdminService {
    groups: Arc<GroupStore>,
    resolver: Arc<GroupResolver>,
    links: Arc<LinkIndex>,
    regions: Arc<dyn RegionSource>,
    gate: Arc<RateGate>,
    access: AccessPolicy,
    engine: Arc<ReconciliationEngine>,
}

impl AdminService {
    pub fn new(
        groups: Arc<GroupStore>,
        resolver: Arc<GroupResolver>,
        links: Arc<LinkIndex>,
        regions: Arc<dyn RegionSource>,
        gate: Arc<RateGate>,
        access: AccessPolicy,
        engine: Arc<ReconciliationEngine>,
    ) -> Self {
        Self {
            groups,
            resolver,
            links,
            regions,
            gate,
            access,
            engine,
        }
    }

    fn authorize(&self, actor: &ActorId) -> Result<()> {
        if self.access.has_capability(actor, capabilities::ADMIN) {
            Ok(())
        } else {
            Err(ServiceError::permission_denied(capabilities::ADMIN))
        }
    }

    fn consume(&self, actor: &ActorId, action: &'static str) -> Result<()> {
        if self.gate.try_consume(actor, action) {
            Ok(())
        } else {
            Err(ServiceError::RateLimited { action })
        }
    }

    fn edit(&self, actor: &ActorId) -> Result<()> {
        self.authorize(actor)?;
        self.consume(actor, actions::GROUP_EDIT)
    }

    fn group(&self, name: &str) -> Result<Arc<Group>> {
        self.groups
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.trim().to_string()).into())
    }

    async fn require_region(&self, raw: &str) -> Result<RegionId> {
        let id = RegionId::parse(raw)?;
        match self.regions.find_region(&id).await? {
            Some(_) => Ok(id),
            None => Err(ServiceError::RegionNotFound(id.to_string())),
        }
    }

    fn save_groups(&self) -> Result<()> {
        self.groups.save()?;
        Ok(())
    }

    // Groups

    pub fn create_group(
        &self,
        actor: &ActorId,
        name: &str,
        display_name: Option<&str>,
    ) -> Result<Arc<Group>> {
        self.edit(actor)?;
        let group = match display_name {
            Some(display) => self.groups.create_with_display_name(name, display)?,
            None => self.groups.create(name)?,
        };
        info!(actor = %actor, group = %group.name(), "Group created");
        self.save_groups()?;
        Ok(group)
    }

    /// Delete an empty group.
    pub fn delete_group(&self, actor: &ActorId, name: &str) -> Result<()> {
        self.edit(actor)?;
        let group = self.group(name)?;
        if !group.is_empty() {
            return Err(RegistryError::NotEmpty {
                name: group.name().to_string(),
                regions: group.region_count(),
            }
            .into());
        }
        self.groups.delete(group.name().as_str());
        info!(actor = %actor, group = %group.name(), "Group deleted");
        self.save_groups()
    }

    /// Add an existing marketplace region. Returns `false` if it was already
    /// a member or the group is full.
    pub async fn add_region(&self, actor: &ActorId, group: &str, region: &str) -> Result<bool> {
        self.edit(actor)?;
        let group = self.group(group)?;
        let id = self.require_region(region).await?;
        if !group.add_region(id.as_str()) {
            return Ok(false);
        }
        info!(actor = %actor, group = %group.name(), region = %id, "Region added to group");
        self.save_groups()?;
        Ok(true)
    }

    pub fn remove_region(&self, actor: &ActorId, group: &str, region: &str) -> Result<bool> {
        self.edit(actor)?;
        let group = self.group(group)?;
        if !group.remove_region(region) {
            return Ok(false);
        }
        info!(actor = %actor, group = %group.name(), region = region.trim(), "Region removed from group");
        self.save_groups()?;
        Ok(true)
    }

    /// Add every marketplace region matching `pattern`.
    pub async fn bulk_add(
        &self,
        actor: &ActorId,
        group: &str,
        pattern: &str,
    ) -> Result<BulkAddOutcome> {
        self.authorize(actor)?;
        self.consume(actor, actions::BULK_ADD)?;
        let group = self.group(group)?;
        let pattern = RegionPattern::parse(pattern)?;

        let candidates: Vec<RegionId> = self
            .regions
            .all_regions()
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        let outcome = bulk_add(&group, &pattern, &candidates)?;
        if outcome.added > 0 {
            self.save_groups()?;
        }
        Ok(outcome)
    }

    // Options

    pub fn set_cell_limit(&self, actor: &ActorId, group: &str, limit: i32) -> Result<()> {
        self.edit(actor)?;
        if !self.group(group)?.set_cell_limit(limit) {
            return Err(ServiceError::InvalidArgument(format!("cell limit {limit} is below -1")));
        }
        self.save_groups()
    }

    /// Negative costs reset the group to the default cost.
    pub fn set_teleport_cost(&self, actor: &ActorId, group: &str, cost: f64) -> Result<()> {
        self.edit(actor)?;
        if !self.group(group)?.set_teleport_cost(cost) {
            return Err(ServiceError::InvalidArgument(format!("teleport cost {cost} is not valid")));
        }
        self.save_groups()
    }

    pub fn set_priority(&self, actor: &ActorId, group: &str, priority: i32) -> Result<()> {
        self.edit(actor)?;
        self.group(group)?.set_priority(priority);
        self.save_groups()
    }

    pub fn set_teleport_access(&self, actor: &ActorId, group: &str, mode: &str) -> Result<()> {
        self.edit(actor)?;
        let group = self.group(group)?;
        let mode: TeleportAccess = mode.parse()?;
        group.set_teleport_access(mode);
        self.save_groups()
    }

    /// Set or clear (empty string) the capability required to join the group.
    pub fn set_permission(&self, actor: &ActorId, group: &str, token: &str) -> Result<()> {
        self.edit(actor)?;
        if !self.group(group)?.set_required_capability(token) {
            return Err(ServiceError::InvalidArgument(format!(
                "capability '{}' is not valid",
                token.trim()
            )));
        }
        self.save_groups()
    }

    pub fn set_display_name(&self, actor: &ActorId, group: &str, display_name: &str) -> Result<Arc<Group>> {
        self.edit(actor)?;
        let group = self.groups.replace_display_name(group, display_name)?;
        self.save_groups()?;
        Ok(group)
    }

    pub fn set_global_limit(&self, actor: &ActorId, limit: i32) -> Result<()> {
        self.edit(actor)?;
        self.groups.set_global_limit(limit)?;
        self.save_groups()
    }

    pub async fn limit_summary(&self, actor: &ActorId, target: &ActorId) -> Result<LimitSummary> {
        self.authorize(actor)?;
        Ok(self.resolver.limit_summary(target).await?)
    }

    // Door links

    /// Link a door to an existing region.
    pub async fn link_door(&self, actor: &ActorId, location: &BlockLocation, region: &str) -> Result<()> {
        self.authorize(actor)?;
        let id = self.require_region(region).await?;
        self.links.link(location, id)?;
        Ok(())
    }

    pub fn unlink_door(&self, actor: &ActorId, location: &BlockLocation) -> Result<Option<RegionId>> {
        self.authorize(actor)?;
        Ok(self.links.unlink(location)?)
    }

    pub async fn cleanup_links(&self, actor: &ActorId) -> Result<usize> {
        self.authorize(actor)?;
        Ok(self.links.cleanup_invalid().await?)
    }

    // Reconciliation and diagnostics

    pub async fn quick_check(&self, actor: &ActorId) -> Result<ReconciliationResult> {
        self.authorize(actor)?;
        Ok(self.engine.quick_check().await)
    }

    pub fn full_sync(&self, actor: &ActorId) -> Result<SyncHandle> {
        self.authorize(actor)?;
        Ok(self.engine.spawn_full_sync())
    }

    pub fn last_sync(&self) -> Option<ReconciliationResult> {
        self.engine.last_run()
    }

    /// Tracked actors per rate-limited action.
    pub fn rate_gate_stats(&self, actor: &ActorId) -> Result<BTreeMap<String, usize>> {
        self.authorize(actor)?;
        Ok(self.gate.stats())
    }

    /// Purge expired rate windows, returning how many were dropped.
    pub fn compact_rate_gate(&self, actor: &ActorId) -> Result<usize> {
        self.authorize(actor)?;
        Ok(self.gate.compact())
    }
}

impl std::fmt::Debug for AdminService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminService")
            .field("groups", &self.groups.len())
            .field("links", &self.links.len())
            .finish_non_exhaustive()
    }
}
