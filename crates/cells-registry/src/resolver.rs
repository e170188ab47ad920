//! Group resolution
//!
//! Read-only algorithms over the [`GroupStore`]: which group governs a region,
//! whether an actor may acquire a region, and what a teleport into it costs.
//! Denials are returned as data with a reason code, never as errors.

use crate::store::GroupStore;
use cells_types::{
    capabilities, AccessPolicy, ActorId, CellLimit, Group, GroupName, RegionSource, TeleportAccess,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why an acquisition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenialReason {
    /// Missing required capability or role group
    Capability,
    /// Group quota reached
    QuotaGroup,
    /// Global quota reached
    QuotaGlobal,
    /// Ownership could not be counted
    SourceUnavailable,
}

impl DenialReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenialReason::Capability => "capability",
            DenialReason::QuotaGroup => "quota-group",
            DenialReason::QuotaGlobal => "quota-global",
            DenialReason::SourceUnavailable => "source-unavailable",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of an acquisition check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionDecision {
    /// Allowed; `group` is the group that admitted the actor, `None` for
    /// ungrouped regions.
    Allow { group: Option<GroupName> },
    Deny {
        reason: DenialReason,
        group: GroupName,
        detail: String,
    },
}

impl AcquisitionDecision {
    pub fn ungrouped() -> Self {
        AcquisitionDecision::Allow { group: None }
    }

    fn deny(reason: DenialReason, group: &Group, detail: impl Into<String>) -> Self {
        AcquisitionDecision::Deny {
            reason,
            group: group.name().clone(),
            detail: detail.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, AcquisitionDecision::Allow { .. })
    }

    pub fn reason(&self) -> Option<DenialReason> {
        match self {
            AcquisitionDecision::Allow { .. } => None,
            AcquisitionDecision::Deny { reason, .. } => Some(*reason),
        }
    }

    pub fn group(&self) -> Option<&GroupName> {
        match self {
            AcquisitionDecision::Allow { group } => group.as_ref(),
            AcquisitionDecision::Deny { group, .. } => Some(group),
        }
    }
}

/// Resolved teleport cost and access mode for a region.
#[derive(Debug, Clone, PartialEq)]
pub struct CostAndAccess {
    pub cost: f64,
    pub access: TeleportAccess,
    /// Primary group, if the region is grouped
    pub group: Option<GroupName>,
    /// Overlapping group whose cheaper cost was applied
    pub discounted_by: Option<GroupName>,
}

/// Used versus allowed cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitUsage {
    pub used: usize,
    pub limit: CellLimit,
}

impl LimitUsage {
    pub fn is_exhausted(&self) -> bool {
        self.limit.enforced().is_some_and(|limit| self.used >= limit)
    }
}

impl fmt::Display for LimitUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.used, self.limit)
    }
}

/// Quota usage of one actor, globally and per group.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitSummary {
    pub global: LimitUsage,
    pub groups: BTreeMap<GroupName, LimitUsage>,
}

pub struct GroupResolver {
    store: Arc<GroupStore>,
    regions: Arc<dyn RegionSource>,
    access: AccessPolicy,
    default_teleport_cost: f64,
}

impl GroupResolver {
    pub fn new(
        store: Arc<GroupStore>,
        regions: Arc<dyn RegionSource>,
        access: AccessPolicy,
        default_teleport_cost: f64,
    ) -> Self {
        Self {
            store,
            regions,
            access,
            default_teleport_cost,
        }
    }

    pub fn store(&self) -> &Arc<GroupStore> {
        &self.store
    }

    pub fn access(&self) -> &AccessPolicy {
        &self.access
    }

    pub fn default_teleport_cost(&self) -> f64 {
        self.default_teleport_cost
    }

    /// Highest-priority group containing `region`. Equal priorities resolve to
    /// the lexicographically smallest name.
    pub fn primary_group_for(&self, region: &str) -> Option<Arc<Group>> {
        self.all_groups_for(region).into_iter().next()
    }

    /// Every group containing `region`, by descending priority then name.
    pub fn all_groups_for(&self, region: &str) -> Vec<Arc<Group>> {
        let mut groups = self.store.groups_containing(region);
        groups.sort_by_key(|g| std::cmp::Reverse(g.priority()));
        groups
    }

    pub async fn can_acquire(&self, actor: &ActorId, group: &Group) -> bool {
        self.check_acquire(actor, group).await.is_allowed()
    }

    /// Admission check for one group: capability, then group quota, then
    /// global quota.
    pub async fn check_acquire(&self, actor: &ActorId, group: &Group) -> AcquisitionDecision {
        if let Some(token) = group.required_capability() {
            if !self.access.satisfies(actor, &token) {
                return AcquisitionDecision::deny(
                    DenialReason::Capability,
                    group,
                    format!("requires {token}"),
                );
            }
        }

        let group_limit = group.cell_limit().enforced();
        let global_limit = self.store.global_limit().enforced();
        if group_limit.is_none() && global_limit.is_none() {
            return AcquisitionDecision::Allow {
                group: Some(group.name().clone()),
            };
        }

        let owned = match self.regions.regions_owned_by(actor).await {
            Ok(owned) => owned,
            Err(e) => {
                warn!(actor = %actor, group = %group.name(), error = %e, "Could not count owned regions");
                return AcquisitionDecision::deny(
                    DenialReason::SourceUnavailable,
                    group,
                    e.to_string(),
                );
            }
        };

        if let Some(limit) = group_limit {
            let in_group = owned
                .iter()
                .filter(|id| group.contains_region(id.as_str()))
                .count();
            if in_group >= limit {
                return AcquisitionDecision::deny(
                    DenialReason::QuotaGroup,
                    group,
                    format!("{in_group}/{limit} cells owned in {}", group.display_name()),
                );
            }
        }

        if let Some(limit) = global_limit {
            if owned.len() >= limit {
                return AcquisitionDecision::deny(
                    DenialReason::QuotaGlobal,
                    group,
                    format!("{}/{limit} cells owned", owned.len()),
                );
            }
        }

        AcquisitionDecision::Allow {
            group: Some(group.name().clone()),
        }
    }

    /// Allow if the region is ungrouped or if any containing group admits the
    /// actor. A refusal carries the primary group's reason.
    pub async fn resolve_for_acquisition(
        &self,
        actor: &ActorId,
        region: &str,
    ) -> AcquisitionDecision {
        let groups = self.all_groups_for(region);
        let mut first_denial = None;

        for group in &groups {
            let decision = self.check_acquire(actor, group).await;
            if decision.is_allowed() {
                debug!(actor = %actor, region, group = %group.name(), "Acquisition allowed");
                return decision;
            }
            first_denial.get_or_insert(decision);
        }

        first_denial.unwrap_or_else(AcquisitionDecision::ungrouped)
    }

    /// Whether `actor` satisfies `group`'s teleport access rules.
    pub async fn grants_access(&self, actor: &ActorId, group: &Group) -> bool {
        if self.access.is_bypassing(actor) {
            return true;
        }
        let required = group.required_capability();
        if let Some(token) = &required {
            if !self.access.satisfies(actor, token) {
                return false;
            }
        }

        match group.teleport_access() {
            TeleportAccess::All => true,
            TeleportAccess::Permission => {
                required.is_some()
                    || self
                        .access
                        .has_capability(actor, &capabilities::group_access(group.name().as_str()))
            }
            TeleportAccess::Owner => match self.regions.regions_owned_by(actor).await {
                Ok(owned) => owned.iter().any(|id| group.contains_region(id.as_str())),
                Err(e) => {
                    warn!(actor = %actor, group = %group.name(), error = %e, "Could not check ownership");
                    false
                }
            },
        }
    }

    /// Teleport cost and access mode for `region`, starting from its primary
    /// group. Ungrouped regions cost the default.
    pub async fn resolve_cost_and_access(&self, actor: &ActorId, region: &str) -> CostAndAccess {
        match self.primary_group_for(region) {
            Some(primary) => self.resolve_cost_for_group(actor, &primary).await,
            None => CostAndAccess {
                cost: self.default_teleport_cost,
                access: TeleportAccess::All,
                group: None,
                discounted_by: None,
            },
        }
    }

    /// Teleport cost and access mode for `group`.
    ///
    /// Starts from the group's own settings. Any other group sharing a region
    /// with it, granting the actor access, and defining a strictly cheaper
    /// cost lowers the cost.
    pub async fn resolve_cost_for_group(&self, actor: &ActorId, group: &Group) -> CostAndAccess {
        let mut resolved = CostAndAccess {
            cost: group.teleport_cost().unwrap_or(self.default_teleport_cost),
            access: group.teleport_access(),
            group: Some(group.name().clone()),
            discounted_by: None,
        };

        for (name, other) in self.store.all() {
            if name == *group.name() || !group.shares_region_with(&other) {
                continue;
            }
            let Some(cost) = other.teleport_cost() else {
                continue;
            };
            if cost >= resolved.cost || !self.grants_access(actor, &other).await {
                continue;
            }
            debug!(actor = %actor, group = %group.name(), discount = %name, cost, "Applying overlap discount");
            resolved.cost = cost;
            resolved.discounted_by = Some(name);
        }

        resolved
    }

    /// Groups whose teleport access the actor satisfies, by name.
    pub async fn accessible_groups(&self, actor: &ActorId) -> Vec<Arc<Group>> {
        let mut accessible = Vec::new();
        for group in self.store.all().into_values() {
            if self.grants_access(actor, &group).await {
                accessible.push(group);
            }
        }
        accessible
    }

    /// Quota usage for `actor`.
    pub async fn limit_summary(
        &self,
        actor: &ActorId,
    ) -> Result<LimitSummary, cells_types::ExternalError> {
        let owned = self.regions.regions_owned_by(actor).await?;
        let groups = self
            .store
            .all()
            .into_iter()
            .map(|(name, group)| {
                let used = owned
                    .iter()
                    .filter(|id| group.contains_region(id.as_str()))
                    .count();
                (
                    name,
                    LimitUsage {
                        used,
                        limit: group.cell_limit(),
                    },
                )
            })
            .collect();

        Ok(LimitSummary {
            global: LimitUsage {
                used: owned.len(),
                limit: self.store.global_limit(),
            },
            groups,
        })
    }
}

impl fmt::Debug for GroupResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupResolver")
            .field("store", &self.store)
            .field("default_teleport_cost", &self.default_teleport_cost)
            .finish_non_exhaustive()
    }
}
