//! Teleporting an actor to their cell in a group.
//!
//! Payment and movement are two steps against two collaborators. A failed
//! move refunds the withdrawn amount once; a failed refund is logged and
//! reported in the outcome.

use crate::config::TeleportConfig;
use crate::economy::Economy;
use async_trait::async_trait;
use cells_gate::{actions, CooldownTracker, RateGate};
use cells_registry::{GroupResolver, GroupStore};
use cells_types::{
    capabilities, AccessPolicy, ActorId, Clock, ExternalError, Group, Region, RegionId,
    RegionSource,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Moves actors in the host world.
#[async_trait]
pub trait Teleporter: Send + Sync {
    async fn teleport(&self, actor: &ActorId, region: &Region) -> Result<(), ExternalError>;
}

/// Records teleports instead of performing them.
#[derive(Debug, Default)]
pub struct RecordingTeleporter {
    moves: Mutex<Vec<(ActorId, RegionId)>>,
    failing: AtomicBool,
}

impl RecordingTeleporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn moves(&self) -> Vec<(ActorId, RegionId)> {
        self.moves.lock().clone()
    }
}

#[async_trait]
impl Teleporter for RecordingTeleporter {
    async fn teleport(&self, actor: &ActorId, region: &Region) -> Result<(), ExternalError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ExternalError::unavailable("teleporter", "no safe destination"));
        }
        self.moves.lock().push((*actor, region.id.clone()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TeleportOutcome {
    Teleported { region: RegionId, cost: f64 },
    Disabled,
    UnknownGroup,
    RateLimited,
    NoAccess,
    CoolingDown { remaining: Duration },
    /// The actor owns no cell in the group or an overlapping one
    NoCell,
    InsufficientFunds { cost: f64 },
    PaymentFailed { reason: String },
    /// Moving failed after payment; `refunded` tells whether the money came back
    TeleportFailed { reason: String, refunded: bool },
    /// The region marketplace could not answer
    Unavailable { reason: String },
}

impl TeleportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TeleportOutcome::Teleported { .. })
    }
}

pub struct TeleportService {
    config: TeleportConfig,
    groups: Arc<GroupStore>,
    resolver: Arc<GroupResolver>,
    regions: Arc<dyn RegionSource>,
    economy: Arc<dyn Economy>,
    teleporter: Arc<dyn Teleporter>,
    gate: Arc<RateGate>,
    access: AccessPolicy,
    cooldowns: CooldownTracker,
}

impl TeleportService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: TeleportConfig,
        groups: Arc<GroupStore>,
        resolver: Arc<GroupResolver>,
        regions: Arc<dyn RegionSource>,
        economy: Arc<dyn Economy>,
        teleporter: Arc<dyn Teleporter>,
        gate: Arc<RateGate>,
        access: AccessPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cooldowns = CooldownTracker::new(config.cooldown(), clock);
        Self {
            config,
            groups,
            resolver,
            regions,
            economy,
            teleporter,
            gate,
            access,
            cooldowns,
        }
    }

    pub async fn teleport(&self, actor: &ActorId, group: &str) -> TeleportOutcome {
        if !self.config.enabled {
            return TeleportOutcome::Disabled;
        }
        let Some(group) = self.groups.get(group) else {
            return TeleportOutcome::UnknownGroup;
        };
        if !self.gate.try_consume(actor, actions::TELEPORT) {
            return TeleportOutcome::RateLimited;
        }

        let accessible = self.accessible_for(actor, &group).await;
        if accessible.is_empty() {
            return TeleportOutcome::NoAccess;
        }

        if !self.access.has_capability(actor, capabilities::BYPASS_COOLDOWN) {
            if let Some(remaining) = self.cooldowns.remaining(actor) {
                return TeleportOutcome::CoolingDown { remaining };
            }
        }

        let region = match self.find_cell(actor, &accessible).await {
            Ok(Some(region)) => region,
            Ok(None) => return TeleportOutcome::NoCell,
            Err(e) => {
                warn!(actor = %actor, group = %group.name(), error = %e, "Could not look up cells");
                return TeleportOutcome::Unavailable {
                    reason: e.to_string(),
                };
            }
        };

        let cost = self.cost_for(actor, &group).await;
        if cost > 0.0 {
            match self.economy.has(actor, cost).await {
                Ok(true) => {}
                Ok(false) => return TeleportOutcome::InsufficientFunds { cost },
                Err(e) => {
                    return TeleportOutcome::PaymentFailed {
                        reason: e.to_string(),
                    }
                }
            }
            if let Err(e) = self.economy.withdraw(actor, cost).await {
                warn!(actor = %actor, cost, error = %e, "Teleport payment failed");
                return TeleportOutcome::PaymentFailed {
                    reason: e.to_string(),
                };
            }
        }

        if let Err(e) = self.teleporter.teleport(actor, &region).await {
            warn!(actor = %actor, region = %region.id, error = %e, "Teleport failed, refunding");
            let refunded = cost <= 0.0 || self.refund(actor, cost).await;
            return TeleportOutcome::TeleportFailed {
                reason: e.to_string(),
                refunded,
            };
        }

        self.cooldowns.record(actor);
        info!(
            actor = %actor,
            group = %group.name(),
            region = %region.id,
            cost = %self.economy.format(cost),
            "Teleported"
        );
        TeleportOutcome::Teleported {
            region: region.id,
            cost,
        }
    }

    /// The requested group first, then overlapping groups, keeping those the
    /// actor may teleport into.
    async fn accessible_for(&self, actor: &ActorId, group: &Arc<Group>) -> Vec<Arc<Group>> {
        let mut candidates = vec![group.clone()];
        candidates.extend(
            self.groups
                .all()
                .into_values()
                .filter(|other| other.name() != group.name() && group.shares_region_with(other)),
        );

        let mut accessible = Vec::new();
        for candidate in candidates {
            if self.resolver.grants_access(actor, &candidate).await {
                accessible.push(candidate);
            }
        }
        accessible
    }

    async fn find_cell(
        &self,
        actor: &ActorId,
        groups: &[Arc<Group>],
    ) -> Result<Option<Region>, ExternalError> {
        let owned = self.regions.regions_owned_by(actor).await?;
        let found = groups.iter().find_map(|group| {
            group
                .regions()
                .into_iter()
                .find(|id| owned.contains(id))
        });
        match found {
            Some(id) => self.regions.find_region(&id).await,
            None => Ok(None),
        }
    }

    async fn cost_for(&self, actor: &ActorId, group: &Group) -> f64 {
        if self.config.is_free(group.name().as_str())
            || self.access.has_capability(actor, capabilities::BYPASS_PAYMENT)
        {
            return 0.0;
        }
        let resolved = self.resolver.resolve_cost_for_group(actor, group).await;
        if let Some(discount) = &resolved.discounted_by {
            debug!(actor = %actor, group = %group.name(), discount = %discount, cost = resolved.cost, "Discounted teleport");
        }
        resolved.cost.max(0.0)
    }

    async fn refund(&self, actor: &ActorId, cost: f64) -> bool {
        match self.economy.deposit(actor, cost).await {
            Ok(()) => true,
            Err(e) => {
                error!(actor = %actor, cost, error = %e, "Teleport refund failed");
                false
            }
        }
    }

    pub fn clear_cooldown(&self, actor: &ActorId) {
        self.cooldowns.clear(actor);
    }
}

impl std::fmt::Debug for TeleportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeleportService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
