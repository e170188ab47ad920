//! Player-facing door interaction.

use cells_gate::{actions, RateGate};
use cells_links::{LinkIndex, ToggleOutcome};
use cells_types::{ActorId, BlockLocation};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoorInteraction {
    /// The toggle ran; see the outcome for what changed
    Toggled(ToggleOutcome),
    /// The door belongs to a region the actor cannot enter
    Denied,
    RateLimited,
}

#[derive(Clone)]
pub struct DoorService {
    links: Arc<LinkIndex>,
    gate: Arc<RateGate>,
}

impl DoorService {
    pub fn new(links: Arc<LinkIndex>, gate: Arc<RateGate>) -> Self {
        Self { links, gate }
    }

    /// Rate gate, then access check, then toggle.
    pub async fn interact(&self, actor: &ActorId, location: &BlockLocation) -> DoorInteraction {
        if !self.gate.try_consume(actor, actions::DOOR_INTERACT) {
            return DoorInteraction::RateLimited;
        }
        if !self.links.can_access(actor, location).await {
            debug!(actor = %actor, location = %location, "Door access denied");
            return DoorInteraction::Denied;
        }
        DoorInteraction::Toggled(self.links.toggle(location, actor))
    }
}

impl std::fmt::Debug for DoorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoorService").finish_non_exhaustive()
    }
}
