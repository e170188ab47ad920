//! Multi-period rental extension.
//!
//! The marketplace extends one period per call. A request for several periods
//! runs them in order and stops at the first refusal, so the caller learns
//! how many actually went through.

use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use cells_gate::{actions, RateGate};
use cells_types::{AccessPolicy, ActorId, Region, RegionId, RegionKind, RegionSource};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Why the marketplace refused one extension period.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtensionRefusal {
    #[error("maximum rental time reached")]
    LimitReached,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait RentalMarket: Send + Sync {
    async fn extend_once(&self, actor: &ActorId, region: &Region) -> std::result::Result<(), ExtensionRefusal>;
}

/// Rental market with per-region period caps for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryRentalMarket {
    max_periods: DashMap<RegionId, u32>,
    extended: DashMap<RegionId, u32>,
}

impl InMemoryRentalMarket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the total periods `region` may be extended by.
    pub fn set_max_periods(&self, region: RegionId, max: u32) {
        self.max_periods.insert(region, max);
    }

    pub fn extended(&self, region: &str) -> u32 {
        self.extended.get(region).map(|n| *n).unwrap_or(0)
    }
}

#[async_trait]
impl RentalMarket for InMemoryRentalMarket {
    async fn extend_once(&self, _actor: &ActorId, region: &Region) -> std::result::Result<(), ExtensionRefusal> {
        let mut extended = self.extended.entry(region.id.clone()).or_insert(0);
        if let Some(max) = self.max_periods.get(&region.id) {
            if *extended >= *max {
                return Err(ExtensionRefusal::LimitReached);
            }
        }
        *extended += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionOutcome {
    Complete { periods: u32 },
    Partial {
        extended: u32,
        requested: u32,
        reason: ExtensionRefusal,
    },
    Failed {
        requested: u32,
        reason: ExtensionRefusal,
    },
}

impl ExtensionOutcome {
    pub fn extended(&self) -> u32 {
        match self {
            ExtensionOutcome::Complete { periods } => *periods,
            ExtensionOutcome::Partial { extended, .. } => *extended,
            ExtensionOutcome::Failed { .. } => 0,
        }
    }

    pub fn requested(&self) -> u32 {
        match self {
            ExtensionOutcome::Complete { periods } => *periods,
            ExtensionOutcome::Partial { requested, .. } | ExtensionOutcome::Failed { requested, .. } => {
                *requested
            }
        }
    }

    /// `"Extended 2 of 3"`, plus the refusal when incomplete.
    pub fn message(&self) -> String {
        match self {
            ExtensionOutcome::Complete { periods } => format!("Extended {periods} of {periods}"),
            ExtensionOutcome::Partial {
                extended,
                requested,
                reason,
            } => format!("Extended {extended} of {requested} ({reason})"),
            ExtensionOutcome::Failed { requested, reason } => {
                format!("Extended 0 of {requested} ({reason})")
            }
        }
    }
}

#[derive(Clone)]
pub struct RentalService {
    regions: Arc<dyn RegionSource>,
    market: Arc<dyn RentalMarket>,
    gate: Arc<RateGate>,
    access: AccessPolicy,
}

impl RentalService {
    pub fn new(
        regions: Arc<dyn RegionSource>,
        market: Arc<dyn RentalMarket>,
        gate: Arc<RateGate>,
        access: AccessPolicy,
    ) -> Self {
        Self {
            regions,
            market,
            gate,
            access,
        }
    }

    /// Extend a rented region by up to `periods` periods.
    pub async fn extend(&self, actor: &ActorId, region: &str, periods: u32) -> Result<ExtensionOutcome> {
        if periods == 0 {
            return Err(ServiceError::InvalidArgument("periods must be at least 1".to_string()));
        }
        let id = RegionId::parse(region)?;
        let region = self
            .regions
            .find_region(&id)
            .await?
            .ok_or_else(|| ServiceError::RegionNotFound(id.to_string()))?;
        if region.kind != RegionKind::Rent {
            return Err(ServiceError::InvalidArgument(format!("region '{id}' is not rented")));
        }
        if !region.is_owner(actor) && !self.access.is_bypassing(actor) {
            return Err(ServiceError::NotOwner(id.to_string()));
        }
        if !self.gate.try_consume(actor, actions::PURCHASE) {
            return Err(ServiceError::RateLimited {
                action: actions::PURCHASE,
            });
        }

        let mut extended = 0;
        for _ in 0..periods {
            match self.market.extend_once(actor, &region).await {
                Ok(()) => extended += 1,
                Err(reason) => {
                    warn!(actor = %actor, region = %id, extended, requested = periods, reason = %reason, "Rental extension stopped");
                    return Ok(if extended == 0 {
                        ExtensionOutcome::Failed {
                            requested: periods,
                            reason,
                        }
                    } else {
                        ExtensionOutcome::Partial {
                            extended,
                            requested: periods,
                            reason,
                        }
                    });
                }
            }
        }

        info!(actor = %actor, region = %id, periods, "Rental extended");
        Ok(ExtensionOutcome::Complete { periods })
    }
}

impl std::fmt::Debug for RentalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RentalService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_messages() {
        assert_eq!(ExtensionOutcome::Complete { periods: 3 }.message(), "Extended 3 of 3");
        let partial = ExtensionOutcome::Partial {
            extended: 2,
            requested: 3,
            reason: ExtensionRefusal::LimitReached,
        };
        assert_eq!(partial.message(), "Extended 2 of 3 (maximum rental time reached)");
        assert_eq!(partial.extended(), 2);
        assert_eq!(partial.requested(), 3);
    }

    #[tokio::test]
    async fn test_in_memory_market_caps_periods() {
        let market = InMemoryRentalMarket::new();
        let region = Region::new(RegionId::parse("r1").unwrap(), "world").rental();
        market.set_max_periods(region.id.clone(), 1);
        let actor = ActorId::generate();

        assert!(market.extend_once(&actor, &region).await.is_ok());
        assert_eq!(
            market.extend_once(&actor, &region).await,
            Err(ExtensionRefusal::LimitReached)
        );
        assert_eq!(market.extended("r1"), 1);
    }
}
