#![allow(dead_code)]

use cells_links::{InMemoryLinkStorage, InMemoryWorld};
use cells_registry::InMemoryGroupStorage;
use cells_service::{
    CellsConfig, CellsRuntime, Collaborators, InMemoryEconomy, InMemoryRentalMarket,
    RecordingTeleporter,
};
use cells_types::{
    capabilities, ActorId, InMemoryRegionSource, ManualClock, Region, RegionId,
    StaticCapabilities,
};
use std::sync::Arc;

pub struct Harness {
    pub runtime: CellsRuntime,
    pub regions: Arc<InMemoryRegionSource>,
    pub caps: Arc<StaticCapabilities>,
    pub world: Arc<InMemoryWorld>,
    pub economy: Arc<InMemoryEconomy>,
    pub teleporter: Arc<RecordingTeleporter>,
    pub market: Arc<InMemoryRentalMarket>,
    pub clock: Arc<ManualClock>,
    pub group_storage: Arc<InMemoryGroupStorage>,
    pub admin: ActorId,
}

pub fn harness() -> Harness {
    harness_with(CellsConfig::default())
}

pub fn harness_with(config: CellsConfig) -> Harness {
    let regions = Arc::new(InMemoryRegionSource::new());
    let caps = Arc::new(StaticCapabilities::new());
    let world = Arc::new(InMemoryWorld::new());
    let economy = Arc::new(InMemoryEconomy::new());
    let teleporter = Arc::new(RecordingTeleporter::new());
    let market = Arc::new(InMemoryRentalMarket::new());
    let clock = Arc::new(ManualClock::default());
    let group_storage = Arc::new(InMemoryGroupStorage::new());

    let host = Collaborators::new(
        regions.clone(),
        caps.clone(),
        world.clone(),
        economy.clone(),
        teleporter.clone(),
        market.clone(),
    )
    .with_clock(clock.clone())
    .with_storage(group_storage.clone(), Arc::new(InMemoryLinkStorage::new()));

    let admin = ActorId::generate();
    caps.grant(admin, capabilities::ADMIN);

    Harness {
        runtime: CellsRuntime::new(config, host),
        regions,
        caps,
        world,
        economy,
        teleporter,
        market,
        clock,
        group_storage,
        admin,
    }
}

pub fn rid(raw: &str) -> RegionId {
    RegionId::parse(raw).unwrap()
}

impl Harness {
    /// Put regions into the marketplace, unowned.
    pub fn market_regions(&self, ids: &[&str]) {
        for id in ids {
            self.regions.insert(Region::new(rid(id), "world"));
        }
    }

    pub fn give(&self, actor: ActorId, id: &str) {
        self.regions.insert(Region::new(rid(id), "world").owned_by(actor));
    }
}
