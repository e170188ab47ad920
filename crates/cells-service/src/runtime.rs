//! Explicit construction of every service from configuration and host
//! collaborators.

use crate::admin::AdminService;
use crate::config::CellsConfig;
use crate::doors::DoorService;
use crate::economy::Economy;
use crate::error::Result;
use crate::rental::{RentalMarket, RentalService};
use crate::teleport::{TeleportService, Teleporter};
use cells_gate::RateGate;
use cells_links::{LinkIndex, LinkTableStorage, WorldAccess, YamlLinkStorage};
use cells_reconcile::{ReconcileScheduler, ReconciliationEngine};
use cells_registry::{GroupResolver, GroupStore, GroupTableStorage, YamlGroupStorage};
use cells_types::{
    AccessPolicy, CapabilityChecker, Clock, RegionSource, RoleGroupProvider, SystemClock,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Host-provided collaborators.
///
/// Storage overrides default to YAML files under the configured data
/// directory.
#[derive(Clone)]
pub struct Collaborators {
    pub regions: Arc<dyn RegionSource>,
    pub capabilities: Arc<dyn CapabilityChecker>,
    pub role_groups: Option<Arc<dyn RoleGroupProvider>>,
    pub world: Arc<dyn WorldAccess>,
    pub economy: Arc<dyn Economy>,
    pub teleporter: Arc<dyn Teleporter>,
    pub rental_market: Arc<dyn RentalMarket>,
    pub clock: Arc<dyn Clock>,
    pub group_storage: Option<Arc<dyn GroupTableStorage>>,
    pub link_storage: Option<Arc<dyn LinkTableStorage>>,
}

impl Collaborators {
    pub fn new(
        regions: Arc<dyn RegionSource>,
        capabilities: Arc<dyn CapabilityChecker>,
        world: Arc<dyn WorldAccess>,
        economy: Arc<dyn Economy>,
        teleporter: Arc<dyn Teleporter>,
        rental_market: Arc<dyn RentalMarket>,
    ) -> Self {
        Self {
            regions,
            capabilities,
            role_groups: None,
            world,
            economy,
            teleporter,
            rental_market,
            clock: Arc::new(SystemClock),
            group_storage: None,
            link_storage: None,
        }
    }

    pub fn with_role_groups(mut self, provider: Arc<dyn RoleGroupProvider>) -> Self {
        self.role_groups = Some(provider);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_storage(
        mut self,
        groups: Arc<dyn GroupTableStorage>,
        links: Arc<dyn LinkTableStorage>,
    ) -> Self {
        self.group_storage = Some(groups);
        self.link_storage = Some(links);
        self
    }
}

/// Every cells service, wired together.
pub struct CellsRuntime {
    config: CellsConfig,
    groups: Arc<GroupStore>,
    resolver: Arc<GroupResolver>,
    links: Arc<LinkIndex>,
    gate: Arc<RateGate>,
    engine: Arc<ReconciliationEngine>,
    admin: AdminService,
    doors: DoorService,
    teleport: TeleportService,
    rental: RentalService,
}

impl CellsRuntime {
    pub fn new(config: CellsConfig, host: Collaborators) -> Self {
        let mut access = AccessPolicy::new(host.capabilities.clone());
        if let Some(provider) = &host.role_groups {
            access = access.with_role_groups(provider.clone());
        }

        let group_storage = host.group_storage.clone().unwrap_or_else(|| {
            Arc::new(YamlGroupStorage::new(config.storage.groups_path())) as Arc<dyn GroupTableStorage>
        });
        let link_storage = host.link_storage.clone().unwrap_or_else(|| {
            Arc::new(YamlLinkStorage::new(config.storage.links_path())) as Arc<dyn LinkTableStorage>
        });

        let groups = Arc::new(GroupStore::new(group_storage));
        let resolver = Arc::new(GroupResolver::new(
            groups.clone(),
            host.regions.clone(),
            access.clone(),
            config.teleport.default_cost,
        ));
        let links = Arc::new(LinkIndex::new(
            config.doors.clone(),
            link_storage,
            host.world.clone(),
            host.regions.clone(),
            access.clone(),
            host.clock.clone(),
        ));
        let gate = Arc::new(RateGate::new(
            config.rate_limits.clone(),
            access.clone(),
            host.clock.clone(),
        ));
        let engine = Arc::new(ReconciliationEngine::new(
            groups.clone(),
            links.clone(),
            host.regions.clone(),
            host.clock.clone(),
        ));

        let admin = AdminService::new(
            groups.clone(),
            resolver.clone(),
            links.clone(),
            host.regions.clone(),
            gate.clone(),
            access.clone(),
            engine.clone(),
        );
        let doors = DoorService::new(links.clone(), gate.clone());
        let teleport = TeleportService::new(
            config.teleport.clone(),
            groups.clone(),
            resolver.clone(),
            host.regions.clone(),
            host.economy.clone(),
            host.teleporter.clone(),
            gate.clone(),
            access.clone(),
            host.clock.clone(),
        );
        let rental = RentalService::new(
            host.regions.clone(),
            host.rental_market.clone(),
            gate.clone(),
            access,
        );

        Self {
            config,
            groups,
            resolver,
            links,
            gate,
            engine,
            admin,
            doors,
            teleport,
            rental,
        }
    }

    /// Load the persisted group and link tables.
    pub fn load(&self) -> Result<()> {
        let groups = self.groups.load()?;
        let links = self.links.load()?;
        info!(groups, links, "Cells state loaded");
        Ok(())
    }

    /// Persist both tables.
    pub fn save(&self) -> Result<()> {
        self.groups.save()?;
        self.links.save()?;
        Ok(())
    }

    /// Spawn the reconcile scheduler if enabled.
    pub fn start_scheduler(&self) -> Option<(Arc<ReconcileScheduler>, JoinHandle<()>)> {
        if !self.config.reconcile.enabled {
            info!("Reconcile scheduler disabled");
            return None;
        }
        let (scheduler, trigger_rx) = ReconcileScheduler::new(
            self.engine.clone(),
            self.config.reconcile.interval(),
            self.config.reconcile.run_on_startup,
        );
        let handle = tokio::spawn(scheduler.clone().start(trigger_rx));
        Some((scheduler, handle))
    }

    pub fn config(&self) -> &CellsConfig {
        &self.config
    }

    pub fn groups(&self) -> &Arc<GroupStore> {
        &self.groups
    }

    pub fn resolver(&self) -> &Arc<GroupResolver> {
        &self.resolver
    }

    pub fn links(&self) -> &Arc<LinkIndex> {
        &self.links
    }

    pub fn rate_gate(&self) -> &Arc<RateGate> {
        &self.gate
    }

    pub fn engine(&self) -> &Arc<ReconciliationEngine> {
        &self.engine
    }

    pub fn admin(&self) -> &AdminService {
        &self.admin
    }

    pub fn doors(&self) -> &DoorService {
        &self.doors
    }

    pub fn teleport(&self) -> &TeleportService {
        &self.teleport
    }

    pub fn rental(&self) -> &RentalService {
        &self.rental
    }
}

impl std::fmt::Debug for CellsRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellsRuntime")
            .field("config", &self.config)
            .field("groups", &self.groups.len())
            .field("links", &self.links.len())
            .finish_non_exhaustive()
    }
}
