//! View of the authoritative region marketplace.

use crate::error::ExternalError;
use crate::ids::{ActorId, RegionId};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

const SERVICE: &str = "region source";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    #[default]
    Sell,
    Rent,
}

/// A region as reported by the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub world: String,
    pub kind: RegionKind,
    pub sold: bool,
    pub owner: Option<ActorId>,
    /// `None` marks a member reference the marketplace could not resolve.
    pub members: Vec<Option<ActorId>>,
}

impl Region {
    pub fn new(id: RegionId, world: impl Into<String>) -> Self {
        Self {
            id,
            world: world.into(),
            kind: RegionKind::Sell,
            sold: false,
            owner: None,
            members: Vec::new(),
        }
    }

    pub fn rental(mut self) -> Self {
        self.kind = RegionKind::Rent;
        self
    }

    /// Mark the region as sold to `owner`.
    pub fn owned_by(mut self, owner: ActorId) -> Self {
        self.owner = Some(owner);
        self.sold = true;
        self
    }

    pub fn with_member(mut self, member: ActorId) -> Self {
        self.members.push(Some(member));
        self
    }

    pub fn with_unresolved_member(mut self) -> Self {
        self.members.push(None);
        self
    }

    pub fn is_sold(&self) -> bool {
        self.sold
    }

    pub fn owner(&self) -> Option<&ActorId> {
        self.owner.as_ref()
    }

    /// Resolved members only.
    pub fn members(&self) -> impl Iterator<Item = &ActorId> {
        self.members.iter().flatten()
    }

    pub fn is_owner(&self, actor: &ActorId) -> bool {
        self.owner.as_ref() == Some(actor)
    }

    pub fn is_member(&self, actor: &ActorId) -> bool {
        self.members().any(|m| m == actor)
    }

    /// Owner or member.
    pub fn has_access(&self, actor: &ActorId) -> bool {
        self.is_owner(actor) || self.is_member(actor)
    }
}

/// Read access to the region marketplace.
#[async_trait]
pub trait RegionSource: Send + Sync {
    async fn find_region(&self, id: &RegionId) -> Result<Option<Region>, ExternalError>;

    /// Ids of the regions `actor` owns.
    async fn regions_owned_by(&self, actor: &ActorId) -> Result<Vec<RegionId>, ExternalError>;

    async fn all_regions(&self) -> Result<Vec<Region>, ExternalError>;

    async fn region_exists(&self, id: &RegionId) -> Result<bool, ExternalError> {
        Ok(self.find_region(id).await?.is_some())
    }
}

/// In-memory marketplace for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryRegionSource {
    regions: DashMap<RegionId, Region>,
    unavailable: AtomicBool,
}

impl InMemoryRegionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, region: Region) {
        self.regions.insert(region.id.clone(), region);
    }

    pub fn remove(&self, id: &str) -> Option<Region> {
        self.regions.remove(id).map(|(_, region)| region)
    }

    /// Apply `f` to a stored region in place.
    pub fn update<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Region),
    {
        match self.regions.get_mut(id) {
            Some(mut region) => {
                f(&mut region);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Make every call fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), ExternalError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ExternalError::unavailable(SERVICE, "marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl RegionSource for InMemoryRegionSource {
    async fn find_region(&self, id: &RegionId) -> Result<Option<Region>, ExternalError> {
        self.check()?;
        Ok(self.regions.get(id).map(|r| r.value().clone()))
    }

    async fn regions_owned_by(&self, actor: &ActorId) -> Result<Vec<RegionId>, ExternalError> {
        self.check()?;
        let mut owned: Vec<RegionId> = self
            .regions
            .iter()
            .filter(|r| r.is_owner(actor))
            .map(|r| r.id.clone())
            .collect();
        owned.sort();
        Ok(owned)
    }

    async fn all_regions(&self) -> Result<Vec<Region>, ExternalError> {
        self.check()?;
        let mut all: Vec<Region> = self.regions.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}
