//! Group aggregate: a named collection of regions with access options.
//!
//! Region membership and options are guarded internally so a `Group` can be
//! shared behind an `Arc` between interactive callers and background
//! reconciliation. Mutators report rejection with `false` rather than an error;
//! only construction fails fast.

use crate::error::{Result, ValidationError};
use crate::ids::{validate_display_name, GroupName, RegionId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const MAX_REGIONS_PER_GROUP: usize = 10_000;
pub const MAX_CAPABILITY_LENGTH: usize = 128;

/// Prefix marking a capability token that names an external role group.
pub const ROLE_GROUP_PREFIX: &str = "group:";

/// Quota on how many regions an actor may hold. `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellLimit(i32);

impl CellLimit {
    pub const UNLIMITED: Self = Self(-1);

    pub fn new(value: i32) -> Result<Self> {
        if value < -1 {
            return Err(ValidationError::LimitOutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i32 {
        self.0
    }

    /// The ceiling to enforce, if any. Zero and `-1` are both unenforced.
    pub fn enforced(self) -> Option<usize> {
        (self.0 > 0).then_some(self.0 as usize)
    }
}

impl Default for CellLimit {
    fn default() -> Self {
        Self::UNLIMITED
    }
}

impl fmt::Display for CellLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.enforced() {
            Some(limit) => write!(f, "{limit}"),
            None => f.write_str("∞"),
        }
    }
}

/// Who may teleport into a group's cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeleportAccess {
    #[default]
    All,
    Owner,
    Permission,
}

impl TeleportAccess {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeleportAccess::All => "all",
            TeleportAccess::Owner => "owner",
            TeleportAccess::Permission => "permission",
        }
    }
}

impl fmt::Display for TeleportAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeleportAccess {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(TeleportAccess::All),
            "owner" => Ok(TeleportAccess::Owner),
            "permission" => Ok(TeleportAccess::Permission),
            _ => Err(ValidationError::UnknownAccessMode(s.to_string())),
        }
    }
}

/// Capability an actor must hold to acquire cells in a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CapabilityToken {
    /// Checked directly against the capability collaborator.
    Capability(String),
    /// Resolved against the external role-group provider.
    RoleGroup(String),
}

impl CapabilityToken {
    /// Parse a raw token. An empty token means "no requirement".
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if trimmed.chars().count() > MAX_CAPABILITY_LENGTH {
            return Err(ValidationError::TooLong {
                kind: "capability",
                value: trimmed.to_string(),
                max: MAX_CAPABILITY_LENGTH,
            });
        }

        let prefix_len = ROLE_GROUP_PREFIX.len();
        let is_role_group = trimmed.len() > prefix_len
            && trimmed.is_char_boundary(prefix_len)
            && trimmed[..prefix_len].eq_ignore_ascii_case(ROLE_GROUP_PREFIX);
        if is_role_group {
            let group = trimmed[prefix_len..].trim();
            if group.is_empty() {
                return Err(ValidationError::Empty { kind: "role group" });
            }
            return Ok(Some(CapabilityToken::RoleGroup(group.to_string())));
        }
        if trimmed.eq_ignore_ascii_case(ROLE_GROUP_PREFIX) {
            return Err(ValidationError::Empty { kind: "role group" });
        }

        Ok(Some(CapabilityToken::Capability(trimmed.to_string())))
    }
}

impl fmt::Display for CapabilityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityToken::Capability(token) => f.write_str(token),
            CapabilityToken::RoleGroup(group) => write!(f, "{ROLE_GROUP_PREFIX}{group}"),
        }
    }
}

/// Optional per-group overrides.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupOptions {
    pub cell_limit: CellLimit,
    /// `None` inherits the configured default cost.
    pub teleport_cost: Option<f64>,
    pub priority: i32,
    pub teleport_access: TeleportAccess,
    pub required_capability: Option<CapabilityToken>,
}

/// Normalize a raw teleport cost. Negative values down to `-1` inherit the default.
pub fn normalize_teleport_cost(cost: f64) -> Result<Option<f64>> {
    if !cost.is_finite() || cost < -1.0 {
        return Err(ValidationError::InvalidCost(cost));
    }
    Ok((cost >= 0.0).then_some(cost))
}

#[derive(Debug, Default, Clone)]
struct RegionSet {
    order: Vec<RegionId>,
    index: HashSet<RegionId>,
}

impl RegionSet {
    fn insert(&mut self, id: RegionId) -> bool {
        if self.index.contains(&id) {
            return false;
        }
        self.index.insert(id.clone());
        self.order.push(id);
        true
    }

    fn remove(&mut self, id: &str) -> bool {
        if !self.index.remove(id) {
            return false;
        }
        self.order.retain(|r| r.as_str() != id);
        true
    }
}

/// A named group of regions.
#[derive(Debug)]
pub struct Group {
    name: GroupName,
    display_name: String,
    regions: RwLock<RegionSet>,
    options: RwLock<GroupOptions>,
    last_modified: RwLock<DateTime<Utc>>,
}

impl Group {
    /// Create an empty group whose display name equals its name.
    pub fn new(name: &str) -> Result<Self> {
        let name = GroupName::parse(name)?;
        let display_name = name.to_string();
        Ok(Self::assemble(name, display_name, RegionSet::default(), GroupOptions::default()))
    }

    pub fn with_display_name(name: &str, display_name: &str) -> Result<Self> {
        let name = GroupName::parse(name)?;
        let display_name = validate_display_name(display_name)?;
        Ok(Self::assemble(name, display_name, RegionSet::default(), GroupOptions::default()))
    }

    /// Rebuild a group from persisted parts.
    ///
    /// Invalid region ids are dropped and entries past the cap are ignored;
    /// name and display name still fail fast.
    pub fn hydrate<I, S>(
        name: &str,
        display_name: &str,
        regions: I,
        options: GroupOptions,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = GroupName::parse(name)?;
        let display_name = validate_display_name(display_name)?;

        let mut set = RegionSet::default();
        for raw in regions {
            let raw = raw.as_ref();
            if set.order.len() >= MAX_REGIONS_PER_GROUP {
                debug!(group = %name, region = raw, "Region cap reached while hydrating");
                break;
            }
            match RegionId::parse(raw) {
                Ok(id) => {
                    set.insert(id);
                }
                Err(e) => debug!(group = %name, error = %e, "Skipping invalid region id"),
            }
        }

        Ok(Self::assemble(name, display_name, set, options))
    }

    /// Copy of this group carrying a new display name; everything else is kept.
    pub fn rebuilt_with_display_name(&self, display_name: &str) -> Result<Self> {
        let display_name = validate_display_name(display_name)?;
        let regions = self.regions.read().clone();
        let options = self.options.read().clone();
        Ok(Self::assemble(self.name.clone(), display_name, regions, options))
    }

    fn assemble(
        name: GroupName,
        display_name: String,
        regions: RegionSet,
        options: GroupOptions,
    ) -> Self {
        Self {
            name,
            display_name,
            regions: RwLock::new(regions),
            options: RwLock::new(options),
            last_modified: RwLock::new(Utc::now()),
        }
    }

    fn touch(&self) {
        *self.last_modified.write() = Utc::now();
    }

    pub fn name(&self) -> &GroupName {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        *self.last_modified.read()
    }

    // Regions

    /// Add a region id. Returns `false` if it is invalid, already present, or
    /// the group is full.
    pub fn add_region(&self, raw: &str) -> bool {
        let Ok(id) = RegionId::parse(raw) else {
            return false;
        };
        let added = {
            let mut regions = self.regions.write();
            if regions.order.len() >= MAX_REGIONS_PER_GROUP {
                debug!(group = %self.name, region = %id, "Group is at region capacity");
                return false;
            }
            regions.insert(id)
        };
        if added {
            self.touch();
        }
        added
    }

    pub fn remove_region(&self, raw: &str) -> bool {
        let removed = self.regions.write().remove(raw.trim());
        if removed {
            self.touch();
        }
        removed
    }

    pub fn contains_region(&self, id: &str) -> bool {
        self.regions.read().index.contains(id.trim())
    }

    /// Snapshot of the region ids in insertion order.
    pub fn regions(&self) -> Vec<RegionId> {
        self.regions.read().order.clone()
    }

    pub fn region_count(&self) -> usize {
        self.regions.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.read().order.is_empty()
    }

    /// Remove every region, returning how many were removed.
    pub fn clear_regions(&self) -> usize {
        let removed = {
            let mut regions = self.regions.write();
            let n = regions.order.len();
            *regions = RegionSet::default();
            n
        };
        if removed > 0 {
            self.touch();
        }
        removed
    }

    /// Whether at least one region belongs to both groups.
    pub fn shares_region_with(&self, other: &Group) -> bool {
        if std::ptr::eq(self, other) {
            return !self.is_empty();
        }
        let mine = self.regions();
        let theirs = other.regions.read();
        mine.iter().any(|id| theirs.index.contains(id))
    }

    // Options

    pub fn options(&self) -> GroupOptions {
        self.options.read().clone()
    }

    pub fn cell_limit(&self) -> CellLimit {
        self.options.read().cell_limit
    }

    pub fn set_cell_limit(&self, limit: i32) -> bool {
        let Ok(limit) = CellLimit::new(limit) else {
            return false;
        };
        self.options.write().cell_limit = limit;
        self.touch();
        true
    }

    pub fn teleport_cost(&self) -> Option<f64> {
        self.options.read().teleport_cost
    }

    pub fn set_teleport_cost(&self, cost: f64) -> bool {
        let Ok(cost) = normalize_teleport_cost(cost) else {
            return false;
        };
        self.options.write().teleport_cost = cost;
        self.touch();
        true
    }

    pub fn priority(&self) -> i32 {
        self.options.read().priority
    }

    pub fn set_priority(&self, priority: i32) {
        self.options.write().priority = priority;
        self.touch();
    }

    pub fn teleport_access(&self) -> TeleportAccess {
        self.options.read().teleport_access
    }

    pub fn set_teleport_access(&self, access: TeleportAccess) {
        self.options.write().teleport_access = access;
        self.touch();
    }

    pub fn required_capability(&self) -> Option<CapabilityToken> {
        self.options.read().required_capability.clone()
    }

    /// Set or clear (with an empty string) the required capability token.
    pub fn set_required_capability(&self, raw: &str) -> bool {
        let Ok(token) = CapabilityToken::parse(raw) else {
            return false;
        };
        self.options.write().required_capability = token;
        self.touch();
        true
    }
}
