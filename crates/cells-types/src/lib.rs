//! # cells-types
//!
//! Core types shared by every cells crate.
//!
//! ## Components
//!
//! - **RegionId / GroupName / ActorId** — validated identifiers
//! - **BlockLocation** — world coordinate with the canonical `world:x:y:z` key
//! - **Group** — named, internally synchronized collection of regions with options
//! - **Region / RegionSource** — view of the authoritative region marketplace
//! - **AccessPolicy** — capability checks with optional external role groups
//! - **Clock** — injectable wall clock for TTL and cooldown evaluation

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod access;
pub mod clock;
pub mod error;
pub mod group;
pub mod ids;
pub mod location;
pub mod persist;
pub mod region;

pub use access::{
    capabilities, AccessPolicy, CapabilityChecker, NoRoleGroups, RoleGroupProvider,
    StaticCapabilities, StaticRoleGroups,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ExternalError, Result, ValidationError};
pub use group::{
    normalize_teleport_cost, CapabilityToken, CellLimit, Group, GroupOptions, TeleportAccess,
    MAX_CAPABILITY_LENGTH, MAX_REGIONS_PER_GROUP, ROLE_GROUP_PREFIX,
};
pub use ids::{
    is_valid_identifier, validate_display_name, validate_identifier, ActorId, GroupName,
    RegionId, MAX_DISPLAY_NAME_LENGTH, MAX_IDENTIFIER_LENGTH,
};
pub use location::BlockLocation;
pub use persist::write_atomic;
pub use region::{InMemoryRegionSource, Region, RegionKind, RegionSource};
