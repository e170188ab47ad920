//! Cell group registry.
//!
//! This crate owns the set of named groups and everything that reasons about
//! them without touching the physical world:
//!
//! - [`GroupStore`] — concurrent name → group map, global quota, persistence
//! - [`GroupResolver`] — primary-group lookup, acquisition admission with
//!   cross-group fallback, teleport cost and access with the overlap discount
//! - [`RegionPattern`] — exact, wildcard and numeric-range selection for bulk edits

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod error;
pub mod pattern;
pub mod resolver;
pub mod storage;
pub mod store;

pub use error::{RegistryError, Result};
pub use pattern::{bulk_add, BulkAddOutcome, RegionPattern, MAX_BULK_MATCHES};
pub use resolver::{
    AcquisitionDecision, CostAndAccess, DenialReason, GroupResolver, LimitSummary, LimitUsage,
};
pub use storage::{
    GroupRecord, GroupTable, GroupTableStorage, InMemoryGroupStorage, YamlGroupStorage,
};
pub use store::GroupStore;
