//! Door link index.
//!
//! Maps physical access points (doors, trapdoors, gates) to the cell they
//! guard. Interacting with either half of a two-block door resolves to the
//! same link, and double doors open and close together.
//!
//! - [`LinkIndex`] — the persistent location → region table and toggling
//! - [`WorldAccess`] — host-world structure lookup and mutation
//! - [`LinkTableStorage`] — YAML and in-memory persistence

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod config;
pub mod error;
pub mod index;
pub mod storage;
pub mod world;

pub use config::{DoorSounds, LinkConfig};
pub use error::{LinkError, Result};
pub use index::{DoorSync, LinkIndex, ToggleOutcome};
pub use storage::{InMemoryLinkStorage, LinkTable, LinkTableStorage, YamlLinkStorage};
pub use world::{Facing, Half, Hinge, InMemoryWorld, Structure, StructureKind, WorldAccess};
