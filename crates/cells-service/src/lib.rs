//! # cells-service
//!
//! Wires the cells crates into runnable services.
//!
//! - [`CellsConfig`] — layered configuration (defaults, file, `CELLS__` env)
//! - [`CellsRuntime`] — constructs every service from host [`Collaborators`]
//! - [`AdminService`] — group, door link and reconciliation administration
//! - [`DoorService`] — rate-gated, access-checked door toggling
//! - [`TeleportService`] — paid teleport to an actor's cell with refund on failure
//! - [`RentalService`] — multi-period rental extension with partial results
//!
//! Call [`telemetry::init_tracing`] once at startup to install logging.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod admin;
pub mod config;
pub mod doors;
pub mod economy;
pub mod error;
pub mod rental;
pub mod runtime;
pub mod teleport;
pub mod telemetry;

pub use admin::AdminService;
pub use config::{
    CellsConfig, LoggingConfig, ReconcileConfig, StorageConfig, TeleportConfig,
};
pub use doors::{DoorInteraction, DoorService};
pub use economy::{Economy, InMemoryEconomy};
pub use error::{Result, ServiceError};
pub use rental::{
    ExtensionOutcome, ExtensionRefusal, InMemoryRentalMarket, RentalMarket, RentalService,
};
pub use runtime::{CellsRuntime, Collaborators};
pub use teleport::{RecordingTeleporter, TeleportOutcome, TeleportService, Teleporter};
