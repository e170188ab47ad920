//! # cells-gate
//!
//! Short-lived admission control for mutating operations.
//!
//! - **RateGate** — per-action rolling windows counting actions per actor,
//!   with bypass capabilities and a cap on tracked actors
//! - **CooldownTracker** — minimum spacing between two uses by the same actor
//!
//! Expiry is evaluated lazily against an injected [`cells_types::Clock`];
//! nothing here spawns timers.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod actions;
pub mod config;
pub mod cooldown;
pub mod gate;

pub use config::RateGateConfig;
pub use cooldown::CooldownTracker;
pub use gate::RateGate;
