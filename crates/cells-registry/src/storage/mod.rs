//! Group table storage backends.
//!
//! The table is persisted as one whole snapshot per save.

pub mod memory;
pub mod table;
pub mod traits;
pub mod yaml;

pub use memory::InMemoryGroupStorage;
pub use table::{GroupRecord, GroupTable};
pub use traits::GroupTableStorage;
pub use yaml::YamlGroupStorage;
