//! Storage trait definitions.

use super::table::GroupTable;
use crate::error::Result;

/// Backend holding the persisted group table.
///
/// Calls are synchronous; callers batch mutations and save once per
/// user-visible action.
pub trait GroupTableStorage: Send + Sync {
    /// Read the stored table. `None` when nothing has been stored yet.
    fn load(&self) -> Result<Option<GroupTable>>;

    /// Replace the stored table.
    fn store(&self, table: &GroupTable) -> Result<()>;

    /// Human-readable location for log lines.
    fn describe(&self) -> String;
}
