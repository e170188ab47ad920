//! Persisted layout of the group table.
//!
//! ```yaml
//! version: 1
//! global-limit: -1
//! groups:
//!   jcells:
//!     display-name: J Cells
//!     regions: [jcell1, jcell2]
//!     cell-limit: 2
//!     teleport-cost: 50.0
//!     priority: 1
//!     teleport-access: owner
//!     permission: group:vip
//! ```

use cells_types::{CapabilityToken, CellLimit, Group, GroupOptions, TeleportAccess};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

pub const TABLE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupTable {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_global_limit")]
    pub global_limit: i32,

    #[serde(default)]
    pub groups: BTreeMap<String, GroupRecord>,
}

impl Default for GroupTable {
    fn default() -> Self {
        Self {
            version: TABLE_VERSION,
            global_limit: default_global_limit(),
            groups: BTreeMap::new(),
        }
    }
}

fn default_version() -> u32 {
    TABLE_VERSION
}

fn default_global_limit() -> i32 {
    CellLimit::UNLIMITED.get()
}

/// One group as stored. Options equal to their defaults are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub regions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_limit: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teleport_cost: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teleport_access: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
}

impl GroupRecord {
    pub fn from_group(group: &Group) -> Self {
        let options = group.options();
        Self {
            display_name: Some(group.display_name().to_string()),
            regions: group.regions().into_iter().map(String::from).collect(),
            cell_limit: (options.cell_limit != CellLimit::UNLIMITED)
                .then_some(options.cell_limit.get()),
            teleport_cost: options.teleport_cost,
            priority: (options.priority != 0).then_some(options.priority),
            teleport_access: (options.teleport_access != TeleportAccess::All)
                .then(|| options.teleport_access.to_string()),
            permission: options.required_capability.map(|t| t.to_string()),
        }
    }

    /// Rebuild the group. Malformed options fall back to their defaults with a
    /// warning; a malformed name or display name fails.
    pub fn to_group(&self, name: &str) -> cells_types::Result<Group> {
        let mut options = GroupOptions::default();

        if let Some(limit) = self.cell_limit {
            match CellLimit::new(limit) {
                Ok(limit) => options.cell_limit = limit,
                Err(e) => warn!(group = name, error = %e, "Ignoring stored cell limit"),
            }
        }
        if let Some(cost) = self.teleport_cost {
            match cells_types::normalize_teleport_cost(cost) {
                Ok(cost) => options.teleport_cost = cost,
                Err(e) => warn!(group = name, error = %e, "Ignoring stored teleport cost"),
            }
        }
        if let Some(priority) = self.priority {
            options.priority = priority;
        }
        if let Some(access) = &self.teleport_access {
            match access.parse::<TeleportAccess>() {
                Ok(access) => options.teleport_access = access,
                Err(e) => warn!(group = name, error = %e, "Ignoring stored teleport access"),
            }
        }
        if let Some(permission) = &self.permission {
            match CapabilityToken::parse(permission) {
                Ok(token) => options.required_capability = token,
                Err(e) => warn!(group = name, error = %e, "Ignoring stored permission"),
            }
        }

        let display_name = self.display_name.as_deref().unwrap_or(name);
        Group::hydrate(name, display_name, &self.regions, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_omits_defaults() {
        let group = Group::new("acells").unwrap();
        group.add_region("acell1");
        let yaml = serde_yaml::to_string(&GroupRecord::from_group(&group)).unwrap();

        assert!(yaml.contains("display-name: acells"));
        assert!(yaml.contains("- acell1"));
        assert!(!yaml.contains("cell-limit"));
        assert!(!yaml.contains("priority"));
        assert!(!yaml.contains("teleport-access"));
        assert!(!yaml.contains("permission"));
    }

    #[test]
    fn test_record_keeps_overrides() {
        let group = Group::with_display_name("jcells", "J Cells").unwrap();
        group.set_cell_limit(2);
        group.set_teleport_cost(50.0);
        group.set_priority(3);
        group.set_teleport_access(TeleportAccess::Owner);
        group.set_required_capability("group:vip");

        let record = GroupRecord::from_group(&group);
        let rebuilt = record.to_group("jcells").unwrap();
        assert_eq!(rebuilt.display_name(), "J Cells");
        assert_eq!(rebuilt.options(), group.options());
    }

    #[test]
    fn test_malformed_options_fall_back() {
        let yaml = r#"
display-name: Broken
regions: [b1, "not valid", b2]
cell-limit: -7
teleport-access: sometimes
priority: 4
"#;
        let record: GroupRecord = serde_yaml::from_str(yaml).unwrap();
        let group = record.to_group("broken").unwrap();
        assert_eq!(group.region_count(), 2);
        assert_eq!(group.cell_limit(), CellLimit::UNLIMITED);
        assert_eq!(group.teleport_access(), TeleportAccess::All);
        assert_eq!(group.priority(), 4);
    }

    #[test]
    fn test_table_defaults() {
        let table: GroupTable = serde_yaml::from_str("groups: {}").unwrap();
        assert_eq!(table.version, TABLE_VERSION);
        assert_eq!(table.global_limit, -1);
    }
}
