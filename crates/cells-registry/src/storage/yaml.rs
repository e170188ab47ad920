//! YAML file group table storage.

use super::table::GroupTable;
use super::traits::GroupTableStorage;
use crate::error::Result;
use cells_types::write_atomic;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct YamlGroupStorage {
    path: PathBuf,
}

impl YamlGroupStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GroupTableStorage for YamlGroupStorage {
    fn load(&self) -> Result<Option<GroupTable>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_yaml::from_str(&contents)?))
    }

    fn store(&self, table: &GroupTable) -> Result<()> {
        let contents = serde_yaml::to_string(table)?;
        write_atomic(&self.path, contents.as_bytes())?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::GroupRecord;

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = YamlGroupStorage::new(dir.path().join("groups.yml"));
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = YamlGroupStorage::new(dir.path().join("groups.yml"));

        let mut table = GroupTable {
            global_limit: 3,
            ..Default::default()
        };
        table.groups.insert(
            "jcells".to_string(),
            GroupRecord {
                display_name: Some("J Cells".to_string()),
                regions: vec!["jcell1".to_string()],
                ..Default::default()
            },
        );
        storage.store(&table).unwrap();

        let raw = fs::read_to_string(storage.path()).unwrap();
        assert!(raw.contains("global-limit: 3"));
        assert!(raw.contains("display-name: J Cells"));

        assert_eq!(storage.load().unwrap(), Some(table));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.yml");
        fs::write(&path, "groups: [not, a, map").unwrap();
        assert!(YamlGroupStorage::new(path).load().is_err());
    }
}
