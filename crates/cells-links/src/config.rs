//! Door link configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Minimum spacing between two toggles by the same actor, in milliseconds
    #[serde(default = "default_toggle_cooldown_ms")]
    pub toggle_cooldown_ms: u64,

    /// Materials accepted as linkable structures; empty accepts any door,
    /// trapdoor or gate
    #[serde(default)]
    pub valid_materials: BTreeSet<String>,

    #[serde(default)]
    pub sounds: DoorSounds,
}

impl LinkConfig {
    pub fn toggle_cooldown(&self) -> Duration {
        Duration::from_millis(self.toggle_cooldown_ms)
    }

    pub fn accepts_material(&self, material: &str) -> bool {
        self.valid_materials.is_empty()
            || self
                .valid_materials
                .iter()
                .any(|m| m.eq_ignore_ascii_case(material))
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            toggle_cooldown_ms: default_toggle_cooldown_ms(),
            valid_materials: BTreeSet::new(),
            sounds: DoorSounds::default(),
        }
    }
}

/// Sounds played after a successful toggle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorSounds {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_open_sound")]
    pub open: String,

    #[serde(default = "default_close_sound")]
    pub close: String,

    #[serde(default = "default_unit")]
    pub volume: f32,

    #[serde(default = "default_unit")]
    pub pitch: f32,
}

impl Default for DoorSounds {
    fn default() -> Self {
        Self {
            enabled: true,
            open: default_open_sound(),
            close: default_close_sound(),
            volume: 1.0,
            pitch: 1.0,
        }
    }
}

fn default_toggle_cooldown_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_open_sound() -> String {
    "block.iron_door.open".to_string()
}

fn default_close_sound() -> String {
    "block.iron_door.close".to_string()
}

fn default_unit() -> f32 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.toggle_cooldown(), Duration::from_millis(500));
        assert!(config.accepts_material("oak_door"));
        assert!(config.sounds.enabled);
    }

    #[test]
    fn test_material_filter() {
        let config = LinkConfig {
            valid_materials: ["IRON_DOOR".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert!(config.accepts_material("iron_door"));
        assert!(!config.accepts_material("oak_door"));
    }
}
