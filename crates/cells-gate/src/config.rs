use crate::actions::DEFAULT_CEILINGS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Rate gate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateGateConfig {
    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Maximum actors tracked per action
    #[serde(default = "default_max_tracked_actors")]
    pub max_tracked_actors: usize,

    /// Ceiling for actions without an explicit entry
    #[serde(default = "default_ceiling")]
    pub default_ceiling: u32,

    /// Per-action ceilings
    #[serde(default = "default_ceilings")]
    pub ceilings: BTreeMap<String, u32>,
}

impl RateGateConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn ceiling_for(&self, action: &str) -> u32 {
        self.ceilings
            .get(action)
            .copied()
            .unwrap_or(self.default_ceiling)
    }

    pub fn with_ceiling(mut self, action: impl Into<String>, ceiling: u32) -> Self {
        self.ceilings.insert(action.into(), ceiling);
        self
    }
}

impl Default for RateGateConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_tracked_actors: default_max_tracked_actors(),
            default_ceiling: default_ceiling(),
            ceilings: default_ceilings(),
        }
    }
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_tracked_actors() -> usize {
    1000
}

fn default_ceiling() -> u32 {
    10
}

fn default_ceilings() -> BTreeMap<String, u32> {
    DEFAULT_CEILINGS
        .iter()
        .map(|(action, ceiling)| (action.to_string(), *ceiling))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RateGateConfig::default();
        assert_eq!(config.window(), Duration::from_secs(60));
        assert_eq!(config.ceiling_for("purchase"), 3);
        assert_eq!(config.ceiling_for("bulk_add"), 2);
        assert_eq!(config.ceiling_for("unknown"), 10);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config: RateGateConfig = serde_json::from_str(r#"{"window_secs": 30}"#).unwrap();
        assert_eq!(config.window_secs, 30);
        assert_eq!(config.max_tracked_actors, 1000);
        assert_eq!(config.ceiling_for("door_interact"), 20);
    }
}
