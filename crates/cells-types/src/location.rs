use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A block position in a named world.
///
/// The canonical key form is `world:x:y:z`; it is what the link table stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockLocation {
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockLocation {
    pub fn new(world: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    pub fn key(&self) -> String {
        self.to_string()
    }

    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.world.clone(), self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn below(&self) -> Self {
        self.offset(0, -1, 0)
    }

    pub fn above(&self) -> Self {
        self.offset(0, 1, 0)
    }
}

impl fmt::Display for BlockLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.world, self.x, self.y, self.z)
    }
}

impl FromStr for BlockLocation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidLocation(s.to_string());

        // Coordinates are the last three segments; the world name keeps the rest.
        let mut parts = s.rsplitn(4, ':');
        let z = parts.next().ok_or_else(invalid)?;
        let y = parts.next().ok_or_else(invalid)?;
        let x = parts.next().ok_or_else(invalid)?;
        let world = parts.next().ok_or_else(invalid)?;
        if world.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(
            world,
            x.parse().map_err(|_| invalid())?,
            y.parse().map_err(|_| invalid())?,
            z.parse().map_err(|_| invalid())?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let loc = BlockLocation::new("world", 10, 64, -3);
        assert_eq!(loc.key(), "world:10:64:-3");
        assert_eq!(loc.below().key(), "world:10:63:-3");
    }

    #[test]
    fn test_parse_key() {
        let loc: BlockLocation = "world_nether:-5:70:12".parse().unwrap();
        assert_eq!(loc, BlockLocation::new("world_nether", -5, 70, 12));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("world:1:2".parse::<BlockLocation>().is_err());
        assert!("world:a:2:3".parse::<BlockLocation>().is_err());
        assert!(":1:2:3".parse::<BlockLocation>().is_err());
    }
}
