//! Host world access.
//!
//! The host runtime owns the blocks; this crate only classifies what stands at
//! a location and asks for open/closed changes.

use cells_types::{BlockLocation, ExternalError};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Door,
    Trapdoor,
    Gate,
}

/// Which half of a two-block-tall door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Half {
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    North,
    East,
    South,
    West,
}

impl Facing {
    /// Clockwise neighbour, seen from above.
    pub fn right(self) -> Self {
        match self {
            Facing::North => Facing::East,
            Facing::East => Facing::South,
            Facing::South => Facing::West,
            Facing::West => Facing::North,
        }
    }

    pub fn left(self) -> Self {
        match self {
            Facing::North => Facing::West,
            Facing::West => Facing::South,
            Facing::South => Facing::East,
            Facing::East => Facing::North,
        }
    }

    /// Unit step (dx, dz).
    pub fn step(self) -> (i32, i32) {
        match self {
            Facing::North => (0, -1),
            Facing::East => (1, 0),
            Facing::South => (0, 1),
            Facing::West => (-1, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hinge {
    Left,
    Right,
}

/// An openable structure at a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    pub kind: StructureKind,
    pub material: String,
    pub half: Half,
    pub facing: Facing,
    pub hinge: Hinge,
    pub open: bool,
}

impl Structure {
    pub fn door(material: impl Into<String>, facing: Facing, hinge: Hinge, half: Half) -> Self {
        Self {
            kind: StructureKind::Door,
            material: material.into(),
            half,
            facing,
            hinge,
            open: false,
        }
    }

    pub fn trapdoor(material: impl Into<String>, facing: Facing) -> Self {
        Self {
            kind: StructureKind::Trapdoor,
            material: material.into(),
            half: Half::Lower,
            facing,
            hinge: Hinge::Left,
            open: false,
        }
    }

    /// Location of the door leaf that would pair with this one.
    pub fn twin_location(&self, at: &BlockLocation) -> Option<BlockLocation> {
        if self.kind != StructureKind::Door {
            return None;
        }
        let side = match self.hinge {
            Hinge::Left => self.facing.right(),
            Hinge::Right => self.facing.left(),
        };
        let (dx, dz) = side.step();
        Some(at.offset(dx, 0, dz))
    }

    /// Whether `other` is the mirrored leaf of a double door with `self`.
    pub fn pairs_with(&self, other: &Structure) -> bool {
        self.kind == StructureKind::Door
            && other.kind == StructureKind::Door
            && self.material == other.material
            && self.facing == other.facing
            && self.half == other.half
            && self.hinge != other.hinge
    }
}

pub trait WorldAccess: Send + Sync {
    fn world_exists(&self, world: &str) -> bool;

    fn structure_at(&self, location: &BlockLocation) -> Option<Structure>;

    fn set_open(&self, location: &BlockLocation, open: bool) -> Result<(), ExternalError>;

    fn play_sound(&self, _location: &BlockLocation, _sound: &str, _volume: f32, _pitch: f32) {}
}

/// In-memory world for development and tests.
///
/// Two-block doors are stored as two entries; `set_open` mirrors the change
/// onto the other half like the host does.
#[derive(Debug, Default)]
pub struct InMemoryWorld {
    worlds: DashSet<String>,
    structures: DashMap<BlockLocation, Structure>,
    failing: DashSet<BlockLocation>,
    sounds: Mutex<Vec<(BlockLocation, String)>>,
}

impl InMemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_world(&self, world: impl Into<String>) {
        self.worlds.insert(world.into());
    }

    pub fn place(&self, location: BlockLocation, structure: Structure) {
        self.worlds.insert(location.world.clone());
        self.structures.insert(location, structure);
    }

    /// Place both halves of a door with its lower half at `lower`.
    pub fn place_door(&self, lower: &BlockLocation, material: &str, facing: Facing, hinge: Hinge) {
        self.place(lower.clone(), Structure::door(material, facing, hinge, Half::Lower));
        self.place(lower.above(), Structure::door(material, facing, hinge, Half::Upper));
    }

    pub fn remove(&self, location: &BlockLocation) -> Option<Structure> {
        self.structures.remove(location).map(|(_, s)| s)
    }

    /// Make `set_open` fail at `location`.
    pub fn fail_at(&self, location: BlockLocation) {
        self.failing.insert(location);
    }

    pub fn heal(&self, location: &BlockLocation) {
        self.failing.remove(location);
    }

    pub fn is_open(&self, location: &BlockLocation) -> Option<bool> {
        self.structures.get(location).map(|s| s.open)
    }

    pub fn played_sounds(&self) -> Vec<(BlockLocation, String)> {
        self.sounds.lock().clone()
    }
}

impl WorldAccess for InMemoryWorld {
    fn world_exists(&self, world: &str) -> bool {
        self.worlds.contains(world)
    }

    fn structure_at(&self, location: &BlockLocation) -> Option<Structure> {
        self.structures.get(location).map(|s| s.clone())
    }

    fn set_open(&self, location: &BlockLocation, open: bool) -> Result<(), ExternalError> {
        if self.failing.contains(location) {
            return Err(ExternalError::rejected("world", format!("cannot change {location}")));
        }
        let half = {
            let mut structure = self
                .structures
                .get_mut(location)
                .ok_or_else(|| ExternalError::rejected("world", format!("nothing at {location}")))?;
            structure.open = open;
            structure.half
        };

        let other = match half {
            Half::Lower => location.above(),
            Half::Upper => location.below(),
        };
        if let Some(mut structure) = self.structures.get_mut(&other) {
            if structure.kind == StructureKind::Door && structure.half != half {
                structure.open = open;
            }
        }
        Ok(())
    }

    fn play_sound(&self, location: &BlockLocation, sound: &str, _volume: f32, _pitch: f32) {
        self.sounds.lock().push((location.clone(), sound.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twin_location() {
        let at = BlockLocation::new("world", 0, 64, 0);
        let left = Structure::door("oak_door", Facing::North, Hinge::Left, Half::Lower);
        assert_eq!(left.twin_location(&at), Some(BlockLocation::new("world", 1, 64, 0)));

        let right = Structure::door("oak_door", Facing::North, Hinge::Right, Half::Lower);
        assert_eq!(right.twin_location(&at), Some(BlockLocation::new("world", -1, 64, 0)));

        assert!(Structure::trapdoor("oak_trapdoor", Facing::East)
            .twin_location(&at)
            .is_none());
    }

    #[test]
    fn test_pairing_rules() {
        let left = Structure::door("oak_door", Facing::North, Hinge::Left, Half::Lower);
        let right = Structure::door("oak_door", Facing::North, Hinge::Right, Half::Lower);
        let turned = Structure::door("oak_door", Facing::South, Hinge::Right, Half::Lower);
        let iron = Structure::door("iron_door", Facing::North, Hinge::Right, Half::Lower);

        assert!(left.pairs_with(&right));
        assert!(!left.pairs_with(&left));
        assert!(!left.pairs_with(&turned));
        assert!(!left.pairs_with(&iron));
    }

    #[test]
    fn test_in_memory_world_mirrors_halves() {
        let world = InMemoryWorld::new();
        let lower = BlockLocation::new("world", 5, 64, 5);
        world.place_door(&lower, "oak_door", Facing::East, Hinge::Left);

        world.set_open(&lower.above(), true).unwrap();
        assert_eq!(world.is_open(&lower), Some(true));
        assert!(world.world_exists("world"));

        world.fail_at(lower.clone());
        assert!(world.set_open(&lower, false).is_err());
        assert!(world.set_open(&BlockLocation::new("world", 0, 0, 0), true).is_err());
    }
}
