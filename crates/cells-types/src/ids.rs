//! Strongly-typed identifiers.
//!
//! Region ids and group names share one rule: after trimming, 1 to 32
//! characters from `[A-Za-z0-9_-]`. Actors are UUID-based.

use crate::error::{Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const MAX_IDENTIFIER_LENGTH: usize = 32;
pub const MAX_DISPLAY_NAME_LENGTH: usize = 64;

/// Trim and validate an identifier, returning the normalized form.
pub fn validate_identifier(kind: &'static str, raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { kind });
    }
    if trimmed.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong {
            kind,
            value: trimmed.to_string(),
            max: MAX_IDENTIFIER_LENGTH,
        });
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::InvalidCharacters {
            kind,
            value: trimmed.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

pub fn is_valid_identifier(raw: &str) -> bool {
    validate_identifier("identifier", raw).is_ok()
}

/// Trim and bound a human-readable label.
pub fn validate_display_name(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty {
            kind: "display name",
        });
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            kind: "display name",
            value: trimmed.to_string(),
            max: MAX_DISPLAY_NAME_LENGTH,
        });
    }
    Ok(trimmed.to_string())
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self> {
                validate_identifier($kind, raw).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

identifier!(
    /// Identifier of a leasable region (cell) in the marketplace.
    RegionId,
    "region id"
);

identifier!(
    /// Unique, immutable name of a group.
    GroupName,
    "group name"
);

/// Identifier of an actor (player) in the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(Uuid);

impl ActorId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ActorId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ValidationError::InvalidActor(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identifier_is_trimmed() {
        let id = RegionId::parse("  jcell1 ").unwrap();
        assert_eq!(id.as_str(), "jcell1");
    }

    #[test]
    fn test_identifier_rejections() {
        assert!(matches!(
            GroupName::parse("   "),
            Err(ValidationError::Empty { .. })
        ));
        assert!(matches!(
            GroupName::parse(&"a".repeat(33)),
            Err(ValidationError::TooLong { max: 32, .. })
        ));
        assert!(matches!(
            RegionId::parse("cell 1"),
            Err(ValidationError::InvalidCharacters { .. })
        ));
        assert!(RegionId::parse("cell.1").is_err());
        assert!(RegionId::parse(&"a".repeat(32)).is_ok());
    }

    #[test]
    fn test_display_name_bounds() {
        assert_eq!(validate_display_name(" J Cells ").unwrap(), "J Cells");
        assert!(validate_display_name(&"d".repeat(65)).is_err());
    }

    #[test]
    fn test_region_id_serde_validates() {
        let ok: RegionId = serde_json::from_str("\"acell7\"").unwrap();
        assert_eq!(ok.as_str(), "acell7");
        assert!(serde_json::from_str::<RegionId>("\"bad id\"").is_err());
    }

    #[test]
    fn test_actor_id_round_trip_display() {
        let actor = ActorId::generate();
        let parsed: ActorId = actor.to_string().parse().unwrap();
        assert_eq!(actor, parsed);
        assert!("not-a-uuid".parse::<ActorId>().is_err());
    }

    proptest! {
        #[test]
        fn valid_identifiers_are_accepted(raw in "[A-Za-z0-9_-]{1,32}") {
            let name = GroupName::parse(&raw).unwrap();
            prop_assert_eq!(name.as_str(), raw.as_str());
        }

        #[test]
        fn identifiers_with_foreign_chars_are_rejected(
            head in "[a-z]{1,10}",
            bad in "[ .:/!@#]",
            tail in "[a-z]{1,10}",
        ) {
            let raw = format!("{head}{bad}{tail}");
            prop_assert!(!is_valid_identifier(&raw));
        }
    }
}
