use crate::perch::PerchId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Counterbalancing assignment for a session.
///
/// Under `A` each perch plays its own pool; under `B` the pools are swapped
/// so that side bias can be separated from stimulus preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    A,
    B,
}

impl Condition {
    pub fn letter(self) -> char {
        match self {
            Condition::A => 'A',
            Condition::B => 'B',
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Condition::A => "Perch 1 plays Perch 1 sounds, Perch 2 plays Perch 2 sounds",
            Condition::B => "Perch 1 plays Perch 2 sounds, Perch 2 plays Perch 1 sounds",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid condition {0:?}, expected A or B")]
pub struct ParseConditionError(pub String);

impl FromStr for Condition {
    type Err = ParseConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Condition::A),
            "B" => Ok(Condition::B),
            _ => Err(ParseConditionError(s.to_string())),
        }
    }
}

/// Maps a perch to the stimulus pool it plays under `condition`.
pub fn resolve_pool(perch: PerchId, condition: Condition) -> PerchId {
    match condition {
        Condition::A => perch,
        Condition::B => perch.other(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_a_is_identity() {
        assert_eq!(resolve_pool(PerchId::One, Condition::A), PerchId::One);
        assert_eq!(resolve_pool(PerchId::Two, Condition::A), PerchId::Two);
    }

    #[test]
    fn condition_b_swaps() {
        for p in PerchId::ALL {
            assert_eq!(resolve_pool(p, Condition::B), resolve_pool(p.other(), Condition::A));
        }
    }

    #[test]
    fn each_condition_is_a_bijection() {
        for c in [Condition::A, Condition::B] {
            assert_ne!(resolve_pool(PerchId::One, c), resolve_pool(PerchId::Two, c));
        }
    }

    #[test]
    fn parses_letters_case_insensitively() {
        assert_eq!(" b ".parse::<Condition>(), Ok(Condition::B));
        assert_eq!("a".parse::<Condition>(), Ok(Condition::A));
        assert!("C".parse::<Condition>().is_err());
        assert!("".parse::<Condition>().is_err());
    }
}
