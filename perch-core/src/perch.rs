use serde::{Deserialize, Serialize};
use std::fmt;

/// One sensor/output channel pair of the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PerchId {
    One,
    Two,
}

impl PerchId {
    pub const ALL: [PerchId; 2] = [PerchId::One, PerchId::Two];

    pub fn number(self) -> u8 {
        match self {
            PerchId::One => 1,
            PerchId::Two => 2,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(PerchId::One),
            2 => Some(PerchId::Two),
            _ => None,
        }
    }

    /// The perch on the opposite side of the rig.
    pub fn other(self) -> Self {
        match self {
            PerchId::One => PerchId::Two,
            PerchId::Two => PerchId::One,
        }
    }

    pub fn index(self) -> usize {
        self.number() as usize - 1
    }

    /// Output routing for stimuli triggered from this perch: perch 1 sounds
    /// on the left channel only, perch 2 on the right.
    pub fn pan(self) -> Pan {
        match self {
            PerchId::One => Pan::LEFT,
            PerchId::Two => Pan::RIGHT,
        }
    }
}

impl fmt::Display for PerchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl From<PerchId> for u8 {
    fn from(p: PerchId) -> u8 {
        p.number()
    }
}

impl TryFrom<u8> for PerchId {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        PerchId::from_number(n).ok_or_else(|| format!("no perch numbered {n}"))
    }
}

/// Per-channel volume, each in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pan {
    pub left: f32,
    pub right: f32,
}

impl Pan {
    pub const LEFT: Pan = Pan {
        left: 1.0,
        right: 0.0,
    };
    pub const RIGHT: Pan = Pan {
        left: 0.0,
        right: 1.0,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_round_trips() {
        for p in PerchId::ALL {
            assert_eq!(PerchId::from_number(p.number()), Some(p));
        }
        assert_eq!(PerchId::from_number(0), None);
        assert_eq!(PerchId::from_number(3), None);
    }

    #[test]
    fn perches_pan_to_opposite_channels() {
        assert_eq!(PerchId::One.pan(), Pan::LEFT);
        assert_eq!(PerchId::Two.pan(), Pan::RIGHT);
        assert_eq!(PerchId::One.other(), PerchId::Two);
    }
}
