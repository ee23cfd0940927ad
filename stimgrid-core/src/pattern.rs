//! Slice-acquisition patterns.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Named slice-acquisition pattern (the to3d tpattern vocabulary).
///
/// Synonyms such as `seqplus` for `seq+z` parse to the same variant;
/// [`SlicePattern::as_str`] returns the canonical spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub enum SlicePattern {
    /// All slices acquired at the same time (`zero`, `simult`).
    Simultaneous,
    /// Ascending (`seq+z`, `seqplus`).
    SeqPlus,
    /// Descending (`seq-z`, `seqminus`).
    SeqMinus,
    /// Even slices ascending, then odd slices (`alt+z`, `altplus`).
    AltPlus,
    /// Alternating from the top slice downward (`alt-z`, `altminus`).
    AltMinus,
    /// Odd slices ascending, then even slices (`alt+z2`).
    AltPlus2,
    /// Alternating from the second-to-top slice downward (`alt-z2`).
    AltMinus2,
}

impl SlicePattern {
    /// Every pattern with a defined acquisition order, in matching priority.
    pub const ORDERED: [SlicePattern; 6] = [
        SlicePattern::SeqPlus,
        SlicePattern::SeqMinus,
        SlicePattern::AltPlus,
        SlicePattern::AltMinus,
        SlicePattern::AltPlus2,
        SlicePattern::AltMinus2,
    ];

    /// Every accepted spelling, synonyms included.
    pub const NAMES: [&'static str; 12] = [
        "zero", "simult", "seq+z", "seqplus", "seq-z", "seqminus", "alt+z", "altplus", "alt+z2",
        "alt-z", "altminus", "alt-z2",
    ];

    /// Canonical name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simultaneous => "simult",
            Self::SeqPlus => "seq+z",
            Self::SeqMinus => "seq-z",
            Self::AltPlus => "alt+z",
            Self::AltMinus => "alt-z",
            Self::AltPlus2 => "alt+z2",
            Self::AltMinus2 => "alt-z2",
        }
    }

    /// Returns true if slices are acquired in a defined order.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        !matches!(self, Self::Simultaneous)
    }
}

impl FromStr for SlicePattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zero" | "simult" => Ok(Self::Simultaneous),
            "seq+z" | "seqplus" => Ok(Self::SeqPlus),
            "seq-z" | "seqminus" => Ok(Self::SeqMinus),
            "alt+z" | "altplus" => Ok(Self::AltPlus),
            "alt-z" | "altminus" => Ok(Self::AltMinus),
            "alt+z2" => Ok(Self::AltPlus2),
            "alt-z2" => Ok(Self::AltMinus2),
            other => Err(Error::UnknownPattern(other.to_string())),
        }
    }
}

impl TryFrom<String> for SlicePattern {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SlicePattern> for String {
    fn from(pattern: SlicePattern) -> Self {
        pattern.as_str().to_string()
    }
}

impl fmt::Display for SlicePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_parses() {
        for name in SlicePattern::NAMES {
            assert!(name.parse::<SlicePattern>().is_ok(), "{name}");
        }
    }

    #[test]
    fn test_synonyms() {
        assert_eq!("seqplus".parse::<SlicePattern>(), Ok(SlicePattern::SeqPlus));
        assert_eq!("altminus".parse::<SlicePattern>(), Ok(SlicePattern::AltMinus));
        assert_eq!("zero".parse::<SlicePattern>(), Ok(SlicePattern::Simultaneous));
    }

    #[test]
    fn test_canonical_names_round_trip() {
        for pattern in SlicePattern::ORDERED {
            assert_eq!(pattern.as_str().parse::<SlicePattern>(), Ok(pattern));
            assert!(pattern.is_ordered());
        }
        assert!(!SlicePattern::Simultaneous.is_ordered());
    }

    #[test]
    fn test_unknown_pattern() {
        assert_eq!(
            "irregular".parse::<SlicePattern>(),
            Err(Error::UnknownPattern("irregular".into()))
        );
        assert!("alt+z3".parse::<SlicePattern>().is_err());
    }
}
