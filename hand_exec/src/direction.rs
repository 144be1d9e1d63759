//! Direction signs for sensors and motors

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;
use std::convert::TryFrom;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Sign applied when mapping between logical and hardware quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Forward,
    Reverse,
}

/// The value given for a direction was neither `1` nor `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Expected a direction of 1 or -1, found {0}")]
pub struct InvalidDirection(pub i64);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Direction {
    pub fn sign(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }

    pub fn as_f64(self) -> f64 {
        self.sign() as f64
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Forward
    }
}

impl TryFrom<i64> for Direction {
    type Error = InvalidDirection;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Direction::Forward),
            -1 => Ok(Direction::Reverse),
            v => Err(InvalidDirection(v)),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_direction_from_int() {
        assert_eq!(Direction::try_from(1), Ok(Direction::Forward));
        assert_eq!(Direction::try_from(-1), Ok(Direction::Reverse));
        assert_eq!(Direction::try_from(0), Err(InvalidDirection(0)));
        assert_eq!(Direction::try_from(2), Err(InvalidDirection(2)));

        assert_eq!(Direction::Reverse.sign(), -1);
        assert_eq!(Direction::Forward.as_f64(), 1.0);
    }
}
