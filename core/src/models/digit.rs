use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single decimal digit, 0 through 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Digit(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("digit out of range: {0} (expected 0..=9)")]
pub struct DigitOutOfRange(pub i64);

impl Digit {
    pub fn new(value: u8) -> Result<Self, DigitOutOfRange> {
        if value <= 9 {
            Ok(Self(value))
        } else {
            Err(DigitOutOfRange(value as i64))
        }
    }

    /// Parse an ASCII digit character.
    pub fn from_char(c: char) -> Option<Self> {
        c.to_digit(10).map(|d| Self(d as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for Digit {
    type Error = DigitOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for Digit {
    type Error = DigitOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (0..=9).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(DigitOutOfRange(value))
        }
    }
}

impl From<Digit> for u8 {
    fn from(d: Digit) -> Self {
        d.0
    }
}

impl fmt::Display for Digit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
