//! Half-open address ranges

use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open range of addresses, `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Creates a range from a start address and a length
    pub const fn with_length(start: usize, length: usize) -> Self {
        Self {
            start,
            end: start + length,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, address: usize) -> bool {
        self.start <= address && address < self.end
    }

    /// Checks whether two ranges share at least one address
    pub fn intersects(&self, other: &ByteRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}..{:06X}", self.start, self.end)
    }
}
