//! Results reported by mutating calls
//!
//! Collaborators learn about moved data from these values instead of
//! subscribing to events.

use core_types::Pointer;
use std::fmt;

/// A run that moved to make room for new content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub old_start: usize,
    pub new_start: usize,
    /// Length of the run at its new address
    pub length: usize,
    /// Anchor carried over to the new address
    pub name: Option<String>,
}

/// A recorded pointer source that no longer pointed at the relocated run.
///
/// The relocation still completed; the source was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingPointerWarning {
    pub source: usize,
    pub expected: usize,
    pub found: Pointer,
}

impl fmt::Display for DanglingPointerWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pointer at {:06X} was expected to point to {:06X} but holds {}",
            self.source, self.expected, self.found
        )
    }
}

/// Everything a write did besides writing bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub relocations: Vec<Relocation>,
    pub warnings: Vec<DanglingPointerWarning>,
}

impl WriteOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing moved and nothing was reported
    pub fn is_quiet(&self) -> bool {
        self.relocations.is_empty() && self.warnings.is_empty()
    }

    pub fn merge(&mut self, other: WriteOutcome) {
        self.relocations.extend(other.relocations);
        self.warnings.extend(other.warnings);
    }

    /// Where the run that started at `old_start` ended up
    pub fn relocated_to(&self, old_start: usize) -> Option<usize> {
        self.relocations
            .iter()
            .rev()
            .find(|relocation| relocation.old_start == old_start)
            .map(|relocation| relocation.new_start)
    }
}
