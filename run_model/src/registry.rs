//! Sorted run table and the anchor name table

use crate::error::ModelError;
use crate::run::Run;
use run_format::{is_anchor_name, AnchorLookup};
use std::collections::{BTreeMap, HashMap};

/// Address-sorted index of runs plus the anchor bijection.
///
/// Runs never overlap. Anchor names map to exactly one address and an
/// address carries at most one name.
#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    runs: BTreeMap<usize, Run>,
    anchors: BTreeMap<usize, String>,
    names: HashMap<String, usize>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// The run covering `address`, or else the first run after it
    pub fn find_run(&self, address: usize) -> Option<&Run> {
        self.run_covering(address)
            .or_else(|| self.runs.range(address..).next().map(|(_, run)| run))
    }

    /// The run whose range contains `address`
    pub fn run_covering(&self, address: usize) -> Option<&Run> {
        self.runs
            .range(..=address)
            .next_back()
            .map(|(_, run)| run)
            .filter(|run| run.contains(address))
    }

    /// The run starting exactly at `address`
    pub fn run_at(&self, address: usize) -> Option<&Run> {
        self.runs.get(&address)
    }

    pub(crate) fn run_at_mut(&mut self, address: usize) -> Option<&mut Run> {
        self.runs.get_mut(&address)
    }

    /// First run intersecting `[start, start + length)`, ignoring the run at `skip`
    pub fn first_overlap(&self, start: usize, length: usize, skip: Option<usize>) -> Option<&Run> {
        let end = start.saturating_add(length);
        let before = self
            .runs
            .range(..start)
            .next_back()
            .map(|(_, run)| run)
            .filter(|run| run.end() > start && Some(run.start) != skip);
        before.or_else(|| {
            self.runs
                .range(start..end)
                .map(|(_, run)| run)
                .find(|run| Some(run.start) != skip)
        })
    }

    /// Adds a run, failing when it intersects an existing one
    pub fn add_run(&mut self, run: Run) -> Result<(), ModelError> {
        self.check_free(&run, None)?;
        tracing::debug!(start = run.start, length = run.length, kind = run.kind_name(), "Added run");
        self.runs.insert(run.start, run);
        Ok(())
    }

    /// Replaces the run at the same start, or adds it. Returns the old run.
    pub fn replace_run(&mut self, run: Run) -> Result<Option<Run>, ModelError> {
        self.check_free(&run, Some(run.start))?;
        Ok(self.runs.insert(run.start, run))
    }

    fn check_free(&self, run: &Run, skip: Option<usize>) -> Result<(), ModelError> {
        match self.first_overlap(run.start, run.length.max(1), skip) {
            Some(existing) => Err(ModelError::Overlap {
                start: run.start,
                length: run.length,
                existing: existing.start,
            }),
            None => Ok(()),
        }
    }

    /// Removes the run anchored at `start`
    pub fn remove_run(&mut self, start: usize) -> Result<Run, ModelError> {
        let run = self
            .runs
            .remove(&start)
            .ok_or(ModelError::NotFound { address: start })?;
        tracing::debug!(start, kind = run.kind_name(), "Removed run");
        Ok(run)
    }

    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.runs.values()
    }

    /// Binds `name` to `address`, replacing any name the address had.
    ///
    /// Returns the replaced name.
    pub fn set_anchor(&mut self, address: usize, name: &str) -> Result<Option<String>, ModelError> {
        if !is_anchor_name(name) {
            return Err(ModelError::InvalidName {
                name: name.to_string(),
            });
        }
        match self.names.get(name) {
            Some(&bound) if bound != address => {
                return Err(ModelError::NameInUse {
                    name: name.to_string(),
                    address: bound,
                })
            }
            _ => {}
        }
        let old = self.anchors.insert(address, name.to_string());
        if let Some(old) = &old {
            self.names.remove(old);
        }
        self.names.insert(name.to_string(), address);
        Ok(old)
    }

    /// Unbinds whatever name `address` has
    pub fn remove_anchor_at(&mut self, address: usize) -> Option<String> {
        let name = self.anchors.remove(&address)?;
        self.names.remove(&name);
        Some(name)
    }

    pub fn anchor(&self, address: usize) -> Option<&str> {
        self.anchors.get(&address).map(String::as_str)
    }

    /// Address bound to `name`; unknown names resolve to nothing
    pub fn resolve(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn anchors(&self) -> impl Iterator<Item = (usize, &str)> {
        self.anchors.iter().map(|(address, name)| (*address, name.as_str()))
    }

    /// Puts the run table entry at `start` into a recorded state, unchecked
    pub(crate) fn restore_run(&mut self, start: usize, run: Option<Run>) {
        match run {
            Some(run) => {
                self.runs.insert(start, run);
            }
            None => {
                self.runs.remove(&start);
            }
        }
    }

    /// Puts the anchor at `start` into a recorded state.
    ///
    /// Replays may visit addresses in any order, so a name is only unbound
    /// from an address it still points at.
    pub(crate) fn restore_anchor(&mut self, start: usize, name: Option<String>) {
        if let Some(old) = self.anchors.remove(&start) {
            if self.names.get(&old) == Some(&start) {
                self.names.remove(&old);
            }
        }
        if let Some(name) = name {
            if let Some(previous) = self.names.insert(name.clone(), start) {
                if previous != start && self.anchors.get(&previous) == Some(&name) {
                    self.anchors.remove(&previous);
                }
            }
            self.anchors.insert(start, name);
        }
    }
}

impl AnchorLookup for RunRegistry {
    fn anchor_at(&self, address: usize) -> Option<String> {
        self.anchor(address).map(str::to_string)
    }

    fn resolve_anchor(&self, name: &str) -> Option<usize> {
        self.resolve(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RunRegistry {
        let mut registry = RunRegistry::new();
        registry.add_run(Run::data(0x10, 4)).unwrap();
        registry.add_run(Run::data(0x20, 8)).unwrap();
        registry
    }

    #[test]
    fn test_registry_creation() {
        let registry = RunRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.find_run(0), None);
    }

    #[test]
    fn test_find_run_covering_or_following() {
        let registry = registry();
        assert_eq!(registry.find_run(0x12).map(|r| r.start), Some(0x10));
        assert_eq!(registry.find_run(0x14).map(|r| r.start), Some(0x20));
        assert_eq!(registry.find_run(0x00).map(|r| r.start), Some(0x10));
        assert_eq!(registry.find_run(0x28), None);
        assert_eq!(registry.run_covering(0x14), None);
        assert_eq!(registry.run_covering(0x27).map(|r| r.start), Some(0x20));
    }

    #[test]
    fn test_overlap_rejected() {
        let mut registry = registry();
        assert_eq!(
            registry.add_run(Run::data(0x12, 4)),
            Err(ModelError::Overlap {
                start: 0x12,
                length: 4,
                existing: 0x10
            })
        );
        assert!(matches!(
            registry.add_run(Run::data(0x1C, 8)),
            Err(ModelError::Overlap { existing: 0x20, .. })
        ));
        assert!(matches!(
            registry.add_run(Run::data(0x10, 1)),
            Err(ModelError::Overlap { existing: 0x10, .. })
        ));
        registry.add_run(Run::data(0x14, 0xC)).unwrap();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_replace_run_ignores_itself() {
        let mut registry = registry();
        let old = registry.replace_run(Run::data(0x10, 0x10)).unwrap();
        assert_eq!(old.map(|run| run.length), Some(4));
        assert!(registry.replace_run(Run::data(0x10, 0x11)).is_err());
    }

    #[test]
    fn test_remove_missing_run() {
        let mut registry = registry();
        assert_eq!(
            registry.remove_run(0x11),
            Err(ModelError::NotFound { address: 0x11 })
        );
        assert!(registry.remove_run(0x10).is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_anchor_bijection() {
        let mut registry = registry();
        registry.set_anchor(0x10, "items").unwrap();
        assert_eq!(registry.resolve("items"), Some(0x10));
        assert_eq!(registry.anchor(0x10), Some("items"));
        assert_eq!(
            registry.set_anchor(0x20, "items"),
            Err(ModelError::NameInUse {
                name: "items".into(),
                address: 0x10
            })
        );
        let old = registry.set_anchor(0x10, "moves").unwrap();
        assert_eq!(old.as_deref(), Some("items"));
        assert_eq!(registry.resolve("items"), None);
        assert_eq!(registry.resolve("moves"), Some(0x10));
        assert_eq!(registry.remove_anchor_at(0x10).as_deref(), Some("moves"));
        assert_eq!(registry.anchors().count(), 0);
    }

    #[test]
    fn test_invalid_names() {
        let mut registry = registry();
        assert!(registry.set_anchor(0x10, "").is_err());
        assert!(registry.set_anchor(0x10, "has space").is_err());
        assert!(registry.set_anchor(0x10, "data.pokemon.stats").is_ok());
        assert!(matches!(
            registry.set_anchor(0x20, "face"),
            Err(ModelError::InvalidName { .. })
        ));
        assert!(registry.set_anchor(0x20, "null").is_err());
        assert_eq!(registry.resolve("face"), None);
    }

    #[test]
    fn test_restore_anchor_move_in_any_order() {
        let mut registry = RunRegistry::new();
        registry.set_anchor(0x40, "table").unwrap();
        // Undoing a move from 0x10 to 0x40, visiting 0x10 first
        registry.restore_anchor(0x10, Some("table".into()));
        registry.restore_anchor(0x40, None);
        assert_eq!(registry.resolve("table"), Some(0x10));
        assert_eq!(registry.anchor(0x40), None);

        // And visiting the vacated address first
        registry.restore_anchor(0x10, None);
        registry.restore_anchor(0x40, Some("table".into()));
        assert_eq!(registry.resolve("table"), Some(0x40));
        assert_eq!(registry.anchors().count(), 1);
    }
}
