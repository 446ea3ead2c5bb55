//! Bounded undo/redo history of change deltas

use crate::delta::{ChangeDelta, DeltaTarget};
use core_types::DeltaId;

/// Ordered log of committed deltas plus the one currently being recorded.
///
/// The undo cursor sits between the two stacks: everything on the undo
/// stack has been applied, everything on the redo stack has been reverted.
#[derive(Debug)]
pub struct History<R> {
    current: ChangeDelta<R>,
    undo_stack: Vec<ChangeDelta<R>>,
    redo_stack: Vec<ChangeDelta<R>>,
    capacity: usize,
}

impl<R: Clone> History<R> {
    /// Creates a history that keeps at most `capacity` committed deltas
    pub fn new(capacity: usize) -> Self {
        Self {
            current: ChangeDelta::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// The open delta new edits are recorded into
    pub fn current_change(&mut self) -> &mut ChangeDelta<R> {
        &mut self.current
    }

    /// Closes the open delta.
    ///
    /// Returns the committed delta's id, or `None` when nothing was recorded.
    pub fn commit(&mut self) -> Option<DeltaId> {
        if self.current.is_empty() {
            return None;
        }
        let delta = std::mem::take(&mut self.current);
        let id = delta.id();
        self.undo_stack.push(delta);
        // New edit invalidates anything that was undone
        self.redo_stack.clear();
        if self.undo_stack.len() > self.capacity {
            self.undo_stack.remove(0);
        }
        tracing::debug!(delta = %id, depth = self.undo_stack.len(), "Committed change");
        Some(id)
    }

    /// Reverts the open delta and starts a fresh one
    pub fn discard_current<T: DeltaTarget<R> + ?Sized>(&mut self, target: &mut T) {
        let delta = std::mem::take(&mut self.current);
        if !delta.is_empty() {
            delta.revert(target);
            tracing::debug!(delta = %delta.id(), "Discarded uncommitted change");
        }
    }

    /// Undoes the most recent change, committing any open delta first
    pub fn undo<T: DeltaTarget<R> + ?Sized>(&mut self, target: &mut T) -> bool {
        self.commit();
        match self.undo_stack.pop() {
            Some(delta) => {
                delta.revert(target);
                tracing::debug!(delta = %delta.id(), "Undo");
                self.redo_stack.push(delta);
                true
            }
            None => false,
        }
    }

    /// Reapplies the most recently undone change
    pub fn redo<T: DeltaTarget<R> + ?Sized>(&mut self, target: &mut T) -> bool {
        if !self.current.is_empty() {
            return false;
        }
        match self.redo_stack.pop() {
            Some(delta) => {
                delta.reapply(target);
                tracing::debug!(delta = %delta.id(), "Redo");
                self.undo_stack.push(delta);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty() || !self.current.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty() && self.current.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Id of the newest committed delta
    pub fn last_committed(&self) -> Option<DeltaId> {
        self.undo_stack.last().map(ChangeDelta::id)
    }

    /// Drops every delta, keeping the current state
    pub fn clear(&mut self) {
        self.current = ChangeDelta::new();
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
