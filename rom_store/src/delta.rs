//! Reversible record of one logical operation

use crate::byte_store::{value_to_le_bytes, ByteStore, StoreError};
use core_types::{ByteRange, DeltaId};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Before and after value of one byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteChange {
    pub old: u8,
    pub new: u8,
}

/// Before and after length of the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthChange {
    pub old: usize,
    pub new: usize,
    /// Byte used to fill newly added space
    pub filler: u8,
}

/// Something a delta can be replayed onto.
///
/// `R` is the run type kept by the owner's run table. The delta never
/// interprets runs; it only hands back whichever state was recorded.
pub trait DeltaTarget<R> {
    fn byte_store_mut(&mut self) -> &mut ByteStore;

    /// Puts the run table entry at `start` into the given state
    fn restore_run(&mut self, start: usize, run: Option<R>);

    /// Puts the anchor name at `start` into the given state
    fn restore_anchor(&mut self, start: usize, name: Option<String>);
}

impl<R> DeltaTarget<R> for ByteStore {
    fn byte_store_mut(&mut self) -> &mut ByteStore {
        self
    }

    fn restore_run(&mut self, _start: usize, _run: Option<R>) {}

    fn restore_anchor(&mut self, _start: usize, _name: Option<String>) {}
}

/// Append-only change record for one undoable unit.
///
/// For every key the first `old` value ever recorded is kept and the latest
/// `new` value wins, so a delta always spans from the state before the
/// operation to the state after it.
#[derive(Debug, Clone)]
pub struct ChangeDelta<R> {
    id: DeltaId,
    data: BTreeMap<usize, ByteChange>,
    length: Option<LengthChange>,
    runs: BTreeMap<usize, (Option<R>, Option<R>)>,
    anchors: BTreeMap<usize, (Option<String>, Option<String>)>,
}

impl<R: Clone> ChangeDelta<R> {
    pub fn new() -> Self {
        Self {
            id: DeltaId::new(),
            data: BTreeMap::new(),
            length: None,
            runs: BTreeMap::new(),
            anchors: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> DeltaId {
        self.id
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
            && self.length.is_none()
            && self.runs.is_empty()
            && self.anchors.is_empty()
    }

    /// Writes one byte. Returns whether the stored value changed.
    pub fn change_data(
        &mut self,
        store: &mut ByteStore,
        address: usize,
        value: u8,
    ) -> Result<bool, StoreError> {
        store.check_bounds(address, 1)?;
        let old = store[address];
        if old == value {
            return Ok(false);
        }
        match self.data.entry(address) {
            // Written back to its original value: the byte no longer differs
            Entry::Occupied(entry) if entry.get().old == value => {
                entry.remove();
            }
            Entry::Occupied(mut entry) => entry.get_mut().new = value,
            Entry::Vacant(entry) => {
                entry.insert(ByteChange { old, new: value });
            }
        }
        store.set(address, value);
        Ok(true)
    }

    /// Writes a run of bytes. Nothing is written if any byte would be out of bounds.
    pub fn write_bytes(
        &mut self,
        store: &mut ByteStore,
        address: usize,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        store.check_bounds(address, bytes.len())?;
        for (offset, byte) in bytes.iter().enumerate() {
            self.change_data(store, address + offset, *byte)?;
        }
        Ok(())
    }

    /// Writes a little-endian integer of 1 to 4 bytes
    pub fn write_value(
        &mut self,
        store: &mut ByteStore,
        address: usize,
        width: usize,
        value: u32,
    ) -> Result<(), StoreError> {
        if !(1..=4).contains(&width) {
            return Err(StoreError::InvalidWidth(width));
        }
        self.write_bytes(store, address, &value_to_le_bytes(value, width))
    }

    /// Fills a range with one byte value
    pub fn fill(
        &mut self,
        store: &mut ByteStore,
        range: ByteRange,
        byte: u8,
    ) -> Result<(), StoreError> {
        self.write_bytes(store, range.start, &vec![byte; range.len()])
    }

    /// Grows the buffer to `new_length`, filling new space with `filler`
    pub fn expand_data(
        &mut self,
        store: &mut ByteStore,
        new_length: usize,
        filler: u8,
    ) -> Result<(), StoreError> {
        let current = store.len();
        if new_length < current {
            return Err(StoreError::Shrink {
                current,
                requested: new_length,
            });
        }
        if new_length == current {
            return Ok(());
        }
        match &mut self.length {
            Some(change) => change.new = new_length,
            None => {
                self.length = Some(LengthChange {
                    old: current,
                    new: new_length,
                    filler,
                })
            }
        }
        store.resize(new_length, filler);
        Ok(())
    }

    /// Records a run table transition at `start`
    pub fn record_run(&mut self, start: usize, old: Option<R>, new: Option<R>) {
        match self.runs.entry(start) {
            Entry::Occupied(mut entry) => entry.get_mut().1 = new,
            Entry::Vacant(entry) => {
                entry.insert((old, new));
            }
        }
    }

    /// Records an anchor name transition at `start`
    pub fn record_anchor(&mut self, start: usize, old: Option<String>, new: Option<String>) {
        match self.anchors.entry(start) {
            Entry::Occupied(mut entry) => entry.get_mut().1 = new,
            Entry::Vacant(entry) => {
                entry.insert((old, new));
            }
        }
    }

    /// Addresses whose byte value this delta touched
    pub fn changed_addresses(&self) -> impl Iterator<Item = usize> + '_ {
        self.data.keys().copied()
    }

    pub fn byte_change(&self, address: usize) -> Option<ByteChange> {
        self.data.get(&address).copied()
    }

    pub fn length_change(&self) -> Option<LengthChange> {
        self.length
    }

    /// Run starts whose table entry this delta touched
    pub fn changed_runs(&self) -> impl Iterator<Item = usize> + '_ {
        self.runs.keys().copied()
    }

    /// Restores the state from before this delta
    pub fn revert<T: DeltaTarget<R> + ?Sized>(&self, target: &mut T) {
        let store = target.byte_store_mut();
        for (address, change) in &self.data {
            if *address < store.len() {
                store.set(*address, change.old);
            }
        }
        if let Some(change) = self.length {
            store.resize(change.old, change.filler);
        }
        for (start, (old, _)) in &self.runs {
            target.restore_run(*start, old.clone());
        }
        for (start, (old, _)) in &self.anchors {
            target.restore_anchor(*start, old.clone());
        }
    }

    /// Replays this delta after it has been reverted
    pub fn reapply<T: DeltaTarget<R> + ?Sized>(&self, target: &mut T) {
        let store = target.byte_store_mut();
        if let Some(change) = self.length {
            store.resize(change.new, change.filler);
        }
        for (address, change) in &self.data {
            if *address < store.len() {
                store.set(*address, change.new);
            }
        }
        for (start, (_, new)) in &self.runs {
            target.restore_run(*start, new.clone());
        }
        for (start, (_, new)) in &self.anchors {
            target.restore_anchor(*start, new.clone());
        }
    }
}

impl<R: Clone> Default for ChangeDelta<R> {
    fn default() -> Self {
        Self::new()
    }
}
