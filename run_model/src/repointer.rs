//! Relocation of runs that outgrow their slot
//!
//! A run that needs more room than its slot grows in place when the bytes
//! after it are unclaimed filler. Otherwise it moves: the new content goes to
//! the first free region found from `free_space_start` (or to the end of the
//! data), the old slot is filled, and every pointer to the old start is
//! rewritten, all inside the caller's delta.

use crate::error::ModelError;
use crate::model::{DataModel, ModelDelta};
use crate::outcome::{DanglingPointerWarning, Relocation, WriteOutcome};
use crate::run::{CountField, Run, RunFormat};
use core_types::{ByteRange, Pointer};
use std::collections::BTreeSet;

impl DataModel {
    /// Writes `content` as the new bytes of the run at `start`, moving the
    /// run when it does not fit. Returns the run's start afterwards.
    pub(crate) fn write_run_content(
        &mut self,
        delta: &mut ModelDelta,
        start: usize,
        content: &[u8],
        format: RunFormat,
    ) -> Result<(WriteOutcome, usize), ModelError> {
        let run = self
            .registry
            .run_at(start)
            .cloned()
            .ok_or(ModelError::NotFound { address: start })?;
        let length = content.len();
        if length > run.length && !self.can_grow_in_place(&run, length) {
            return self.relocate(delta, start, content, format);
        }

        delta.write_bytes(&mut self.store, start, content)?;
        if length < run.length {
            let freed = ByteRange::new(start + length, run.end());
            delta.fill(&mut self.store, freed, self.settings.filler_byte)?;
        }
        self.update_run(delta, start, |run| {
            run.length = length;
            run.format = format;
        })?;
        Ok((WriteOutcome::new(), start))
    }

    /// The bytes after the run are inside the data, unclaimed and filler
    fn can_grow_in_place(&self, run: &Run, length: usize) -> bool {
        let extra = length - run.length;
        run.start + length <= self.store.len()
            && self
                .registry
                .first_overlap(run.end(), extra, Some(run.start))
                .is_none()
            && self
                .store
                .is_filled_with(run.end(), extra, self.settings.filler_byte)
    }

    /// First aligned region of `length` filler bytes that no run covers
    pub fn find_free_space(&self, length: usize) -> Option<usize> {
        let filler = self.settings.filler_byte;
        let data = self.store.as_slice();
        let mut address = self.settings.align(self.settings.free_space_start);
        while address + length <= data.len() {
            if let Some(run) = self.registry.first_overlap(address, length.max(1), None) {
                address = self.settings.align(run.end().max(address + 1));
                continue;
            }
            match data[address..address + length]
                .iter()
                .rposition(|byte| *byte != filler)
            {
                Some(used) => address = self.settings.align(address + used + 1),
                None => return Some(address),
            }
        }
        None
    }

    /// Moves a run to a new slot, keeping its current bytes
    pub fn relocate_run(
        &mut self,
        delta: &mut ModelDelta,
        start: usize,
    ) -> Result<WriteOutcome, ModelError> {
        let run = self
            .registry
            .run_at(start)
            .cloned()
            .ok_or(ModelError::NotFound { address: start })?;
        let content = self.store.slice(start, run.length)?.to_vec();
        let (outcome, _) = self.relocate(delta, start, &content, run.format)?;
        Ok(outcome)
    }

    fn relocate(
        &mut self,
        delta: &mut ModelDelta,
        old_start: usize,
        content: &[u8],
        format: RunFormat,
    ) -> Result<(WriteOutcome, usize), ModelError> {
        let old = self
            .registry
            .run_at(old_start)
            .cloned()
            .ok_or(ModelError::NotFound { address: old_start })?;
        let filler = self.settings.filler_byte;
        let length = content.len();

        let new_start = self
            .find_free_space(length)
            .unwrap_or_else(|| self.settings.align(self.store.len()));
        let target = Pointer::To(new_start);
        let new_pointer = target
            .to_le_bytes()
            .ok_or_else(|| ModelError::unencodable(target))?;

        // Pointers stored inside the run are registered again once it moved
        self.unregister_pointers(delta, old_start)?;

        if new_start + length > self.store.len() {
            delta.expand_data(&mut self.store, new_start + length, filler)?;
        }
        delta.write_bytes(&mut self.store, new_start, content)?;
        delta.fill(&mut self.store, old.range(), filler)?;

        let name = self.unbind_anchor(delta, old_start);
        let old = self.take_run(delta, old_start)?;
        let mut moved = Run::new(new_start, length, format);
        self.put_run(delta, moved.clone())?;
        if let Some(name) = &name {
            self.bind_anchor(delta, new_start, name)?;
        }

        let mut outcome = WriteOutcome::new();
        let mut rewritten = BTreeSet::new();
        let locations: Vec<usize> = self.registry.runs().flat_map(Run::pointer_locations).collect();
        for source in locations {
            if self.read_pointer(source)? == Pointer::To(old_start) {
                delta.write_bytes(&mut self.store, source, &new_pointer)?;
                rewritten.insert(source);
            }
        }
        for &recorded in &old.pointer_sources {
            let source = rebase(recorded, &old, new_start);
            if rewritten.contains(&source) {
                continue;
            }
            let found = self.read_pointer(source).unwrap_or(Pointer::Null);
            if found == Pointer::To(old_start) {
                delta.write_bytes(&mut self.store, source, &new_pointer)?;
                rewritten.insert(source);
            } else {
                tracing::warn!(source, expected = old_start, found = %found, "Dangling pointer source");
                outcome.warnings.push(DanglingPointerWarning {
                    source,
                    expected: old_start,
                    found,
                });
            }
        }
        moved.pointer_sources = rewritten;
        self.put_run(delta, moved)?;

        self.rebase_parent_counts(delta, &old, new_start)?;
        self.register_run_pointers(delta, new_start)?;

        tracing::info!(old_start, new_start, length, name = name.as_deref(), "Relocated run");
        outcome.relocations.push(Relocation {
            old_start,
            new_start,
            length,
            name,
        });
        Ok((outcome, new_start))
    }

    // Streams counted by a field of the moved table follow it
    fn rebase_parent_counts(
        &mut self,
        delta: &mut ModelDelta,
        old: &Run,
        new_start: usize,
    ) -> Result<(), ModelError> {
        let dependents: Vec<(usize, CountField)> = self
            .registry
            .runs()
            .filter_map(|run| {
                let field = run.as_table()?.parent_count?;
                old.contains(field.address).then_some((run.start, field))
            })
            .collect();
        for (start, field) in dependents {
            let address = rebase(field.address, old, new_start);
            self.update_run(delta, start, |run| {
                if let Some(table) = run.as_table_mut() {
                    table.parent_count = Some(CountField { address, ..field });
                }
            })?;
        }
        Ok(())
    }
}

fn rebase(address: usize, old: &Run, new_start: usize) -> usize {
    if old.contains(address) {
        address - old.start + new_start
    } else {
        address
    }
}
