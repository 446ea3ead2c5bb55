//! The data model facade: bytes, runs and anchors behind one API

use crate::error::ModelError;
use crate::outcome::WriteOutcome;
use crate::registry::RunRegistry;
use crate::run::{CountField, Run, RunFormat, TableRun};
use core_types::{ByteRange, Pointer, POINTER_SIZE};
use model_settings::ModelSettings;
use rom_store::{ByteStore, ChangeDelta, DeltaTarget};
use run_format::{
    is_anchor_name, parse_anchor_declaration, parse_pointer, CountSource, FormatError, NamedLists,
    SegmentKind, StreamFormat, TableFormat, TextContext, TEXT_TERMINATOR,
};
use std::ops::Range;

/// The change record type every model write goes through
pub type ModelDelta = ChangeDelta<Run>;

/// A byte store interpreted through a table of runs and anchors.
///
/// Every mutating call takes the caller's open [`ModelDelta`] so that the
/// whole operation, relocations included, undoes as one unit.
#[derive(Debug, Clone)]
pub struct DataModel {
    pub(crate) store: ByteStore,
    pub(crate) registry: RunRegistry,
    pub(crate) lists: NamedLists,
    pub(crate) settings: ModelSettings,
}

impl DataModel {
    pub fn new(data: Vec<u8>) -> Self {
        Self::with_settings(data, ModelSettings::default())
    }

    pub fn with_settings(data: Vec<u8>, settings: ModelSettings) -> Self {
        Self {
            store: ByteStore::new(data),
            registry: RunRegistry::new(),
            lists: NamedLists::new(),
            settings,
        }
    }

    /// Supplies the named lists enumerations and bit lists resolve against
    pub fn with_lists(mut self, lists: NamedLists) -> Self {
        self.lists = lists;
        self
    }

    pub fn lists(&self) -> &NamedLists {
        &self.lists
    }

    pub fn lists_mut(&mut self) -> &mut NamedLists {
        &mut self.lists
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn store(&self) -> &ByteStore {
        &self.store
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// SHA-256 of the current bytes
    pub fn digest(&self) -> [u8; 32] {
        self.store.digest()
    }

    pub fn text_context(&self) -> TextContext<'_> {
        TextContext::new(&self.lists, &self.registry)
    }

    // Reads

    pub fn read_value(&self, address: usize, width: usize) -> Result<u32, ModelError> {
        Ok(self.store.read_value(address, width)?)
    }

    pub fn read_pointer(&self, address: usize) -> Result<Pointer, ModelError> {
        Ok(Pointer::decode(self.store.read_value(address, POINTER_SIZE)?))
    }

    /// The run covering `address`, or else the next run after it
    pub fn get_run(&self, address: usize) -> Option<&Run> {
        self.registry.find_run(address)
    }

    /// The run starting at `address`
    pub fn run_at(&self, address: usize) -> Option<&Run> {
        self.registry.run_at(address)
    }

    pub fn get_named_run(&self, name: &str) -> Option<&Run> {
        self.registry
            .resolve(name)
            .and_then(|address| self.registry.run_at(address))
    }

    pub fn anchor_at(&self, address: usize) -> Option<&str> {
        self.registry.anchor(address)
    }

    /// Address of an anchor; unknown names resolve to [`Pointer::Null`]
    pub fn resolve_anchor(&self, name: &str) -> Pointer {
        self.registry
            .resolve(name)
            .map_or(Pointer::Null, Pointer::To)
    }

    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.registry.runs()
    }

    // Run table bookkeeping, always recorded in the delta

    pub(crate) fn put_run(&mut self, delta: &mut ModelDelta, run: Run) -> Result<(), ModelError> {
        let start = run.start;
        let old = self.registry.replace_run(run.clone())?;
        delta.record_run(start, old, Some(run));
        Ok(())
    }

    pub(crate) fn take_run(&mut self, delta: &mut ModelDelta, start: usize) -> Result<Run, ModelError> {
        let run = self.registry.remove_run(start)?;
        delta.record_run(start, Some(run.clone()), None);
        Ok(run)
    }

    pub(crate) fn update_run(
        &mut self,
        delta: &mut ModelDelta,
        start: usize,
        change: impl FnOnce(&mut Run),
    ) -> Result<(), ModelError> {
        let mut run = self
            .registry
            .run_at(start)
            .cloned()
            .ok_or(ModelError::NotFound { address: start })?;
        change(&mut run);
        self.put_run(delta, run)
    }

    pub(crate) fn bind_anchor(
        &mut self,
        delta: &mut ModelDelta,
        address: usize,
        name: &str,
    ) -> Result<(), ModelError> {
        let old = self.registry.set_anchor(address, name)?;
        delta.record_anchor(address, old, Some(name.to_string()));
        Ok(())
    }

    pub(crate) fn unbind_anchor(&mut self, delta: &mut ModelDelta, address: usize) -> Option<String> {
        let old = self.registry.remove_anchor_at(address)?;
        delta.record_anchor(address, Some(old.clone()), None);
        Some(old)
    }

    pub(crate) fn check_range(&self, address: usize, length: usize) -> Result<(), ModelError> {
        let inside = address < self.store.len()
            && address
                .checked_add(length)
                .is_some_and(|end| end <= self.store.len());
        if !inside {
            return Err(ModelError::out_of_bounds(address, length, self.store.len()));
        }
        Ok(())
    }

    fn check_free(&self, address: usize, length: usize) -> Result<(), ModelError> {
        match self.registry.first_overlap(address, length.max(1), Some(address)) {
            Some(existing) => Err(ModelError::Overlap {
                start: address,
                length,
                existing: existing.start,
            }),
            None => Ok(()),
        }
    }

    fn sources_at(&self, address: usize) -> std::collections::BTreeSet<usize> {
        self.registry
            .run_at(address)
            .map(|run| run.pointer_sources.clone())
            .unwrap_or_default()
    }

    pub(crate) fn text_length(&self, address: usize) -> Option<usize> {
        self.store
            .as_slice()
            .get(address..)?
            .iter()
            .position(|byte| *byte == TEXT_TERMINATOR)
            .map(|position| position + 1)
    }

    // Writes

    /// Writes a little-endian value. Raising a `/count` field grows the
    /// nested stream that depends on it.
    pub fn write_value(
        &mut self,
        delta: &mut ModelDelta,
        address: usize,
        width: usize,
        value: u32,
    ) -> Result<WriteOutcome, ModelError> {
        delta.write_value(&mut self.store, address, width, value)?;
        let Some((table_start, element, segment)) = self.field_at(address) else {
            return Ok(WriteOutcome::new());
        };
        self.sync_dependent_streams(delta, table_start, element, &segment)
    }

    // Table, element and segment name of the field containing `address`
    fn field_at(&self, address: usize) -> Option<(usize, usize, String)> {
        let run = self.registry.run_covering(address)?;
        let table = run.as_table()?;
        let offset = table.format.locate(address - run.start, table.element_count)?;
        let name = table.format.segments()[offset.segment_index].name.clone();
        Some((run.start, offset.element_index, name))
    }

    /// Writes a pointer and keeps the target's pointer sources current
    pub fn write_pointer(
        &mut self,
        delta: &mut ModelDelta,
        address: usize,
        pointer: Pointer,
    ) -> Result<WriteOutcome, ModelError> {
        let bytes = pointer
            .to_le_bytes()
            .ok_or_else(|| ModelError::unencodable(pointer))?;
        let old = self.read_pointer(address)?;
        delta.write_bytes(&mut self.store, address, &bytes)?;
        if let Pointer::To(target) = old {
            if Pointer::To(target) != pointer {
                self.remove_pointer_source(delta, target, address)?;
            }
        }
        self.register_pointer(delta, address)?;
        Ok(WriteOutcome::new())
    }

    /// Writes pointer text (`<anchor>`, `<0001A0>`, `<null>`). Nothing is
    /// written when the text does not resolve.
    pub fn write_pointer_text(
        &mut self,
        delta: &mut ModelDelta,
        address: usize,
        text: &str,
    ) -> Result<WriteOutcome, ModelError> {
        let pointer = parse_pointer(text, &self.registry).map_err(address_error)?;
        self.write_pointer(delta, address, pointer)
    }

    /// Binds `name` to `address`, giving it a one-byte data run if unformatted
    pub fn declare_anchor(
        &mut self,
        delta: &mut ModelDelta,
        address: usize,
        name: &str,
    ) -> Result<WriteOutcome, ModelError> {
        self.check_range(address, 1)?;
        if let Some(run) = self.registry.run_covering(address) {
            if run.start != address {
                return Err(ModelError::Overlap {
                    start: address,
                    length: 1,
                    existing: run.start,
                });
            }
        }
        self.bind_anchor(delta, address, name)?;
        if self.registry.run_at(address).is_none() {
            self.put_run(delta, Run::data(address, 1))?;
        }
        tracing::debug!(address, name, "Declared anchor");
        Ok(WriteOutcome::new())
    }

    /// Applies `^name[format]count` at `address`
    pub fn apply_anchor_declaration(
        &mut self,
        delta: &mut ModelDelta,
        address: usize,
        text: &str,
    ) -> Result<WriteOutcome, ModelError> {
        let (name, format) = parse_anchor_declaration(text, &self.lists)?;
        if !is_anchor_name(&name) {
            return Err(ModelError::InvalidName { name });
        }
        if let Some(bound) = self.registry.resolve(&name).filter(|bound| *bound != address) {
            return Err(ModelError::NameInUse {
                name,
                address: bound,
            });
        }
        let outcome = self.declare_table(delta, address, format)?;
        self.declare_anchor(delta, address, &name)?;
        Ok(outcome)
    }

    /// Formats `address` as a table, then discovers what its pointers reach
    pub fn declare_table(
        &mut self,
        delta: &mut ModelDelta,
        address: usize,
        format: TableFormat,
    ) -> Result<WriteOutcome, ModelError> {
        let count = match format.count() {
            CountSource::Literal(count) => *count,
            CountSource::Terminator(_) => format
                .scan_terminated_count(self.store.as_slice().get(address..).unwrap_or_default())
                .ok_or(ModelError::TerminatorNotFound { address })?,
            CountSource::ParentField(field) => {
                return Err(FormatError::UnknownCountField {
                    field: field.clone(),
                }
                .into())
            }
        };
        self.declare_table_run(delta, address, TableRun::new(format, count))
    }

    pub(crate) fn declare_table_run(
        &mut self,
        delta: &mut ModelDelta,
        address: usize,
        table: TableRun,
    ) -> Result<WriteOutcome, ModelError> {
        let length = table.length();
        self.check_range(address, length.max(1))?;
        self.check_free(address, length)?;
        let count = table.element_count;
        if self.registry.run_at(address).is_some() {
            self.unregister_pointers(delta, address)?;
        }
        let mut run = Run::table(address, table);
        run.pointer_sources = self.sources_at(address);
        self.put_run(delta, run)?;
        tracing::debug!(address, length, count, "Declared table");
        self.register_table_pointers(delta, address, 0..count)?;
        Ok(WriteOutcome::new())
    }

    /// Formats `address` as `0xFF`-terminated text
    pub fn declare_text(
        &mut self,
        delta: &mut ModelDelta,
        address: usize,
    ) -> Result<WriteOutcome, ModelError> {
        self.check_range(address, 1)?;
        let length = self
            .text_length(address)
            .ok_or(ModelError::TerminatorNotFound { address })?;
        self.check_free(address, length)?;
        let mut run = Run::new(address, length, RunFormat::Text);
        run.pointer_sources = self.sources_at(address);
        self.put_run(delta, run)?;
        Ok(WriteOutcome::new())
    }

    /// Formats `address` as a standalone pointer
    pub fn declare_pointer(
        &mut self,
        delta: &mut ModelDelta,
        address: usize,
    ) -> Result<WriteOutcome, ModelError> {
        self.check_range(address, POINTER_SIZE)?;
        self.check_free(address, POINTER_SIZE)?;
        let mut run = Run::new(address, POINTER_SIZE, RunFormat::Pointer);
        run.pointer_sources = self.sources_at(address);
        self.put_run(delta, run)?;
        self.register_pointer(delta, address)?;
        Ok(WriteOutcome::new())
    }

    /// Removes an anchor and the run it declared.
    ///
    /// A run other pointers still reach is kept as a one-byte data run.
    pub fn remove_anchor(
        &mut self,
        delta: &mut ModelDelta,
        name: &str,
    ) -> Result<WriteOutcome, ModelError> {
        let address = self.registry.resolve(name).ok_or_else(|| ModelError::UnknownAnchor {
            name: name.to_string(),
        })?;
        self.unbind_anchor(delta, address);
        if let Some(run) = self.registry.run_at(address).cloned() {
            self.unregister_pointers(delta, address)?;
            let sources = self.sources_at(address);
            self.take_run(delta, address)?;
            if !sources.is_empty() {
                let mut placeholder = Run::data(address, 1);
                placeholder.pointer_sources = sources;
                self.put_run(delta, placeholder)?;
            }
            self.drop_orphaned_streams(delta, run.range())?;
            tracing::debug!(address, name, kind = run.kind_name(), "Removed anchor");
        }
        Ok(WriteOutcome::new())
    }

    pub fn rename_anchor(
        &mut self,
        delta: &mut ModelDelta,
        old_name: &str,
        new_name: &str,
    ) -> Result<WriteOutcome, ModelError> {
        let address = self
            .registry
            .resolve(old_name)
            .ok_or_else(|| ModelError::UnknownAnchor {
                name: old_name.to_string(),
            })?;
        self.bind_anchor(delta, address, new_name)?;
        Ok(WriteOutcome::new())
    }

    /// Grows the byte store, filling new space with the filler byte
    pub fn expand_data(
        &mut self,
        delta: &mut ModelDelta,
        new_length: usize,
    ) -> Result<WriteOutcome, ModelError> {
        delta.expand_data(&mut self.store, new_length, self.settings.filler_byte)?;
        Ok(WriteOutcome::new())
    }

    // Pointer bookkeeping

    /// Records the pointer at `source` on its target, discovering nested
    /// streams and creating a data run for unformatted targets
    pub(crate) fn register_pointer(
        &mut self,
        delta: &mut ModelDelta,
        source: usize,
    ) -> Result<(), ModelError> {
        let Pointer::To(target) = self.read_pointer(source)? else {
            return Ok(());
        };
        if target >= self.store.len() {
            tracing::debug!(source, target, "Pointer target is past the end of the data");
            return Ok(());
        }
        if let Some((table_start, element, segment)) = self.stream_segment_at(source) {
            self.discover_stream(delta, table_start, element, segment)?;
        }
        self.add_pointer_source(delta, source, target)
    }

    fn add_pointer_source(
        &mut self,
        delta: &mut ModelDelta,
        source: usize,
        target: usize,
    ) -> Result<(), ModelError> {
        if let Some(run) = self.registry.run_at(target) {
            if !run.pointer_sources.contains(&source) {
                self.update_run(delta, target, |run| {
                    run.pointer_sources.insert(source);
                })?;
            }
            return Ok(());
        }
        if self.registry.run_covering(target).is_some() {
            tracing::debug!(source, target, "Pointer targets the middle of a run");
            return Ok(());
        }
        let mut run = Run::data(target, 1);
        run.pointer_sources.insert(source);
        self.put_run(delta, run)
    }

    pub(crate) fn remove_pointer_source(
        &mut self,
        delta: &mut ModelDelta,
        target: usize,
        source: usize,
    ) -> Result<(), ModelError> {
        let Some(run) = self.registry.run_at(target) else {
            return Ok(());
        };
        if !run.pointer_sources.contains(&source) {
            return Ok(());
        }
        let orphan = run.pointer_sources.len() == 1
            && matches!(run.format, RunFormat::Data)
            && self.registry.anchor(target).is_none();
        if orphan {
            self.take_run(delta, target)?;
        } else {
            self.update_run(delta, target, |run| {
                run.pointer_sources.remove(&source);
            })?;
        }
        Ok(())
    }

    /// Drops nested streams counted by a field in `range` once nothing
    /// points at them, along with the streams they count in turn. A stream
    /// still reachable some other way keeps its current element count.
    pub(crate) fn drop_orphaned_streams(
        &mut self,
        delta: &mut ModelDelta,
        range: ByteRange,
    ) -> Result<(), ModelError> {
        let dependents: Vec<(usize, bool)> = self
            .registry
            .runs()
            .filter(|run| {
                run.as_table()
                    .and_then(|table| table.parent_count)
                    .is_some_and(|field| range.contains(field.address))
            })
            .map(|run| {
                let orphan =
                    run.pointer_sources.is_empty() && self.registry.anchor(run.start).is_none();
                (run.start, orphan)
            })
            .collect();
        for (start, orphan) in dependents {
            if self.registry.run_at(start).is_none() {
                continue;
            }
            if !orphan {
                self.update_run(delta, start, |run| {
                    if let Some(table) = run.as_table_mut() {
                        table.parent_count = None;
                    }
                })?;
                continue;
            }
            self.unregister_pointers(delta, start)?;
            let run = self.take_run(delta, start)?;
            tracing::debug!(start, length = run.length, "Dropped unreachable nested stream");
            self.drop_orphaned_streams(delta, run.range())?;
        }
        Ok(())
    }

    /// Drops the pointer sources recorded for every pointer inside the run
    pub(crate) fn unregister_pointers(
        &mut self,
        delta: &mut ModelDelta,
        run_start: usize,
    ) -> Result<(), ModelError> {
        let locations = self
            .registry
            .run_at(run_start)
            .map(Run::pointer_locations)
            .unwrap_or_default();
        self.unregister_locations(delta, &locations)
    }

    pub(crate) fn unregister_locations(
        &mut self,
        delta: &mut ModelDelta,
        locations: &[usize],
    ) -> Result<(), ModelError> {
        for &source in locations {
            if let Pointer::To(target) = self.read_pointer(source)? {
                self.remove_pointer_source(delta, target, source)?;
            }
        }
        Ok(())
    }

    pub(crate) fn register_table_pointers(
        &mut self,
        delta: &mut ModelDelta,
        table_start: usize,
        elements: Range<usize>,
    ) -> Result<(), ModelError> {
        let locations = self
            .registry
            .run_at(table_start)
            .and_then(Run::as_table)
            .map(|table| table.pointer_locations_in(table_start, elements))
            .unwrap_or_default();
        for (source, _) in locations {
            self.register_pointer(delta, source)?;
        }
        Ok(())
    }

    /// Re-registers every pointer stored inside a run
    pub(crate) fn register_run_pointers(
        &mut self,
        delta: &mut ModelDelta,
        run_start: usize,
    ) -> Result<(), ModelError> {
        let locations = self
            .registry
            .run_at(run_start)
            .map(Run::pointer_locations)
            .unwrap_or_default();
        for source in locations {
            self.register_pointer(delta, source)?;
        }
        Ok(())
    }

    fn stream_segment_at(&self, source: usize) -> Option<(usize, usize, usize)> {
        let run = self.registry.run_covering(source)?;
        let table = run.as_table()?;
        let offset = table.format.locate(source - run.start, table.element_count)?;
        let at_field_start = offset.segment_start == source - run.start;
        (at_field_start && table.is_stream_segment(offset.segment_index))
            .then_some((run.start, offset.element_index, offset.segment_index))
    }

    /// Creates the run a nested stream pointer reaches, if the target is
    /// not formatted yet and the stream fits there
    fn discover_stream(
        &mut self,
        delta: &mut ModelDelta,
        table_start: usize,
        element: usize,
        segment: usize,
    ) -> Result<(), ModelError> {
        let Some(table) = self.registry.run_at(table_start).and_then(Run::as_table) else {
            return Ok(());
        };
        let SegmentKind::Stream(stream) = &table.format.segments()[segment].kind else {
            return Ok(());
        };
        let stream = stream.clone();
        let Some(source) = table.field_address(table_start, element, segment) else {
            return Ok(());
        };
        let parent_count = match &stream {
            StreamFormat::Table(nested) => match nested.count() {
                CountSource::ParentField(field) => {
                    let index = table.format.segment_index(field);
                    index.and_then(|index| {
                        let address = table.field_address(table_start, element, index)?;
                        let width = table.format.segments()[index].width;
                        Some(CountField { address, width })
                    })
                }
                _ => None,
            },
            StreamFormat::Text => None,
        };
        let Pointer::To(target) = self.read_pointer(source)? else {
            return Ok(());
        };
        let formatted = self
            .registry
            .run_at(target)
            .is_some_and(|run| !matches!(run.format, RunFormat::Data));
        let inside_other = self
            .registry
            .run_covering(target)
            .is_some_and(|run| run.start != target);
        if formatted || inside_other {
            return Ok(());
        }

        match stream {
            StreamFormat::Text => {
                let Some(length) = self.text_length(target) else {
                    tracing::debug!(source, target, "Text stream has no terminator");
                    return Ok(());
                };
                if self.check_free(target, length).is_err() {
                    tracing::debug!(source, target, "Text stream would overlap another run");
                    return Ok(());
                }
                let mut run = Run::new(target, length, RunFormat::Text);
                run.pointer_sources = self.sources_at(target);
                self.put_run(delta, run)
            }
            StreamFormat::Table(nested) => {
                let count = match nested.count() {
                    CountSource::Literal(count) => Some(*count),
                    CountSource::Terminator(_) => nested
                        .scan_terminated_count(self.store.as_slice().get(target..).unwrap_or_default()),
                    CountSource::ParentField(_) => parent_count.and_then(|field| {
                        self.store
                            .read_value(field.address, field.width)
                            .ok()
                            .map(|value| value as usize)
                    }),
                };
                let Some(count) = count else {
                    tracing::debug!(source, target, "Nested stream length is unknown");
                    return Ok(());
                };
                let mut nested_run = TableRun::new(*nested, count);
                nested_run.parent_count = parent_count;
                let length = nested_run.length();
                let fits = self.check_range(target, length.max(1)).is_ok()
                    && self.check_free(target, length).is_ok();
                if !fits {
                    tracing::debug!(source, target, length, "Nested stream does not fit");
                    return Ok(());
                }
                let mut run = Run::table(target, nested_run);
                run.pointer_sources = self.sources_at(target);
                self.put_run(delta, run)?;
                self.register_table_pointers(delta, target, 0..count)
            }
        }
    }
}

/// Maps an unresolved pointer into the model's own error
pub(crate) fn address_error(error: FormatError) -> ModelError {
    match error {
        FormatError::InvalidAddress { text } => ModelError::InvalidAddress { text },
        other => other.into(),
    }
}

impl DeltaTarget<Run> for DataModel {
    fn byte_store_mut(&mut self) -> &mut ByteStore {
        &mut self.store
    }

    fn restore_run(&mut self, start: usize, run: Option<Run>) {
        self.registry.restore_run(start, run);
    }

    fn restore_anchor(&mut self, start: usize, name: Option<String>) {
        self.registry.restore_anchor(start, name);
    }
}
