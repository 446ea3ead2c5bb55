//! Field access, resizing and text round trips for table runs

use crate::error::ModelError;
use crate::model::{address_error, DataModel, ModelDelta};
use crate::outcome::WriteOutcome;
use crate::run::{Run, RunFormat, TableRun};
use core_types::{ByteRange, Pointer};
use run_format::{
    format_pointer, parse_elements, parse_field, parse_text, render_elements, render_field,
    render_text, ArrayOffset, EnumOptions, FieldValue, FormatError, Segment, SegmentKind,
    TupleValue,
};

impl DataModel {
    pub(crate) fn table_at(&self, start: usize) -> Result<&TableRun, ModelError> {
        let run = self
            .registry
            .run_at(start)
            .ok_or(ModelError::NotFound { address: start })?;
        run.as_table().ok_or(ModelError::WrongRunKind {
            address: start,
            expected: "table",
        })
    }

    fn field_location(
        &self,
        start: usize,
        element: usize,
        field: &str,
    ) -> Result<(usize, Segment), ModelError> {
        let table = self.table_at(start)?;
        if element >= table.element_count {
            return Err(ModelError::ElementOutOfRange {
                address: start,
                index: element,
                count: table.element_count,
            });
        }
        let unknown = || ModelError::UnknownField {
            address: start,
            field: field.to_string(),
        };
        let index = table.format.segment_index(field).ok_or_else(unknown)?;
        let address = table
            .field_address(start, element, index)
            .ok_or_else(unknown)?;
        Ok((address, table.format.segments()[index].clone()))
    }

    /// Maps any address inside a table to its element, segment and bit
    pub fn array_offset(&self, address: usize) -> Option<(usize, ArrayOffset)> {
        let run = self.registry.run_covering(address)?;
        let table = run.as_table()?;
        let offset = table.format.locate(address - run.start, table.element_count)?;
        Some((run.start, offset))
    }

    pub fn field_value(
        &self,
        start: usize,
        element: usize,
        field: &str,
    ) -> Result<FieldValue, ModelError> {
        let (address, segment) = self.field_location(start, element, field)?;
        Ok(segment.decode(self.store.slice(address, segment.width)?))
    }

    /// Looks up a field through the table's anchor name
    pub fn element_value(
        &self,
        anchor: &str,
        element: usize,
        field: &str,
    ) -> Result<FieldValue, ModelError> {
        let start = self
            .registry
            .resolve(anchor)
            .ok_or_else(|| ModelError::UnknownAnchor {
                name: anchor.to_string(),
            })?;
        self.field_value(start, element, field)
    }

    pub fn tuple_value(
        &self,
        start: usize,
        element: usize,
        field: &str,
        item: &str,
    ) -> Result<TupleValue, ModelError> {
        let (address, segment) = self.field_location(start, element, field)?;
        let unknown = || ModelError::UnknownField {
            address: start,
            field: format!("{}.{}", field, item),
        };
        let (_, tuple_item) = segment.tuple_item(item).ok_or_else(unknown)?;
        let word = self.store.read_value(address, segment.width)?;
        Ok(tuple_item.read(word))
    }

    /// Options shown for an enumeration field, with a synthetic entry for
    /// out-of-range values
    pub fn enum_options(
        &self,
        start: usize,
        element: usize,
        field: &str,
    ) -> Result<EnumOptions, ModelError> {
        let (address, segment) = self.field_location(start, element, field)?;
        let SegmentKind::Enum(source) = &segment.kind else {
            return Err(ModelError::WrongRunKind {
                address,
                expected: "enumeration field",
            });
        };
        let value = self.store.read_value(address, segment.width)?;
        Ok(EnumOptions::new(source.options(&self.lists), value))
    }

    /// Renders one field the way it appears in serialized elements
    pub fn field_text(&self, start: usize, element: usize, field: &str) -> Result<String, ModelError> {
        let (address, segment) = self.field_location(start, element, field)?;
        let bytes = self.store.slice(address, segment.width)?;
        Ok(render_field(&segment, bytes, &self.text_context()))
    }

    pub fn set_field_value(
        &mut self,
        delta: &mut ModelDelta,
        start: usize,
        element: usize,
        field: &str,
        value: &FieldValue,
    ) -> Result<WriteOutcome, ModelError> {
        let (address, segment) = self.field_location(start, element, field)?;
        if let (true, FieldValue::Pointer(pointer)) = (segment.is_pointer(), value) {
            return self.write_pointer(delta, address, *pointer);
        }
        let mut bytes = self.store.slice(address, segment.width)?.to_vec();
        segment.encode(value, &mut bytes)?;
        delta.write_bytes(&mut self.store, address, &bytes)?;
        self.sync_dependent_streams(delta, start, element, &segment.name)
    }

    /// Parses field text (as it appears in serialized elements) and writes it
    pub fn set_field_text(
        &mut self,
        delta: &mut ModelDelta,
        start: usize,
        element: usize,
        field: &str,
        text: &str,
    ) -> Result<WriteOutcome, ModelError> {
        let (address, segment) = self.field_location(start, element, field)?;
        let mut bytes = self.store.slice(address, segment.width)?.to_vec();
        parse_field(&segment, text, &self.text_context(), &mut bytes).map_err(address_error)?;
        let value = segment.decode(&bytes);
        self.set_field_value(delta, start, element, field, &value)
    }

    pub fn set_tuple_value(
        &mut self,
        delta: &mut ModelDelta,
        start: usize,
        element: usize,
        field: &str,
        item: &str,
        value: u32,
    ) -> Result<WriteOutcome, ModelError> {
        let (address, segment) = self.field_location(start, element, field)?;
        let (index, _) = segment.tuple_item(item).ok_or_else(|| ModelError::UnknownField {
            address: start,
            field: format!("{}.{}", field, item),
        })?;
        let FieldValue::Tuple(mut values) = segment.decode(self.store.slice(address, segment.width)?)
        else {
            return Err(ModelError::WrongRunKind {
                address,
                expected: "tuple field",
            });
        };
        values[index] = TupleValue::Number(value);
        self.set_field_value(delta, start, element, field, &FieldValue::Tuple(values))
    }

    /// Selects option `index` of an enumeration field. Picking the
    /// synthetic option keeps the literal out-of-range value.
    pub fn set_enum_option(
        &mut self,
        delta: &mut ModelDelta,
        start: usize,
        element: usize,
        field: &str,
        index: usize,
    ) -> Result<WriteOutcome, ModelError> {
        let options = self.enum_options(start, element, field)?;
        if index >= options.options().len() {
            return Err(FormatError::InvalidValue {
                field: field.to_string(),
                text: index.to_string(),
            }
            .into());
        }
        let value = options.value_for_index(index);
        self.set_field_value(delta, start, element, field, &FieldValue::Enum(value))
    }

    /// Grows the nested streams whose `/count` is `field` of this element.
    ///
    /// A count that went down never shrinks the stream.
    pub(crate) fn sync_dependent_streams(
        &mut self,
        delta: &mut ModelDelta,
        table_start: usize,
        element: usize,
        field: &str,
    ) -> Result<WriteOutcome, ModelError> {
        let mut outcome = WriteOutcome::new();
        let Some(table) = self.registry.run_at(table_start).and_then(Run::as_table) else {
            return Ok(outcome);
        };
        let dependents: Vec<usize> = table
            .format
            .count_fields()
            .into_iter()
            .filter(|(_, name)| name == field)
            .map(|(index, _)| index)
            .collect();
        if dependents.is_empty() || element >= table.element_count {
            return Ok(outcome);
        }
        let (address, segment) = self.field_location(table_start, element, field)?;
        let count = self.store.read_value(address, segment.width)? as usize;
        let mut targets = Vec::new();
        for index in dependents {
            let table = self.table_at(table_start)?;
            if let Some(source) = table.field_address(table_start, element, index) {
                if let Pointer::To(target) = self.read_pointer(source)? {
                    targets.push(target);
                }
            }
        }
        for target in targets {
            let Some(stream) = self.registry.run_at(target).and_then(Run::as_table) else {
                continue;
            };
            let current = stream.element_count;
            if count > current {
                outcome.merge(self.resize_stream(delta, target, count, false)?);
            } else if count < current {
                tracing::warn!(
                    stream = target,
                    count,
                    current,
                    "Count field decreased; stream keeps its elements"
                );
            }
        }
        Ok(outcome)
    }

    /// Adds `count` elements to the end of a table
    pub fn append_elements(
        &mut self,
        delta: &mut ModelDelta,
        start: usize,
        count: usize,
    ) -> Result<WriteOutcome, ModelError> {
        let current = self.table_at(start)?.element_count;
        let total = current
            .checked_add(count)
            .ok_or_else(|| ModelError::out_of_bounds(start, usize::MAX, self.store.len()))?;
        self.resize_table(delta, start, total)
    }

    /// Changes a table's element count, relocating it when it no longer fits.
    ///
    /// New elements copy the last element. A stream counted by its parent
    /// has the parent's count field updated too.
    pub fn resize_table(
        &mut self,
        delta: &mut ModelDelta,
        start: usize,
        count: usize,
    ) -> Result<WriteOutcome, ModelError> {
        self.resize_stream(delta, start, count, true)
    }

    fn resize_stream(
        &mut self,
        delta: &mut ModelDelta,
        start: usize,
        count: usize,
        update_parent: bool,
    ) -> Result<WriteOutcome, ModelError> {
        let table = self.table_at(start)?.clone();
        let current = table.element_count;
        if count == current {
            return Ok(WriteOutcome::new());
        }
        let element_length = table.format.element_length();
        if count
            .checked_mul(element_length)
            .map_or(true, |length| length > Pointer::max_address())
        {
            let length = count.saturating_mul(element_length);
            return Err(ModelError::out_of_bounds(start, length, self.store.len()));
        }
        let existing = self.store.slice(start, current * element_length)?.to_vec();
        let kept = count.min(current) * element_length;
        let mut content = existing[..kept].to_vec();
        if count > current {
            let template = match current {
                0 => vec![0; element_length],
                _ => existing[(current - 1) * element_length..].to_vec(),
            };
            for _ in current..count {
                content.extend_from_slice(&template);
            }
        }
        if let Some(terminator) = table.format.terminator() {
            content.extend_from_slice(terminator);
        }
        if update_parent {
            self.write_parent_count(delta, &table, count)?;
        }
        if count < current {
            let removed: Vec<usize> = table
                .pointer_locations_in(start, count..current)
                .into_iter()
                .map(|(address, _)| address)
                .collect();
            self.unregister_locations(delta, &removed)?;
        }

        let resized = TableRun {
            element_count: count,
            ..table
        };
        let (outcome, new_start) = self.write_run_content(delta, start, &content, RunFormat::Table(resized))?;
        if count > current {
            self.register_table_pointers(delta, new_start, current..count)?;
        } else {
            let removed = ByteRange::new(new_start + kept, new_start + current * element_length);
            self.drop_orphaned_streams(delta, removed)?;
        }
        tracing::debug!(start, new_start, current, count, "Resized table");
        Ok(outcome)
    }

    fn write_parent_count(
        &mut self,
        delta: &mut ModelDelta,
        table: &TableRun,
        count: usize,
    ) -> Result<(), ModelError> {
        let Some(field) = table.parent_count else {
            return Ok(());
        };
        let max = if field.width >= 4 {
            u64::from(u32::MAX)
        } else {
            (1u64 << (8 * field.width)) - 1
        };
        if count as u64 > max {
            return Err(FormatError::ValueOutOfRange {
                field: "count".to_string(),
                value: count as u64,
                bits: (field.width * 8) as u32,
            }
            .into());
        }
        delta.write_value(&mut self.store, field.address, field.width, count as u32)?;
        Ok(())
    }

    /// Renders a run's content as text
    pub fn serialize_run(&self, start: usize) -> Result<String, ModelError> {
        let run = self
            .registry
            .run_at(start)
            .ok_or(ModelError::NotFound { address: start })?;
        let text = match &run.format {
            RunFormat::Table(table) => {
                let length = table.element_count * table.format.element_length();
                let bytes = self.store.slice(start, length)?;
                render_elements(&table.format, bytes, table.element_count, &self.text_context())
            }
            RunFormat::Text => render_text(self.store.slice(start, run.length)?),
            RunFormat::Pointer => format_pointer(self.read_pointer(start)?, &self.registry),
            RunFormat::Data => hex::encode_upper(self.store.slice(start, run.length)?),
        };
        Ok(text)
    }

    /// Replaces a run's content with parsed text. The run moves when the
    /// new content does not fit; the outcome reports where it went.
    pub fn deserialize_run(
        &mut self,
        delta: &mut ModelDelta,
        start: usize,
        text: &str,
    ) -> Result<WriteOutcome, ModelError> {
        let run = self
            .registry
            .run_at(start)
            .cloned()
            .ok_or(ModelError::NotFound { address: start })?;
        match run.format {
            RunFormat::Table(table) => {
                let element_length = table.format.element_length();
                let existing = self
                    .store
                    .slice(start, table.element_count * element_length)?
                    .to_vec();
                let (mut content, count) =
                    parse_elements(&table.format, text, &self.text_context(), &existing)
                        .map_err(address_error)?;
                if let Some(terminator) = table.format.terminator() {
                    content.extend_from_slice(terminator);
                }
                self.write_parent_count(delta, &table, count)?;
                self.unregister_pointers(delta, start)?;
                let current = table.element_count;
                let updated = TableRun {
                    element_count: count,
                    ..table
                };
                let (outcome, new_start) =
                    self.write_run_content(delta, start, &content, RunFormat::Table(updated))?;
                self.register_table_pointers(delta, new_start, 0..count)?;
                if count < current {
                    let removed = ByteRange::new(
                        new_start + count * element_length,
                        new_start + current * element_length,
                    );
                    self.drop_orphaned_streams(delta, removed)?;
                }
                Ok(outcome)
            }
            RunFormat::Text => {
                let content = parse_text(text)?;
                let (outcome, _) = self.write_run_content(delta, start, &content, RunFormat::Text)?;
                Ok(outcome)
            }
            RunFormat::Pointer => self.write_pointer_text(delta, start, text),
            RunFormat::Data => Err(ModelError::WrongRunKind {
                address: start,
                expected: "formatted run",
            }),
        }
    }
}
