//! Runs: anchored, non-overlapping byte ranges with a format

use core_types::ByteRange;
use run_format::{SegmentKind, TableFormat};
use std::collections::BTreeSet;
use std::ops::Range;

/// What a run's bytes mean
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFormat {
    /// Unformatted bytes, typically a pointer target nobody has described yet
    Data,
    /// One standalone 4-byte pointer
    Pointer,
    /// Repeating elements
    Table(TableRun),
    /// `0xFF`-terminated text
    Text,
}

/// Location of the count field a nested stream takes its length from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountField {
    pub address: usize,
    pub width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRun {
    pub format: TableFormat,
    pub element_count: usize,
    /// Set for streams whose count lives in the enclosing element
    pub parent_count: Option<CountField>,
}

impl TableRun {
    pub fn new(format: TableFormat, element_count: usize) -> Self {
        Self {
            format,
            element_count,
            parent_count: None,
        }
    }

    /// Bytes used by the elements plus any terminator
    pub fn length(&self) -> usize {
        self.format.length_for(self.element_count)
    }

    /// Address of one field of one element
    pub fn field_address(&self, run_start: usize, element: usize, segment: usize) -> Option<usize> {
        let offset = self.format.segment_offset(segment)?;
        Some(run_start + element * self.format.element_length() + offset)
    }

    /// Addresses of every pointer-valued field, with the segment index
    pub fn pointer_locations(&self, run_start: usize) -> Vec<(usize, usize)> {
        self.pointer_locations_in(run_start, 0..self.element_count)
    }

    /// Pointer-valued fields of the elements in `elements`
    pub fn pointer_locations_in(
        &self,
        run_start: usize,
        elements: Range<usize>,
    ) -> Vec<(usize, usize)> {
        let pointer_segments: Vec<usize> = self
            .format
            .segments()
            .iter()
            .enumerate()
            .filter(|(_, segment)| segment.is_pointer())
            .map(|(index, _)| index)
            .collect();
        let mut locations = Vec::new();
        for element in elements.start..elements.end.min(self.element_count) {
            for &segment in &pointer_segments {
                if let Some(address) = self.field_address(run_start, element, segment) {
                    locations.push((address, segment));
                }
            }
        }
        locations
    }

    /// Whether segment `index` holds a nested stream pointer
    pub fn is_stream_segment(&self, index: usize) -> bool {
        self.format
            .segments()
            .get(index)
            .is_some_and(|segment| matches!(segment.kind, SegmentKind::Stream(_)))
    }
}

/// An anchored, non-overlapping byte range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub start: usize,
    pub length: usize,
    pub format: RunFormat,
    /// Addresses of pointers known to point at `start`
    pub pointer_sources: BTreeSet<usize>,
}

impl Run {
    pub fn new(start: usize, length: usize, format: RunFormat) -> Self {
        Self {
            start,
            length,
            format,
            pointer_sources: BTreeSet::new(),
        }
    }

    pub fn data(start: usize, length: usize) -> Self {
        Self::new(start, length, RunFormat::Data)
    }

    pub fn table(start: usize, table: TableRun) -> Self {
        let length = table.length();
        Self::new(start, length, RunFormat::Table(table))
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn range(&self) -> ByteRange {
        ByteRange::with_length(self.start, self.length)
    }

    pub fn contains(&self, address: usize) -> bool {
        self.range().contains(address)
    }

    pub fn as_table(&self) -> Option<&TableRun> {
        match &self.format {
            RunFormat::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut TableRun> {
        match &mut self.format {
            RunFormat::Table(table) => Some(table),
            _ => None,
        }
    }

    /// Short name of the format, used in errors and logs
    pub fn kind_name(&self) -> &'static str {
        match self.format {
            RunFormat::Data => "data",
            RunFormat::Pointer => "pointer",
            RunFormat::Table(_) => "table",
            RunFormat::Text => "text",
        }
    }

    /// Addresses of every pointer stored inside this run
    pub fn pointer_locations(&self) -> Vec<usize> {
        match &self.format {
            RunFormat::Pointer => vec![self.start],
            RunFormat::Table(table) => table
                .pointer_locations(self.start)
                .into_iter()
                .map(|(address, _)| address)
                .collect(),
            RunFormat::Data | RunFormat::Text => Vec::new(),
        }
    }
}
