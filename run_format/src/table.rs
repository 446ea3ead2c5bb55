//! Repeating element layout

use crate::error::FormatError;
use crate::segment::{Segment, SegmentKind, StreamFormat};
use std::collections::HashMap;

/// How a table decides its element count
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountSource {
    /// A fixed number of elements
    Literal(usize),
    /// The current value of a field in the enclosing element
    ParentField(String),
    /// Elements continue until these bytes start an element
    Terminator(Vec<u8>),
}

/// Where an offset inside a table lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayOffset {
    pub element_index: usize,
    pub segment_index: usize,
    /// Offset of the segment's first byte from the table start
    pub segment_start: usize,
    /// Bit position of the addressed byte within the segment
    pub bit_offset: u32,
}

/// A parsed table format: an ordered list of segments and a count source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFormat {
    segments: Vec<Segment>,
    count: CountSource,
    offsets: Vec<usize>,
    element_length: usize,
    names: HashMap<String, usize>,
}

impl TableFormat {
    pub fn new(segments: Vec<Segment>, count: CountSource) -> Result<Self, FormatError> {
        if segments.is_empty() {
            return Err(FormatError::parse("[]", "a table needs at least one segment"));
        }
        let mut offsets = Vec::with_capacity(segments.len());
        let mut names = HashMap::new();
        let mut element_length = 0;
        for (index, segment) in segments.iter().enumerate() {
            if segment.width == 0 {
                return Err(FormatError::parse(&segment.name, "segment has no width"));
            }
            offsets.push(element_length);
            element_length += segment.width;
            if !segment.name.is_empty() {
                names.entry(segment.name.clone()).or_insert(index);
            }
        }
        if let CountSource::Terminator(bytes) = &count {
            if bytes.is_empty() {
                return Err(FormatError::parse("!", "terminator has no bytes"));
            }
        }
        Ok(Self {
            segments,
            count,
            offsets,
            element_length,
            names,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn count(&self) -> &CountSource {
        &self.count
    }

    /// Sum of all segment widths
    pub fn element_length(&self) -> usize {
        self.element_length
    }

    /// Streams size themselves from their content rather than a literal count
    pub fn is_stream(&self) -> bool {
        !matches!(self.count, CountSource::Literal(_))
    }

    pub fn terminator(&self) -> Option<&[u8]> {
        match &self.count {
            CountSource::Terminator(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn segment_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segment_index(name).map(|index| &self.segments[index])
    }

    /// Byte offset of a segment within its element
    pub fn segment_offset(&self, index: usize) -> Option<usize> {
        self.offsets.get(index).copied()
    }

    /// Total byte length for `count` elements, terminator included
    pub fn length_for(&self, count: usize) -> usize {
        self.element_length * count + self.terminator().map_or(0, <[u8]>::len)
    }

    /// Maps an offset from the table start to element, segment and bit.
    ///
    /// Offsets in the terminator or past the last element return `None`.
    pub fn locate(&self, offset: usize, element_count: usize) -> Option<ArrayOffset> {
        let element_index = offset / self.element_length;
        if element_index >= element_count {
            return None;
        }
        let within = offset % self.element_length;
        // offsets[0] == 0, so a segment always qualifies
        let segment_index = self.offsets.partition_point(|start| *start <= within) - 1;
        let segment_offset = self.offsets[segment_index];
        Some(ArrayOffset {
            element_index,
            segment_index,
            segment_start: element_index * self.element_length + segment_offset,
            bit_offset: ((within - segment_offset) * 8) as u32,
        })
    }

    /// Counts elements before the terminator in `data`.
    ///
    /// The terminator is only recognised at element boundaries. Returns
    /// `None` when the data ends first or the table has no terminator.
    pub fn scan_terminated_count(&self, data: &[u8]) -> Option<usize> {
        let terminator = self.terminator()?;
        let mut count = 0;
        let mut position = 0;
        while position + terminator.len() <= data.len() {
            if data[position..position + terminator.len()] == *terminator {
                return Some(count);
            }
            count += 1;
            position += self.element_length;
        }
        None
    }

    /// Nested formats reached through stream segments
    pub fn nested_streams(&self) -> impl Iterator<Item = (usize, &Segment)> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, segment)| matches!(segment.kind, SegmentKind::Stream(_)))
    }

    /// Names of segments whose value is a parent count for a nested stream
    pub fn count_fields(&self) -> Vec<(usize, String)> {
        let mut fields = Vec::new();
        for (index, segment) in self.nested_streams() {
            if let SegmentKind::Stream(StreamFormat::Table(format)) = &segment.kind {
                if let CountSource::ParentField(name) = format.count() {
                    fields.push((index, name.clone()));
                }
            }
        }
        fields
    }
}
