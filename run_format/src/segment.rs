//! Field kinds and their byte codecs

use crate::error::FormatError;
use crate::lists::ListSource;
use crate::table::TableFormat;
use core_types::{Pointer, POINTER_SIZE};

/// One field's codec within a repeating element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    /// Width in bytes
    pub width: usize,
    pub kind: SegmentKind,
}

/// The closed set of field kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// Little-endian unsigned integer, shown in decimal or hex
    Integer { hex: bool },
    /// 4-byte pointer
    Pointer,
    /// Bit-packed sub-fields
    Tuple(Vec<TupleItem>),
    /// Integer selecting an option from a list
    Enum(ListSource),
    /// One labeled flag per bit
    BitList(String),
    /// Pointer whose target is itself a stream run
    Stream(StreamFormat),
}

/// Format of the run a stream segment points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFormat {
    /// `0xFF`-terminated text
    Text,
    /// Nested table
    Table(Box<TableFormat>),
}

/// One named sub-field of a tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleItem {
    pub name: String,
    pub bit_width: u32,
    /// Position of the lowest bit within the tuple word
    pub bit_offset: u32,
    pub kind: TupleItemKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TupleItemKind {
    Bool,
    Number,
    Enum(ListSource),
}

/// A decoded field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Number(u32),
    Enum(u32),
    Pointer(Pointer),
    Tuple(Vec<TupleValue>),
    Bits(Vec<bool>),
}

/// A decoded tuple sub-field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleValue {
    Bool(bool),
    Number(u32),
    Enum(u32),
}

impl TupleValue {
    pub fn as_u32(self) -> u32 {
        match self {
            TupleValue::Bool(flag) => u32::from(flag),
            TupleValue::Number(value) | TupleValue::Enum(value) => value,
        }
    }
}

impl FieldValue {
    /// The value as a plain integer, where that makes sense
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            FieldValue::Number(value) | FieldValue::Enum(value) => Some(*value),
            FieldValue::Pointer(pointer) => pointer.encode(),
            FieldValue::Tuple(_) | FieldValue::Bits(_) => None,
        }
    }
}

impl TupleItem {
    fn mask(&self) -> u32 {
        if self.bit_width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.bit_width) - 1
        }
    }

    /// Extracts this item from the tuple word
    pub fn read(&self, word: u32) -> TupleValue {
        let raw = (word >> self.bit_offset) & self.mask();
        match &self.kind {
            TupleItemKind::Bool => TupleValue::Bool(raw != 0),
            TupleItemKind::Number => TupleValue::Number(raw),
            TupleItemKind::Enum(_) => TupleValue::Enum(raw),
        }
    }

    /// Stores `value` into the tuple word, rejecting values wider than the item
    pub fn write(&self, word: u32, value: u32) -> Result<u32, FormatError> {
        if u64::from(value) > u64::from(self.mask()) {
            return Err(FormatError::ValueOutOfRange {
                field: self.name.clone(),
                value: u64::from(value),
                bits: self.bit_width,
            });
        }
        let cleared = word & !(self.mask() << self.bit_offset);
        Ok(cleared | (value << self.bit_offset))
    }

    pub fn contains_bit(&self, bit: u32) -> bool {
        self.bit_offset <= bit && bit < self.bit_offset + self.bit_width
    }
}

/// Reads up to `width` bytes as a little-endian integer
pub(crate) fn read_le(bytes: &[u8], width: usize) -> u32 {
    bytes
        .iter()
        .take(width.min(4))
        .rev()
        .fold(0u32, |value, byte| (value << 8) | u32::from(*byte))
}

pub(crate) fn write_le(out: &mut [u8], width: usize, value: u32) {
    for (i, byte) in out.iter_mut().take(width).enumerate() {
        *byte = (value >> (8 * i)) as u8;
    }
}

impl Segment {
    pub fn new(name: impl Into<String>, width: usize, kind: SegmentKind) -> Self {
        Self {
            name: name.into(),
            width,
            kind,
        }
    }

    /// Whether the stored bytes are a pointer
    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, SegmentKind::Pointer | SegmentKind::Stream(_))
    }

    /// Largest integer this segment's width can hold
    pub fn max_value(&self) -> u64 {
        if self.width >= 4 {
            u64::from(u32::MAX)
        } else {
            (1u64 << (8 * self.width)) - 1
        }
    }

    /// Looks up a tuple item by name
    pub fn tuple_item(&self, name: &str) -> Option<(usize, &TupleItem)> {
        match &self.kind {
            SegmentKind::Tuple(items) => items.iter().enumerate().find(|(_, item)| item.name == name),
            _ => None,
        }
    }

    /// Decodes this segment's bytes
    pub fn decode(&self, bytes: &[u8]) -> FieldValue {
        match &self.kind {
            SegmentKind::Integer { .. } => FieldValue::Number(read_le(bytes, self.width)),
            SegmentKind::Enum(_) => FieldValue::Enum(read_le(bytes, self.width)),
            SegmentKind::Pointer | SegmentKind::Stream(_) => {
                FieldValue::Pointer(Pointer::decode(read_le(bytes, POINTER_SIZE)))
            }
            SegmentKind::Tuple(items) => {
                let word = read_le(bytes, self.width);
                FieldValue::Tuple(items.iter().map(|item| item.read(word)).collect())
            }
            SegmentKind::BitList(_) => FieldValue::Bits(
                bytes
                    .iter()
                    .take(self.width)
                    .flat_map(|byte| (0..8).map(move |bit| (byte >> bit) & 1 != 0))
                    .collect(),
            ),
        }
    }

    /// Encodes `value` into `out`, which holds this segment's current bytes.
    ///
    /// Nothing is written when the value is rejected.
    pub fn encode(&self, value: &FieldValue, out: &mut [u8]) -> Result<(), FormatError> {
        if out.len() < self.width {
            return Err(FormatError::invalid_value(
                &self.name,
                &format!("{} bytes available, {} needed", out.len(), self.width),
            ));
        }
        match (&self.kind, value) {
            (
                SegmentKind::Integer { .. } | SegmentKind::Enum(_),
                FieldValue::Number(number) | FieldValue::Enum(number),
            ) => {
                if u64::from(*number) > self.max_value() {
                    return Err(FormatError::ValueOutOfRange {
                        field: self.name.clone(),
                        value: u64::from(*number),
                        bits: (self.width * 8) as u32,
                    });
                }
                write_le(out, self.width, *number);
                Ok(())
            }
            (SegmentKind::Pointer | SegmentKind::Stream(_), FieldValue::Pointer(pointer)) => {
                let raw = pointer.encode().ok_or_else(|| FormatError::InvalidAddress {
                    text: pointer.to_string(),
                })?;
                write_le(out, POINTER_SIZE, raw);
                Ok(())
            }
            (SegmentKind::Tuple(items), FieldValue::Tuple(values)) => {
                if values.len() != items.len() {
                    return Err(FormatError::invalid_value(
                        &self.name,
                        &format!("{} values for {} tuple items", values.len(), items.len()),
                    ));
                }
                let mut word = read_le(out, self.width);
                for (item, value) in items.iter().zip(values) {
                    word = item.write(word, value.as_u32())?;
                }
                write_le(out, self.width, word);
                Ok(())
            }
            (SegmentKind::BitList(_), FieldValue::Bits(bits)) => {
                if bits.len() > self.width * 8 {
                    return Err(FormatError::ValueOutOfRange {
                        field: self.name.clone(),
                        value: bits.len() as u64,
                        bits: (self.width * 8) as u32,
                    });
                }
                for (index, bit) in bits.iter().enumerate() {
                    let mask = 1u8 << (index % 8);
                    if *bit {
                        out[index / 8] |= mask;
                    } else {
                        out[index / 8] &= !mask;
                    }
                }
                Ok(())
            }
            (_, value) => Err(FormatError::invalid_value(&self.name, &format!("{:?}", value))),
        }
    }
}
