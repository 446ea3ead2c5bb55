//! # Run Format
//!
//! The schema language that turns a flat byte range into typed, named fields.
//!
//! ## Philosophy
//!
//! - **Formats are values**: a parsed [`TableFormat`] is a pure descriptor.
//!   It never holds bytes; every value is decoded from a slice handed in by
//!   the caller.
//! - **Closed set of field kinds**: [`SegmentKind`] is a sum type matched
//!   exhaustively by every codec, so a new kind is a compile error everywhere
//!   it is not yet handled.
//! - **Lists are injected**: enumeration and bit labels come from a
//!   [`ListResolver`] passed in at the call site, never from a global.
//!
//! ## Design
//!
//! - `segment`: field kinds and their byte codecs
//! - `table`: repeating element layout and offset mapping
//! - `parser`: the textual format grammar
//! - `lists`: named option lists and enum option selection
//! - `text`: structured text form of elements, pointers and text streams

pub mod error;
pub mod lists;
pub mod parser;
pub mod segment;
pub mod table;
pub mod text;

pub use error::FormatError;
pub use lists::{match_option, EnumOptions, ListResolver, ListSource, NamedLists};
pub use parser::{
    is_anchor_name, parse_anchor_declaration, parse_table_format, parse_table_format_in,
};
pub use segment::{
    FieldValue, Segment, SegmentKind, StreamFormat, TupleItem, TupleItemKind, TupleValue,
};
pub use table::{ArrayOffset, CountSource, TableFormat};
pub use text::{
    format_pointer, parse_elements, parse_field, parse_pointer, parse_text, render_elements,
    render_field, render_text, AnchorLookup, NoAnchors, TextContext, TEXT_TERMINATOR,
};
