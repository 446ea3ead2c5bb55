//! Structured text form of elements, pointers and text streams
//!
//! One element per line, fields joined by `", "`:
//!
//! ```text
//! (0 false), 00
//! ("Something Else" 2 2), <table>
//! ```

use crate::error::FormatError;
use crate::lists::ListResolver;
use crate::segment::{FieldValue, Segment, SegmentKind, TupleItemKind, TupleValue};
use crate::table::TableFormat;
use core_types::{Pointer, ROM_BASE};

/// Terminator byte of text streams
pub const TEXT_TERMINATOR: u8 = 0xFF;

/// Address/name lookups used when rendering and parsing pointers
pub trait AnchorLookup {
    /// The anchor name bound to `address`
    fn anchor_at(&self, address: usize) -> Option<String>;
    /// The address bound to `name`
    fn resolve_anchor(&self, name: &str) -> Option<usize>;
}

/// Lookup with no anchors at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnchors;

impl AnchorLookup for NoAnchors {
    fn anchor_at(&self, _address: usize) -> Option<String> {
        None
    }

    fn resolve_anchor(&self, _name: &str) -> Option<usize> {
        None
    }
}

/// Everything the text codec needs besides the bytes
#[derive(Clone, Copy)]
pub struct TextContext<'a> {
    pub lists: &'a dyn ListResolver,
    pub anchors: &'a dyn AnchorLookup,
}

impl<'a> TextContext<'a> {
    pub fn new(lists: &'a dyn ListResolver, anchors: &'a dyn AnchorLookup) -> Self {
        Self { lists, anchors }
    }
}

/// Renders a pointer as `<name>`, `<XXXXXX>` or `<null>`
pub fn format_pointer(pointer: Pointer, anchors: &dyn AnchorLookup) -> String {
    match pointer {
        Pointer::Null => "<null>".to_string(),
        Pointer::To(address) => match anchors.anchor_at(address) {
            Some(name) => format!("<{}>", name),
            None => format!("<{:06X}>", address),
        },
    }
}

/// Parses pointer text. Hex is tried before anchor names.
pub fn parse_pointer(text: &str, anchors: &dyn AnchorLookup) -> Result<Pointer, FormatError> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(trimmed)
        .trim();
    if inner.eq_ignore_ascii_case("null") {
        return Ok(Pointer::Null);
    }
    let invalid = || FormatError::InvalidAddress {
        text: trimmed.to_string(),
    };
    let digits = inner
        .strip_prefix("0x")
        .or_else(|| inner.strip_prefix("0X"))
        .unwrap_or(inner);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        let raw = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;
        // Full cartridge addresses are accepted too
        let address = if raw < ROM_BASE {
            raw as usize
        } else {
            Pointer::decode(raw).address().ok_or_else(invalid)?
        };
        if address > Pointer::max_address() {
            return Err(invalid());
        }
        return Ok(Pointer::To(address));
    }
    anchors
        .resolve_anchor(inner)
        .map(Pointer::To)
        .ok_or_else(invalid)
}

// Labels that would split or nest are quoted, with `"` and `\` escaped
fn quote_label(label: String) -> String {
    let delimited = label.is_empty()
        || label
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ',' | '"' | '\\' | '(' | ')' | '<' | '>'));
    if !delimited {
        return label;
    }
    let mut quoted = String::with_capacity(label.len() + 2);
    quoted.push('"');
    for c in label.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn unquote(token: &str) -> String {
    let Some(inner) = token
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return token.to_string();
    };
    let mut label = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => label.extend(chars.next()),
            c => label.push(c),
        }
    }
    label
}

/// Renders one segment's bytes
pub fn render_field(segment: &Segment, bytes: &[u8], ctx: &TextContext<'_>) -> String {
    let value = segment.decode(bytes);
    match (&segment.kind, value) {
        (SegmentKind::Integer { hex: true }, FieldValue::Number(number)) => {
            format!("{:0width$X}", number, width = segment.width * 2)
        }
        (SegmentKind::Enum(source), FieldValue::Enum(number)) => source
            .label(number, ctx.lists)
            .map(quote_label)
            .unwrap_or_else(|| number.to_string()),
        (_, FieldValue::Pointer(pointer)) => format_pointer(pointer, ctx.anchors),
        (SegmentKind::Tuple(items), FieldValue::Tuple(values)) => {
            let parts: Vec<String> = items
                .iter()
                .zip(values)
                .map(|(item, value)| match (&item.kind, value) {
                    (_, TupleValue::Bool(flag)) => flag.to_string(),
                    (TupleItemKind::Enum(source), TupleValue::Enum(number)) => source
                        .label(number, ctx.lists)
                        .map(quote_label)
                        .unwrap_or_else(|| number.to_string()),
                    (_, other) => other.as_u32().to_string(),
                })
                .collect();
            format!("({})", parts.join(" "))
        }
        (SegmentKind::BitList(_), FieldValue::Bits(_)) => {
            hex::encode_upper(&bytes[..segment.width.min(bytes.len())])
        }
        (_, value) => value.as_u32().unwrap_or_default().to_string(),
    }
}

/// Parses one field's text into `out`, which holds the segment's current
/// bytes. `out` is untouched on error.
pub fn parse_field(
    segment: &Segment,
    token: &str,
    ctx: &TextContext<'_>,
    out: &mut [u8],
) -> Result<(), FormatError> {
    let token = token.trim();
    let invalid = || FormatError::invalid_value(&segment.name, token);
    let value = match &segment.kind {
        SegmentKind::Integer { hex } => {
            let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
                Some(digits) => u32::from_str_radix(digits, 16),
                None if *hex => u32::from_str_radix(token, 16),
                None => token.parse::<u32>(),
            };
            FieldValue::Number(parsed.map_err(|_| invalid())?)
        }
        SegmentKind::Enum(source) => {
            FieldValue::Enum(source.parse_token(&unquote(token), ctx.lists).ok_or_else(invalid)?)
        }
        SegmentKind::Pointer | SegmentKind::Stream(_) => {
            FieldValue::Pointer(parse_pointer(token, ctx.anchors)?)
        }
        SegmentKind::Tuple(items) => {
            let inner = token
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(invalid)?;
            let FieldValue::Tuple(mut values) = segment.decode(out) else {
                return Err(invalid());
            };
            for ((item, slot), part) in items.iter().zip(values.iter_mut()).zip(split_tuple(inner)) {
                let part = unquote(&part);
                let bad = || FormatError::invalid_value(&item.name, &part);
                *slot = match &item.kind {
                    TupleItemKind::Bool => match part.to_ascii_lowercase().as_str() {
                        "true" | "1" => TupleValue::Bool(true),
                        "false" | "0" => TupleValue::Bool(false),
                        _ => return Err(bad()),
                    },
                    TupleItemKind::Number => TupleValue::Number(part.parse().map_err(|_| bad())?),
                    TupleItemKind::Enum(source) => {
                        TupleValue::Enum(source.parse_token(&part, ctx.lists).ok_or_else(bad)?)
                    }
                };
            }
            FieldValue::Tuple(values)
        }
        SegmentKind::BitList(_) => {
            let bytes = hex::decode(token).map_err(|_| invalid())?;
            if bytes.len() > segment.width {
                return Err(invalid());
            }
            let mut bits = vec![false; segment.width * 8];
            for (index, bit) in bits.iter_mut().enumerate() {
                let byte = bytes.get(index / 8).copied().unwrap_or(0);
                *bit = (byte >> (index % 8)) & 1 != 0;
            }
            FieldValue::Bits(bits)
        }
    };
    segment.encode(&value, out)
}

/// Renders `count` elements starting at the beginning of `bytes`
pub fn render_elements(
    format: &TableFormat,
    bytes: &[u8],
    count: usize,
    ctx: &TextContext<'_>,
) -> String {
    let length = format.element_length();
    let mut lines = Vec::with_capacity(count);
    for element in bytes.chunks(length).take(count) {
        let mut fields = Vec::with_capacity(format.segments().len());
        let mut offset = 0;
        for segment in format.segments() {
            let end = (offset + segment.width).min(element.len());
            fields.push(render_field(segment, &element[offset.min(end)..end], ctx));
            offset += segment.width;
        }
        lines.push(fields.join(", "));
    }
    lines.join("\n")
}

/// Parses element text into element bytes, returning the bytes (without a
/// terminator) and the element count. Fields missing from a line keep the
/// bytes of the matching element in `existing`.
pub fn parse_elements(
    format: &TableFormat,
    text: &str,
    ctx: &TextContext<'_>,
    existing: &[u8],
) -> Result<(Vec<u8>, usize), FormatError> {
    let length = format.element_length();
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut out = Vec::with_capacity(lines.len() * length);
    for (index, line) in lines.iter().enumerate() {
        let mut element = vec![0u8; length];
        let start = index * length;
        if start < existing.len() {
            let available = (existing.len() - start).min(length);
            element[..available].copy_from_slice(&existing[start..start + available]);
        }
        let tokens = split_fields(line);
        let mut offset = 0;
        for (segment, token) in format.segments().iter().zip(tokens.iter()) {
            parse_field(segment, token, ctx, &mut element[offset..offset + segment.width])?;
            offset += segment.width;
        }
        out.extend_from_slice(&element);
    }
    Ok((out, lines.len()))
}

/// Splits one element line at top-level commas and whitespace
pub fn split_fields(line: &str) -> Vec<String> {
    split_groups(line, true)
}

/// Splits a tuple's inner text at commas and whitespace, keeping quotes
pub fn split_tuple(text: &str) -> Vec<String> {
    split_groups(text, false)
}

fn split_groups(text: &str, keep_nesting: bool) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if quoted => {
                current.push(c);
                current.extend(chars.next());
                continue;
            }
            '"' => quoted = !quoted,
            '(' | '<' if keep_nesting && !quoted => depth += 1,
            ')' | '>' if keep_nesting && !quoted => depth = depth.saturating_sub(1),
            c if (c == ',' || c.is_whitespace()) && depth == 0 && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Renders a text stream up to its terminator
pub fn render_text(bytes: &[u8]) -> String {
    let mut text = String::new();
    for &byte in bytes.iter().take_while(|&&b| b != TEXT_TERMINATOR) {
        if (0x20..0x7F).contains(&byte) && byte != b'\\' {
            text.push(byte as char);
        } else {
            text.push_str(&format!("\\{:02X}", byte));
        }
    }
    text
}

/// Parses text stream content, appending the terminator
pub fn parse_text(text: &str) -> Result<Vec<u8>, FormatError> {
    let mut bytes = Vec::with_capacity(text.len() + 1);
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let escape: String = chars.by_ref().take(2).collect();
            let byte = Some(&escape)
                .filter(|e| e.len() == 2 && e.chars().all(|c| c.is_ascii_hexdigit()))
                .and_then(|e| u8::from_str_radix(e, 16).ok())
                .ok_or_else(|| FormatError::parse(&format!("\\{}", escape), "invalid escape"))?;
            bytes.push(byte);
        } else if c.is_ascii() && !c.is_ascii_control() {
            bytes.push(c as u8);
        } else {
            return Err(FormatError::parse(&c.to_string(), "character cannot be encoded"));
        }
    }
    bytes.push(TEXT_TERMINATOR);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lists::NamedLists;
    use crate::parser::parse_table_format;
    use std::collections::BTreeMap;

    struct Anchors(BTreeMap<String, usize>);

    impl AnchorLookup for Anchors {
        fn anchor_at(&self, address: usize) -> Option<String> {
            self.0
                .iter()
                .find(|(_, a)| **a == address)
                .map(|(name, _)| name.clone())
        }

        fn resolve_anchor(&self, name: &str) -> Option<usize> {
            self.0.get(name).copied()
        }
    }

    fn lists() -> NamedLists {
        let mut lists = NamedLists::new();
        lists.set_list("options", ["None", "Something Else"]);
        lists
    }

    #[test]
    fn test_serialize_tuple_and_hex() {
        let lists = lists();
        let ctx = TextContext::new(&lists, &NoAnchors);
        let format = parse_table_format("[value.|t|a:|b. next.|h]!FFFF", &lists).unwrap();
        let text = render_elements(&format, &[0, 0, 0b110, 4], 2, &ctx);
        assert_eq!(text, "(0 false), 00\n(2 true), 04");
    }

    #[test]
    fn test_serialize_quotes_labels_with_spaces() {
        let lists = lists();
        let ctx = TextContext::new(&lists, &NoAnchors);
        let format = parse_table_format("[value.|t|a:options|b:|c:]1", &lists).unwrap();
        let text = render_elements(&format, &[0b10_10_01], 1, &ctx);
        assert_eq!(text, "(\"Something Else\" 2 2)");
    }

    #[test]
    fn test_out_of_range_enum_renders_number() {
        let lists = lists();
        let ctx = TextContext::new(&lists, &NoAnchors);
        let format = parse_table_format("[kind.options]1", &lists).unwrap();
        assert_eq!(render_elements(&format, &[2], 1, &ctx), "2");
        let (bytes, count) = parse_elements(&format, "2", &ctx, &[0]).unwrap();
        assert_eq!((bytes, count), (vec![2], 1));
    }

    #[test]
    fn test_labels_with_delimiters_round_trip() {
        let mut lists = NamedLists::new();
        lists.set_list(
            "names",
            ["Mr. Mime", "Farfetch'd, Jr", "say \"hi\"", "a\\b", "Cut", "CUT", "(x)"],
        );
        let ctx = TextContext::new(&lists, &NoAnchors);
        let format = parse_table_format("[name.names pair.|t|a:names|b:names]1", &lists).unwrap();
        for name in 0..7u8 {
            for pair in [0b01_10u8, 0b11_00, 0b00_11] {
                let bytes = [name, pair];
                let text = render_elements(&format, &bytes, 1, &ctx);
                let (parsed, count) = parse_elements(&format, &text, &ctx, &[0, 0]).unwrap();
                assert_eq!((parsed.as_slice(), count), (&bytes[..], 1), "{text}");
            }
        }
        assert_eq!(
            render_elements(&format, &[5, 0b01_00], 1, &ctx),
            r#"CUT, ("Mr. Mime" "Farfetch'd, Jr")"#
        );
        assert_eq!(
            render_elements(&format, &[2, 0b00_11], 1, &ctx),
            r#""say \"hi\"", ("a\\b" "Mr. Mime")"#
        );
    }

    #[test]
    fn test_deserialize_fuzzy_enum_tuple() {
        let lists = lists();
        let ctx = TextContext::new(&lists, &NoAnchors);
        let format =
            parse_table_format("[value.|t|a:options|b:options|c:options|d:]1", &lists).unwrap();
        let (bytes, count) =
            parse_elements(&format, "(\"Some Else\", somethels 0, 3)", &ctx, &[0]).unwrap();
        assert_eq!(count, 1);
        assert_eq!(bytes, vec![0b11_00_01_01]);
    }

    #[test]
    fn test_deserialize_skips_blank_lines() {
        let lists = lists();
        let ctx = TextContext::new(&lists, &NoAnchors);
        let format = parse_table_format("[value.|t|a:|b. next.|h]!FFFF", &lists).unwrap();
        let (bytes, count) = parse_elements(&format, "\n(2 true), 04\n", &ctx, &[]).unwrap();
        assert_eq!(count, 1);
        assert_eq!(bytes, vec![0b110, 4]);
    }

    #[test]
    fn test_missing_fields_keep_existing_bytes() {
        let lists = lists();
        let ctx = TextContext::new(&lists, &NoAnchors);
        let format = parse_table_format("[a. b. c.]2", &lists).unwrap();
        let (bytes, _) = parse_elements(&format, "9\n7, 8", &ctx, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(bytes, vec![9, 2, 3, 7, 8, 6]);
    }

    #[test]
    fn test_bad_value_is_rejected() {
        let lists = lists();
        let ctx = TextContext::new(&lists, &NoAnchors);
        let format = parse_table_format("[a. b.options]1", &lists).unwrap();
        assert!(matches!(
            parse_elements(&format, "300, None", &ctx, &[]),
            Err(FormatError::ValueOutOfRange { .. })
        ));
        assert!(matches!(
            parse_elements(&format, "1, zzz", &ctx, &[]),
            Err(FormatError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_pointer_text() {
        let mut names = BTreeMap::new();
        names.insert("table".to_string(), 0x100);
        let anchors = Anchors(names);
        assert_eq!(format_pointer(Pointer::To(0x100), &anchors), "<table>");
        assert_eq!(format_pointer(Pointer::To(0x1A0), &anchors), "<0001A0>");
        assert_eq!(format_pointer(Pointer::Null, &anchors), "<null>");
        assert_eq!(parse_pointer("<table>", &anchors), Ok(Pointer::To(0x100)));
        assert_eq!(parse_pointer("<0001A0>", &anchors), Ok(Pointer::To(0x1A0)));
        assert_eq!(parse_pointer("080001A0", &anchors), Ok(Pointer::To(0x1A0)));
        assert_eq!(parse_pointer("<null>", &anchors), Ok(Pointer::Null));
        assert_eq!(parse_pointer("<1FFFFFF>", &anchors), Ok(Pointer::To(0x01FF_FFFF)));
        assert_eq!(
            parse_pointer("<nowhere>", &anchors),
            Err(FormatError::InvalidAddress {
                text: "<nowhere>".into()
            })
        );
    }

    #[test]
    fn test_pointer_text_past_the_window_is_rejected() {
        for text in ["<2000000>", "<3000000>", "0A000000", "<FFFFFFFF>", "<123456789>", "<+1A0>"] {
            assert_eq!(
                parse_pointer(text, &NoAnchors),
                Err(FormatError::InvalidAddress { text: text.into() }),
                "{text}"
            );
        }
    }

    #[test]
    fn test_pointer_field_rejects_unknown_anchor() {
        let lists = lists();
        let ctx = TextContext::new(&lists, &NoAnchors);
        let format = parse_table_format("[ptr<>]1", &lists).unwrap();
        let mut bytes = [1, 2, 3, 4];
        let result = parse_field(&format.segments()[0], "<nowhere>", &ctx, &mut bytes);
        assert!(matches!(result, Err(FormatError::InvalidAddress { .. })));
        assert_eq!(bytes, [1, 2, 3, 4]);
    }

    #[test]
    fn test_bit_list_text() {
        let mut lists = lists();
        lists.set_list("flags", (0..12).map(|i| format!("f{}", i)));
        let ctx = TextContext::new(&lists, &NoAnchors);
        let format = parse_table_format("[flags|b[]flags]1", &lists).unwrap();
        assert_eq!(render_elements(&format, &[0x0A, 0x01], 1, &ctx), "0A01");
        let (bytes, _) = parse_elements(&format, "0310", &ctx, &[]).unwrap();
        assert_eq!(bytes, vec![0x03, 0x10]);
    }

    #[test]
    fn test_text_stream() {
        let bytes = parse_text("Hi\\0A\\5C").unwrap();
        assert_eq!(bytes, vec![b'H', b'i', 0x0A, b'\\', 0xFF]);
        assert_eq!(render_text(&bytes), "Hi\\0A\\5C");
        assert!(parse_text("bad\\Z").is_err());
        assert!(parse_text("\\+F").is_err());
        assert!(parse_text("\\-1").is_err());
        assert!(parse_text("end\\4").is_err());
        assert!(parse_text("caf\u{e9}").is_err());
    }

    #[test]
    fn test_split_fields_keeps_groups() {
        assert_eq!(
            split_fields("(\"a b\" 1), <table>, \"Something Else\" 4"),
            vec!["(\"a b\" 1)", "<table>", "\"Something Else\"", "4"]
        );
        assert_eq!(split_tuple("\"Some Else\", x 0"), vec!["\"Some Else\"", "x", "0"]);
    }
}
