//! The textual format grammar
//!
//! A table format is a bracketed list of segment descriptors followed by a
//! count specifier:
//!
//! ```text
//! [name. hp: flags:|t|a.|b:|c:options kind.types ptr<> text<""> moves<[id: pp.]/count>]!FF
//! ```
//!
//! Widths are written as sigils: `.` is one unit, `:` is two. Segments use
//! bytes, tuple items use bits.

use crate::error::FormatError;
use crate::lists::{ListResolver, ListSource};
use crate::segment::{Segment, SegmentKind, StreamFormat, TupleItem, TupleItemKind};
use crate::table::{CountSource, TableFormat};
use core_types::POINTER_SIZE;
use std::fmt;

/// Parses a top-level table format
pub fn parse_table_format(
    text: &str,
    lists: &dyn ListResolver,
) -> Result<TableFormat, FormatError> {
    parse_table_format_in(text, lists, None)
}

/// Parses a table format nested inside an element whose segments are named
/// `parent`; `/field` counts must name one of them.
pub fn parse_table_format_in(
    text: &str,
    lists: &dyn ListResolver,
    parent: Option<&[String]>,
) -> Result<TableFormat, FormatError> {
    let text = text.trim();
    if !text.starts_with('[') {
        return Err(FormatError::parse(text, "a table format starts with '['"));
    }
    let close = find_closing(text).ok_or_else(|| FormatError::parse(text, "unbalanced brackets"))?;
    let inner = &text[1..close];
    let count_text = text[close + 1..].trim();

    let tokens = split_top_level(inner);
    let names: Vec<String> = tokens.iter().map(|t| leading_name(t).to_string()).collect();
    let segments = tokens
        .iter()
        .map(|token| parse_segment(token, lists, &names))
        .collect::<Result<Vec<_>, _>>()?;
    let count = parse_count(count_text, parent)?;
    TableFormat::new(segments, count)
}

/// Parses `^name[...]count`, the form used to declare a named table
pub fn parse_anchor_declaration(
    text: &str,
    lists: &dyn ListResolver,
) -> Result<(String, TableFormat), FormatError> {
    let text = text.trim();
    let rest = text
        .strip_prefix('^')
        .ok_or_else(|| FormatError::parse(text, "an anchor declaration starts with '^'"))?;
    let open = rest
        .find('[')
        .ok_or_else(|| FormatError::parse(text, "an anchor declaration needs a format"))?;
    let name = rest[..open].trim();
    if name.is_empty() {
        return Err(FormatError::parse(text, "anchor name is empty"));
    }
    let format = parse_table_format(&rest[open..], lists)?;
    Ok((name.to_string(), format))
}

/// Anchor names are letters, digits and `_`, with `.` allowed between
/// parts (`data.pokemon.stats`).
///
/// Names that read as pointer text, such as `BEEF`, `0x1A0` or `null`, are
/// rejected so that `<name>` always means the anchor.
pub fn is_anchor_name(name: &str) -> bool {
    let well_formed = !name.is_empty()
        && name.chars().all(|c| is_name_char(c) || c == '.')
        && !name.starts_with('.')
        && !name.ends_with('.');
    well_formed && !reads_as_pointer(name)
}

fn reads_as_pointer(name: &str) -> bool {
    let digits = name
        .strip_prefix("0x")
        .or_else(|| name.strip_prefix("0X"))
        .unwrap_or(name);
    name.eq_ignore_ascii_case("null")
        || (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()))
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn leading_name(token: &str) -> &str {
    let end = token
        .char_indices()
        .find(|(_, c)| !is_name_char(*c))
        .map_or(token.len(), |(i, _)| i);
    &token[..end]
}

// Index of the ']' that closes the '[' at position 0.
fn find_closing(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quoted = false;
    for (index, c) in text.char_indices() {
        match c {
            '"' | '`' => quoted = !quoted,
            '[' | '<' if !quoted => depth += 1,
            '>' if !quoted => depth = depth.checked_sub(1)?,
            ']' if !quoted => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

// Splits on whitespace outside of nested brackets and quotes.
fn split_top_level(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quoted = false;
    for c in text.chars() {
        match c {
            '"' | '`' => quoted = !quoted,
            '[' | '<' if !quoted => depth += 1,
            ']' | '>' if !quoted => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 && !quoted => {
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

// Counts leading '.' (1) and ':' (2) sigils; returns (units, chars consumed).
fn sigil_units(text: &str) -> (usize, usize) {
    let mut units = 0;
    let mut consumed = 0;
    for c in text.chars() {
        match c {
            '.' => units += 1,
            ':' => units += 2,
            _ => break,
        }
        consumed += 1;
    }
    (units, consumed)
}

fn sigils(units: usize) -> String {
    let mut text = ":".repeat(units / 2);
    if units % 2 == 1 {
        text.push('.');
    }
    text
}

fn parse_segment(
    token: &str,
    lists: &dyn ListResolver,
    siblings: &[String],
) -> Result<Segment, FormatError> {
    let name = leading_name(token);
    let rest = &token[name.len()..];

    if let Some(target) = rest.strip_prefix('<') {
        let target = target
            .strip_suffix('>')
            .ok_or_else(|| FormatError::parse(token, "pointer format is missing '>'"))?
            .trim();
        let kind = if target.is_empty() {
            SegmentKind::Pointer
        } else if target == "\"\"" {
            SegmentKind::Stream(StreamFormat::Text)
        } else if target.starts_with('[') {
            let nested = parse_table_format_in(target, lists, Some(siblings))?;
            SegmentKind::Stream(StreamFormat::Table(Box::new(nested)))
        } else {
            return Err(FormatError::parse(token, "unsupported pointer target format"));
        };
        return Ok(Segment::new(name, POINTER_SIZE, kind));
    }

    let (width, consumed) = sigil_units(rest);
    let modifier = &rest[consumed..];

    if width == 0 {
        // Bit lists may size themselves from their label list
        if let Some(list) = modifier.strip_prefix("|b[]") {
            let labels = lists.list(list).ok_or_else(|| FormatError::UnresolvedList {
                segment: name.to_string(),
                list: list.to_string(),
            })?;
            if labels.is_empty() {
                return Err(FormatError::parse(token, "bit list has no labels"));
            }
            let width = labels.len().div_ceil(8);
            return Ok(Segment::new(name, width, SegmentKind::BitList(list.to_string())));
        }
        return Err(FormatError::parse(token, "missing width sigils"));
    }
    if width > 4 {
        return Err(FormatError::parse(token, "width must be 1 to 4 bytes"));
    }

    let kind = if modifier.is_empty() {
        SegmentKind::Integer { hex: false }
    } else if modifier == "|h" {
        SegmentKind::Integer { hex: true }
    } else if let Some(items) = modifier.strip_prefix("|t") {
        SegmentKind::Tuple(parse_tuple_items(name, width, items)?)
    } else if let Some(list) = modifier.strip_prefix("|b[]") {
        if lists.list(list).is_none() {
            return Err(FormatError::UnresolvedList {
                segment: name.to_string(),
                list: list.to_string(),
            });
        }
        SegmentKind::BitList(list.to_string())
    } else if leading_name(modifier) == modifier {
        // Unknown list names stay raw numbers until the list appears
        SegmentKind::Enum(ListSource::from_token(modifier))
    } else {
        return Err(FormatError::parse(token, format!("unknown modifier '{}'", modifier)));
    };
    Ok(Segment::new(name, width, kind))
}

fn parse_tuple_items(
    tuple: &str,
    width: usize,
    text: &str,
) -> Result<Vec<TupleItem>, FormatError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    if !text.starts_with('|') {
        return Err(FormatError::parse(text, "tuple items start with '|'"));
    }
    let capacity = (width * 8) as u32;
    let mut items = Vec::new();
    let mut offset = 0u32;
    for token in text.split('|').skip(1) {
        let name = leading_name(token);
        let rest = &token[name.len()..];
        let (bits, consumed) = sigil_units(rest);
        if bits == 0 {
            return Err(FormatError::parse(token, "tuple item needs a bit width"));
        }
        let source = &rest[consumed..];
        let kind = if !source.is_empty() {
            if leading_name(source) != source {
                return Err(FormatError::parse(token, "invalid enum reference"));
            }
            TupleItemKind::Enum(ListSource::from_token(source))
        } else if bits == 1 {
            TupleItemKind::Bool
        } else {
            TupleItemKind::Number
        };
        items.push(TupleItem {
            name: name.to_string(),
            bit_width: bits as u32,
            bit_offset: offset,
            kind,
        });
        offset += bits as u32;
    }
    if offset > capacity {
        return Err(FormatError::BitOverflow {
            tuple: tuple.to_string(),
            bits: offset,
            capacity,
        });
    }
    Ok(items)
}

fn parse_count(text: &str, parent: Option<&[String]>) -> Result<CountSource, FormatError> {
    if text.is_empty() {
        return Ok(CountSource::Literal(1));
    }
    if let Ok(count) = text.parse::<usize>() {
        return Ok(CountSource::Literal(count));
    }
    if let Some(field) = text.strip_prefix('/') {
        let known = parent.is_some_and(|names| names.iter().any(|name| name == field));
        if field.is_empty() || !known {
            return Err(FormatError::UnknownCountField {
                field: field.to_string(),
            });
        }
        return Ok(CountSource::ParentField(field.to_string()));
    }
    if let Some(hex_text) = text.strip_prefix('!') {
        let bytes = hex::decode(hex_text)
            .map_err(|e| FormatError::parse(text, format!("terminator is not hex: {}", e)))?;
        if bytes.is_empty() {
            return Err(FormatError::parse(text, "terminator has no bytes"));
        }
        return Ok(CountSource::Terminator(bytes));
    }
    Err(FormatError::parse(text, "unrecognised element count"))
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SegmentKind::Integer { hex } => {
                write!(f, "{}{}", self.name, sigils(self.width))?;
                if *hex {
                    write!(f, "|h")?;
                }
                Ok(())
            }
            SegmentKind::Pointer => write!(f, "{}<>", self.name),
            SegmentKind::Stream(StreamFormat::Text) => write!(f, "{}<\"\">", self.name),
            SegmentKind::Stream(StreamFormat::Table(format)) => {
                write!(f, "{}<{}>", self.name, format)
            }
            SegmentKind::Tuple(items) => {
                write!(f, "{}{}|t", self.name, sigils(self.width))?;
                for item in items {
                    write!(f, "|{}{}", item.name, sigils(item.bit_width as usize))?;
                    if let TupleItemKind::Enum(source) = &item.kind {
                        write!(f, "{}", source)?;
                    }
                }
                Ok(())
            }
            SegmentKind::Enum(source) => write!(f, "{}{}{}", self.name, sigils(self.width), source),
            SegmentKind::BitList(list) => {
                write!(f, "{}{}|b[]{}", self.name, sigils(self.width), list)
            }
        }
    }
}

impl fmt::Display for CountSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountSource::Literal(count) => write!(f, "{}", count),
            CountSource::ParentField(field) => write!(f, "/{}", field),
            CountSource::Terminator(bytes) => write!(f, "!{}", hex::encode_upper(bytes)),
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (index, segment) in self.segments().iter().enumerate() {
            if index > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", segment)?;
        }
        write!(f, "]{}", self.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lists::NamedLists;

    fn lists() -> NamedLists {
        let mut lists = NamedLists::new();
        lists.set_list("options", ["None", "Something Else"]);
        lists.set_list("labels", (0..10).map(|i| format!("bit{}", i)));
        lists
    }

    fn parse(text: &str) -> Result<TableFormat, FormatError> {
        parse_table_format(text, &lists())
    }

    #[test]
    fn test_parse_integer_widths() {
        let format = parse("[a. b: c:. d::]4").unwrap();
        let widths: Vec<usize> = format.segments().iter().map(|s| s.width).collect();
        assert_eq!(widths, vec![1, 2, 3, 4]);
        assert_eq!(format.count(), &CountSource::Literal(4));
        assert_eq!(format.element_length(), 10);
    }

    #[test]
    fn test_parse_empty_tuple() {
        let format = parse("[value:|t]1").unwrap();
        assert_eq!(format.segments()[0].kind, SegmentKind::Tuple(Vec::new()));
    }

    #[test]
    fn test_parse_tuple_items() {
        let format = parse("[value:|t|a:|b.|c:options|d:4]1").unwrap();
        let SegmentKind::Tuple(items) = &format.segments()[0].kind else {
            panic!("expected tuple");
        };
        assert_eq!(items.len(), 4);
        assert_eq!((items[0].bit_width, items[0].bit_offset), (2, 0));
        assert_eq!(items[1].kind, TupleItemKind::Bool);
        assert_eq!(items[1].bit_offset, 2);
        assert_eq!(
            items[2].kind,
            TupleItemKind::Enum(ListSource::Named("options".into()))
        );
        assert_eq!(items[3].kind, TupleItemKind::Enum(ListSource::Count(4)));
        assert_eq!(items[3].bit_offset, 5);
    }

    #[test]
    fn test_tuple_bit_overflow_is_rejected() {
        let result = parse("[tuple.|t|a:.|b:.|c:.]1");
        assert_eq!(
            result,
            Err(FormatError::BitOverflow {
                tuple: "tuple".into(),
                bits: 9,
                capacity: 8
            })
        );
    }

    #[test]
    fn test_tuple_item_without_width() {
        assert!(matches!(parse("[t.|t|a]1"), Err(FormatError::Parse { .. })));
    }

    #[test]
    fn test_parse_hex_and_enum() {
        let format = parse("[kind.options next.|h other:unknownlist]!FFFF").unwrap();
        assert_eq!(
            format.segments()[0].kind,
            SegmentKind::Enum(ListSource::Named("options".into()))
        );
        assert_eq!(format.segments()[1].kind, SegmentKind::Integer { hex: true });
        // Unknown lists fall back to raw numbers
        assert_eq!(
            format.segments()[2].kind,
            SegmentKind::Enum(ListSource::Named("unknownlist".into()))
        );
        assert_eq!(format.count(), &CountSource::Terminator(vec![0xFF, 0xFF]));
    }

    #[test]
    fn test_parse_bit_list() {
        let format = parse("[flags|b[]labels other:|b[]labels]1").unwrap();
        assert_eq!(format.segments()[0].width, 2);
        assert_eq!(format.segments()[1].width, 2);
        assert!(matches!(
            parse("[flags|b[]missing]1"),
            Err(FormatError::UnresolvedList { .. })
        ));
    }

    #[test]
    fn test_parse_pointers_and_streams() {
        let format = parse("[count: ptr<> text<\"\"> items<[id: pp.]/count>]2").unwrap();
        let segments = format.segments();
        assert_eq!(segments[1].kind, SegmentKind::Pointer);
        assert_eq!(segments[1].width, 4);
        assert_eq!(segments[2].kind, SegmentKind::Stream(StreamFormat::Text));
        let SegmentKind::Stream(StreamFormat::Table(nested)) = &segments[3].kind else {
            panic!("expected nested table");
        };
        assert_eq!(nested.count(), &CountSource::ParentField("count".into()));
        assert_eq!(nested.element_length(), 3);
        assert_eq!(format.count_fields(), vec![(3, "count".to_string())]);
    }

    #[test]
    fn test_count_reference_must_exist() {
        assert_eq!(
            parse("[count: items<[id:]/missing>]1"),
            Err(FormatError::UnknownCountField {
                field: "missing".into()
            })
        );
        assert!(matches!(
            parse("[a:]/a"),
            Err(FormatError::UnknownCountField { .. })
        ));
    }

    #[test]
    fn test_bad_counts() {
        assert!(parse("[a:]!XYZ").is_err());
        assert!(parse("[a:]!").is_err());
        assert!(parse("[a:]?").is_err());
        assert_eq!(parse("[a:]").unwrap().count(), &CountSource::Literal(1));
    }

    #[test]
    fn test_bad_segments() {
        assert!(parse("[]1").is_err());
        assert!(parse("[a]1").is_err());
        assert!(parse("[a:::]1").is_err());
        assert!(parse("[a:|q]1").is_err());
        assert!(parse("[a<`xse`>]1").is_err());
        assert!(parse("a:]1").is_err());
        assert!(parse("[a:").is_err());
    }

    #[test]
    fn test_anchor_declaration() {
        let (name, format) = parse_anchor_declaration("^table[a: b: c:]4", &lists()).unwrap();
        assert_eq!(name, "table");
        assert_eq!(format.segments().len(), 3);
        assert!(parse_anchor_declaration("table[a:]1", &lists()).is_err());
        assert!(parse_anchor_declaration("^[a:]1", &lists()).is_err());
        assert!(parse_anchor_declaration("^table", &lists()).is_err());

        let (name, _) = parse_anchor_declaration("^data.stats[hp: atk.]2", &lists()).unwrap();
        assert_eq!(name, "data.stats");
        assert!(is_anchor_name(&name));
    }

    #[test]
    fn test_anchor_name_rules() {
        for name in ["items", "data.pokemon.stats", "move_2", "Bag", "0x"] {
            assert!(is_anchor_name(name), "{name}");
        }
        for name in ["", "has space", ".items", "items.", "a<b", "face", "BEEF", "0x1A0", "123", "null", "NULL"] {
            assert!(!is_anchor_name(name), "{name}");
        }
    }

    #[test]
    fn test_display_round_trip() {
        for text in [
            "[a. b: c:. d::]4",
            "[value.|t|a:|b. next.|h]!FFFF",
            "[value.|t|a:options|b:options|c:4]!FF",
            "[count: ptr<> text<\"\"> items<[id: pp.]/count>]2",
            "[flags:|b[]labels kind.options]1",
            "[range:|t|x::|y::]3",
        ] {
            let format = parse(text).unwrap();
            assert_eq!(format.to_string(), text);
            assert_eq!(parse(&format.to_string()).unwrap(), format);
        }
    }
}
