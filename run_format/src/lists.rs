//! Named option lists for enumerations and bit labels

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Read-only lookup of named, ordered option lists.
///
/// Implemented by whatever owns the game's name tables; segments only ever
/// borrow it for the duration of one call.
pub trait ListResolver {
    /// Returns the options of the named list
    fn list(&self, name: &str) -> Option<&[String]>;

    /// Finds the index of `label` in the named list (the inverse mapping)
    fn index_of(&self, name: &str, label: &str) -> Option<usize> {
        self.list(name).and_then(|options| match_option(options, label))
    }
}

/// In-memory list resolver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedLists {
    lists: BTreeMap<String, Vec<String>>,
}

impl NamedLists {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a list
    pub fn set_list<I, S>(&mut self, name: impl Into<String>, options: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lists
            .insert(name.into(), options.into_iter().map(Into::into).collect());
    }

    pub fn remove_list(&mut self, name: &str) -> bool {
        self.lists.remove(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.lists.keys().map(String::as_str)
    }
}

impl ListResolver for NamedLists {
    fn list(&self, name: &str) -> Option<&[String]> {
        self.lists.get(name).map(Vec::as_slice)
    }
}

/// Where an enumeration takes its options from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListSource {
    /// A list supplied by the resolver
    Named(String),
    /// The numerals `0..n`
    Count(usize),
}

impl ListSource {
    /// Parses the text after a field's width sigils
    pub fn from_token(token: &str) -> Self {
        match token.parse::<usize>() {
            Ok(count) => ListSource::Count(count),
            Err(_) => ListSource::Named(token.to_string()),
        }
    }

    /// All options, or an empty list when the named list is unknown
    pub fn options(&self, lists: &dyn ListResolver) -> Vec<String> {
        match self {
            ListSource::Count(count) => (0..*count).map(|i| i.to_string()).collect(),
            ListSource::Named(name) => lists.list(name).map(<[String]>::to_vec).unwrap_or_default(),
        }
    }

    pub fn is_resolved(&self, lists: &dyn ListResolver) -> bool {
        match self {
            ListSource::Count(_) => true,
            ListSource::Named(name) => lists.list(name).is_some(),
        }
    }

    /// The label for `value`, if it is in range
    pub fn label(&self, value: u32, lists: &dyn ListResolver) -> Option<String> {
        let index = value as usize;
        match self {
            ListSource::Count(count) => (index < *count).then(|| index.to_string()),
            ListSource::Named(name) => lists.list(name)?.get(index).cloned(),
        }
    }

    /// Maps text back to a stored value.
    ///
    /// Tries an exact label, then a bare number (which may be out of range),
    /// then a fuzzy label match.
    pub fn parse_token(&self, token: &str, lists: &dyn ListResolver) -> Option<u32> {
        let options = self.options(lists);
        if let Some(index) = exact_match(&options, token) {
            return Some(index as u32);
        }
        if let Ok(value) = token.parse::<u32>() {
            return Some(value);
        }
        fuzzy_match(&options, token).map(|index| index as u32)
    }
}

impl fmt::Display for ListSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListSource::Named(name) => write!(f, "{}", name),
            ListSource::Count(count) => write!(f, "{}", count),
        }
    }
}

/// Finds the option best matching `text`: exact first, then fuzzy
pub fn match_option(options: &[String], text: &str) -> Option<usize> {
    exact_match(options, text).or_else(|| fuzzy_match(options, text))
}

// Case matters when it tells options apart; otherwise a case-insensitive
// match is accepted if only one option has it.
fn exact_match(options: &[String], text: &str) -> Option<usize> {
    if let Some(index) = options.iter().position(|option| option == text) {
        return Some(index);
    }
    let mut folded = options
        .iter()
        .enumerate()
        .filter(|(_, option)| option.eq_ignore_ascii_case(text))
        .map(|(index, _)| index);
    match (folded.next(), folded.next()) {
        (Some(index), None) => Some(index),
        _ => None,
    }
}

// Every non-whitespace character of `text` must appear in order in the
// option; among matches the shortest option wins.
fn fuzzy_match(options: &[String], text: &str) -> Option<usize> {
    let needle: Vec<char> = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    if needle.is_empty() {
        return None;
    }
    options
        .iter()
        .enumerate()
        .filter(|(_, option)| is_subsequence(&needle, option))
        .min_by_key(|(index, option)| (option.len(), *index))
        .map(|(index, _)| index)
}

fn is_subsequence(needle: &[char], haystack: &str) -> bool {
    let mut remaining = needle.iter().peekable();
    for c in haystack.chars().flat_map(char::to_lowercase) {
        if remaining.peek() == Some(&&c) {
            remaining.next();
        }
    }
    remaining.peek().is_none()
}

/// The option list shown for one enumeration field.
///
/// A stored value past the end of the list gets a synthetic last option
/// holding its numeral, so reading and writing back never loses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumOptions {
    options: Vec<String>,
    synthetic: bool,
    selected: usize,
}

impl EnumOptions {
    pub fn new(mut options: Vec<String>, value: u32) -> Self {
        let index = value as usize;
        if index >= options.len() {
            options.push(value.to_string());
            let selected = options.len() - 1;
            Self {
                options,
                synthetic: true,
                selected,
            }
        } else {
            Self {
                options,
                synthetic: false,
                selected: index,
            }
        }
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn has_synthetic_option(&self) -> bool {
        self.synthetic
    }

    /// The value to store when option `index` is selected
    pub fn value_for_index(&self, index: usize) -> u32 {
        if self.synthetic && index == self.options.len() - 1 {
            if let Ok(value) = self.options[index].parse::<u32>() {
                return value;
            }
        }
        index as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<String> {
        vec!["None".to_string(), "Something Else".to_string()]
    }

    #[test]
    fn test_named_lists() {
        let mut lists = NamedLists::new();
        lists.set_list("options", ["None", "Something Else"]);
        assert_eq!(lists.list("options").map(<[String]>::len), Some(2));
        assert_eq!(lists.index_of("options", "something else"), Some(1));
        assert!(lists.list("missing").is_none());
        assert!(lists.remove_list("options"));
        assert_eq!(lists.names().count(), 0);
    }

    #[test]
    fn test_named_lists_json() {
        let mut lists = NamedLists::new();
        lists.set_list("types", ["Normal", "Fire"]);
        let json = serde_json::to_string(&lists).unwrap();
        let restored: NamedLists = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, lists);
    }

    #[test]
    fn test_exact_match_ignores_case() {
        assert_eq!(match_option(&options(), "none"), Some(0));
    }

    #[test]
    fn test_exact_match_respects_case_when_ambiguous() {
        let options = vec!["Cut".to_string(), "CUT".to_string(), "Fly".to_string()];
        assert_eq!(match_option(&options, "Cut"), Some(0));
        assert_eq!(match_option(&options, "CUT"), Some(1));
        assert_eq!(match_option(&options, "fly"), Some(2));

        let mut lists = NamedLists::new();
        lists.set_list("moves", options);
        let source = ListSource::Named("moves".to_string());
        assert_eq!(source.parse_token("CUT", &lists), Some(1));
        assert_eq!(source.parse_token("Cut", &lists), Some(0));
    }

    #[test]
    fn test_fuzzy_match() {
        assert_eq!(match_option(&options(), "Some Else"), Some(1));
        assert_eq!(match_option(&options(), "somethels"), Some(1));
        assert_eq!(match_option(&options(), "xyz"), None);
    }

    #[test]
    fn test_fuzzy_match_prefers_shortest() {
        let options = vec!["Thunderbolt".to_string(), "Thunder".to_string()];
        assert_eq!(match_option(&options, "thd"), Some(1));
    }

    #[test]
    fn test_count_source() {
        let lists = NamedLists::new();
        let source = ListSource::from_token("4");
        assert_eq!(source, ListSource::Count(4));
        assert_eq!(source.options(&lists), vec!["0", "1", "2", "3"]);
        assert_eq!(source.label(3, &lists), Some("3".to_string()));
        assert_eq!(source.label(4, &lists), None);
    }

    #[test]
    fn test_parse_token_falls_back_to_number() {
        let mut lists = NamedLists::new();
        lists.set_list("options", ["None", "Something Else"]);
        let source = ListSource::Named("options".to_string());
        assert_eq!(source.parse_token("None", &lists), Some(0));
        assert_eq!(source.parse_token("2", &lists), Some(2));
        assert_eq!(source.parse_token("somethels", &lists), Some(1));
        assert_eq!(source.parse_token("zzz", &lists), None);
    }

    #[test]
    fn test_unresolved_named_source() {
        let lists = NamedLists::new();
        let source = ListSource::Named("moves".to_string());
        assert!(!source.is_resolved(&lists));
        assert!(source.options(&lists).is_empty());
        assert_eq!(source.parse_token("7", &lists), Some(7));
    }

    #[test]
    fn test_enum_options_in_range() {
        let enum_options = EnumOptions::new(options(), 1);
        assert_eq!(enum_options.selected_index(), 1);
        assert!(!enum_options.has_synthetic_option());
        assert_eq!(enum_options.value_for_index(0), 0);
    }

    #[test]
    fn test_enum_options_synthetic() {
        let enum_options = EnumOptions::new(options(), 7);
        assert_eq!(enum_options.options(), &["None", "Something Else", "7"]);
        assert_eq!(enum_options.selected_index(), 2);
        assert!(enum_options.has_synthetic_option());
        assert_eq!(enum_options.value_for_index(2), 7);
        assert_eq!(enum_options.value_for_index(1), 1);
    }
}
