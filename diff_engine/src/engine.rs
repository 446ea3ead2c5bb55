//! Segment scanning, merging and capping

use core_types::ByteRange;
use model_settings::DiffSettings;
use rom_store::ByteStore;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("Cannot diff buffers of different lengths ({left:#X} and {right:#X} bytes)")]
    LengthMismatch { left: usize, right: usize },
}

/// A differing range, paired across both buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffSegment {
    pub left: ByteRange,
    pub right: ByteRange,
}

impl DiffSegment {
    fn aligned(start: usize, end: usize) -> Self {
        let range = ByteRange::new(start, end);
        Self {
            left: range,
            right: range,
        }
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

/// Segments in increasing address order, capped at `max_segments`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult {
    segments: Vec<DiffSegment>,
    truncated: bool,
    length: usize,
}

impl DiffResult {
    pub fn segments(&self) -> &[DiffSegment] {
        &self.segments
    }

    /// True when more segments existed than were reported
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Length of each compared buffer
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_identical(&self) -> bool {
        self.segments.is_empty()
    }

    /// `Found N changes`, with `N+` when the list was capped
    pub fn summary(&self) -> String {
        let marker = if self.truncated { "+" } else { "" };
        format!("Found {}{} changes", self.segments.len(), marker)
    }
}

/// Aligns two buffers at address 0 and lists where they differ
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    settings: DiffSettings,
}

impl DiffEngine {
    pub fn new(settings: DiffSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DiffSettings {
        &self.settings
    }

    /// Compares two byte stores
    pub fn diff_stores(&self, left: &ByteStore, right: &ByteStore) -> Result<DiffResult, DiffError> {
        self.diff(left.as_slice(), right.as_slice())
    }

    /// Compares two buffers.
    ///
    /// Differing bytes separated by fewer than `merge_threshold` identical
    /// bytes share a segment.
    pub fn diff(&self, left: &[u8], right: &[u8]) -> Result<DiffResult, DiffError> {
        if left.len() != right.len() {
            return Err(DiffError::LengthMismatch {
                left: left.len(),
                right: right.len(),
            });
        }
        let threshold = self.settings.merge_threshold.max(1);
        let max_segments = self.settings.max_segments;

        let mut segments = Vec::new();
        let mut truncated = false;
        let mut current: Option<(usize, usize)> = None;
        for (address, (a, b)) in left.iter().zip(right).enumerate() {
            if a == b {
                continue;
            }
            match current {
                Some((start, end)) if address - end < threshold => {
                    current = Some((start, address + 1));
                }
                Some((start, end)) => {
                    if segments.len() == max_segments {
                        truncated = true;
                        current = None;
                        break;
                    }
                    segments.push(DiffSegment::aligned(start, end));
                    current = Some((address, address + 1));
                }
                None => current = Some((address, address + 1)),
            }
        }
        if let Some((start, end)) = current {
            if segments.len() == max_segments {
                truncated = true;
            } else {
                segments.push(DiffSegment::aligned(start, end));
            }
        }

        tracing::info!(
            length = left.len(),
            segments = segments.len(),
            truncated,
            "Diff complete"
        );
        Ok(DiffResult {
            segments,
            truncated,
            length: left.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(max_segments: usize, merge_threshold: usize) -> DiffEngine {
        DiffEngine::new(DiffSettings {
            max_segments,
            merge_threshold,
            ..DiffSettings::default()
        })
    }

    fn starts(result: &DiffResult) -> Vec<(usize, usize)> {
        result
            .segments()
            .iter()
            .map(|segment| (segment.left.start, segment.left.end))
            .collect()
    }

    #[test]
    fn test_identical_buffers() {
        let data = vec![7u8; 0x200];
        let result = DiffEngine::default().diff(&data, &data).unwrap();
        assert!(result.is_identical());
        assert!(!result.is_truncated());
        assert_eq!(result.summary(), "Found 0 changes");
    }

    #[test]
    fn test_single_byte() {
        let left = vec![0u8; 0x200];
        let mut right = left.clone();
        right[0] = 1;
        let result = DiffEngine::default().diff(&left, &right).unwrap();
        assert_eq!(starts(&result), vec![(0, 1)]);
        assert_eq!(result.segments()[0].right, ByteRange::new(0, 1));
    }

    #[test]
    fn test_length_mismatch() {
        let result = DiffEngine::default().diff(&vec![0; 0x200], &vec![0; 0x300]);
        assert_eq!(
            result,
            Err(DiffError::LengthMismatch {
                left: 0x200,
                right: 0x300
            })
        );
    }

    #[test]
    fn test_small_gaps_are_bridged() {
        let left = vec![0u8; 0x40];
        let mut right = left.clone();
        for address in [4, 5, 8, 20] {
            right[address] = 0xAA;
        }
        // Gap of 2 identical bytes bridged, gap of 11 not
        assert_eq!(starts(&engine(10, 4).diff(&left, &right).unwrap()), vec![(4, 9), (20, 21)]);
        assert_eq!(
            starts(&engine(10, 1).diff(&left, &right).unwrap()),
            vec![(4, 6), (8, 9), (20, 21)]
        );
    }

    #[test]
    fn test_cap_marks_truncation() {
        let left = vec![0u8; 0x200];
        let mut right = left.clone();
        for address in [1, 30, 60] {
            right[address] = 1;
        }
        let result = engine(2, 4).diff(&left, &right).unwrap();
        assert_eq!(starts(&result), vec![(1, 2), (30, 31)]);
        assert!(result.is_truncated());
        assert!(result.summary().contains('+'));
        assert_eq!(result.summary(), "Found 2+ changes");
    }

    #[test]
    fn test_exact_cap_is_not_truncated() {
        let left = vec![0u8; 0x100];
        let mut right = left.clone();
        right[1] = 1;
        right[60] = 1;
        let result = engine(2, 4).diff(&left, &right).unwrap();
        assert_eq!(result.segments().len(), 2);
        assert!(!result.is_truncated());
    }

    #[test]
    fn test_diff_stores() {
        let left = ByteStore::filled(0x10, 0xFF);
        let right = ByteStore::new(vec![0; 0x10]);
        let result = DiffEngine::default().diff_stores(&left, &right).unwrap();
        assert_eq!(starts(&result), vec![(0, 0x10)]);
        assert_eq!(left.as_slice(), &[0xFF; 0x10]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_segments_cover_exactly_the_differences(
            pairs in proptest::collection::vec((0u8..4, 0u8..4), 0..200),
            threshold in 1usize..6,
        ) {
            let (left, right): (Vec<u8>, Vec<u8>) = pairs.into_iter().unzip();
            let engine = DiffEngine::new(DiffSettings {
                max_segments: usize::MAX,
                merge_threshold: threshold,
                ..DiffSettings::default()
            });
            let result = engine.diff(&left, &right).unwrap();
            prop_assert!(!result.is_truncated());

            let mut previous_end = None;
            for segment in result.segments() {
                prop_assert!(!segment.is_empty());
                // Segments start and end on differing bytes
                prop_assert_ne!(left[segment.left.start], right[segment.left.start]);
                prop_assert_ne!(left[segment.left.end - 1], right[segment.left.end - 1]);
                if let Some(end) = previous_end {
                    prop_assert!(segment.left.start >= end + threshold);
                }
                previous_end = Some(segment.left.end);
            }
            for (address, (a, b)) in left.iter().zip(&right).enumerate() {
                let covered = result.segments().iter().any(|s| s.left.contains(address));
                if a != b {
                    prop_assert!(covered);
                }
            }
        }
    }
}
