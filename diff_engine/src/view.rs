//! Side-by-side diff view
//!
//! The view lays the left buffer and the right buffer next to each other
//! with one separator column between them. Only rows touched by a segment,
//! plus a few rows of trailing context, are shown.

use crate::engine::{DiffEngine, DiffResult, DiffSegment};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSide {
    Left,
    Right,
}

/// One visible row: the start address of the row shown on each side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffRow {
    pub left: usize,
    pub right: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffView {
    left_width: usize,
    right_width: usize,
    length: usize,
    rows: Vec<DiffRow>,
    segments: Vec<DiffSegment>,
}

impl DiffView {
    /// Builds the view for `result`.
    ///
    /// Rows are laid out in left-side units; the right side shows the row
    /// that contains the same start address.
    pub fn new(
        result: &DiffResult,
        left_width: usize,
        right_width: usize,
        context_rows: usize,
        max_width: usize,
    ) -> Self {
        let max_width = max_width.max(1);
        let left_width = left_width.clamp(1, max_width);
        let right_width = right_width.clamp(1, max_width);
        let length = result.length();
        let last_row = length.saturating_sub(1) / left_width;

        let mut visible = BTreeSet::new();
        for segment in result.segments() {
            let first = segment.left.start / left_width;
            let last = (segment.left.end - 1) / left_width;
            visible.extend(first..=(last + context_rows).min(last_row));
        }
        let rows = visible
            .into_iter()
            .map(|row| {
                let left = row * left_width;
                DiffRow {
                    left,
                    right: left / right_width * right_width,
                }
            })
            .collect();

        Self {
            left_width,
            right_width,
            length,
            rows,
            segments: result.segments().to_vec(),
        }
    }

    /// Columns across both sides and the separator
    pub fn width(&self) -> usize {
        self.left_width + 1 + self.right_width
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn left_width(&self) -> usize {
        self.left_width
    }

    pub fn right_width(&self) -> usize {
        self.right_width
    }

    pub fn rows(&self) -> &[DiffRow] {
        &self.rows
    }

    /// Resolves a cell to a side and byte address.
    ///
    /// The separator column and cells past either buffer resolve to `None`.
    pub fn cell_address(&self, x: usize, y: usize) -> Option<(DiffSide, usize)> {
        let row = self.rows.get(y)?;
        let (side, address) = if x < self.left_width {
            (DiffSide::Left, row.left + x)
        } else if x > self.left_width && x < self.width() {
            (DiffSide::Right, row.right + x - self.left_width - 1)
        } else {
            return None;
        };
        (address < self.length).then_some((side, address))
    }

    /// Whether the cell at `(x, y)` lies inside a differing segment
    pub fn is_selected(&self, x: usize, y: usize) -> bool {
        match self.cell_address(x, y) {
            Some((DiffSide::Left, address)) => {
                self.segments.iter().any(|segment| segment.left.contains(address))
            }
            Some((DiffSide::Right, address)) => {
                self.segments.iter().any(|segment| segment.right.contains(address))
            }
            None => false,
        }
    }
}

impl DiffEngine {
    /// Builds a view over `result` using this engine's settings
    pub fn view(&self, result: &DiffResult, left_width: usize, right_width: usize) -> DiffView {
        let settings = self.settings();
        DiffView::new(
            result,
            left_width,
            right_width,
            settings.context_rows,
            settings.max_view_width,
        )
    }
}
