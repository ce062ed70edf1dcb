use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::{Postprocessor, Processed};
use crate::geometry::GeometryContext;
use crate::grid::{CellGrid, populated_columns};

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:notes?\s*:|sources?\s*:|[*\x{2020}\x{2021}\x{a7}])")
        .expect("hardcoded footnote marker regex is valid")
});

/// Whether the first populated cell of a row opens with a footnote marker.
pub(crate) fn starts_with_marker(row: &[String]) -> bool {
    row.iter()
        .find(|cell| !cell.trim().is_empty())
        .is_some_and(|cell| MARKER_RE.is_match(cell))
}

/// Non-whitespace characters, so the measure survives whitespace cleanup.
fn text_length(row: &[String]) -> usize {
    row.iter()
        .flat_map(|cell| cell.chars())
        .filter(|ch| !ch.is_whitespace())
        .count()
}

/// A row is a length outlier when it is more than twice as long as the
/// longest row above it. Rows below are either already part of the trailing
/// block or end the scan, so they never take part.
fn is_length_outlier(above: &[Vec<String>], row: &[String]) -> bool {
    above
        .iter()
        .map(|other| text_length(other))
        .max()
        .is_some_and(|longest| text_length(row) > 2 * longest.max(1))
}

/// Removes the trailing block of note/source rows.
#[derive(Debug, Clone, Default)]
pub struct FootnoteStrip;

impl Postprocessor for FootnoteStrip {
    fn name(&self) -> &str {
        "footnote_strip"
    }

    fn process(&self, grid: &CellGrid, _ctx: &GeometryContext) -> Processed {
        let rows = grid.rows();
        let remove = (0..rows.len())
            .rev()
            .take_while(|index| {
                let row = &rows[*index];
                starts_with_marker(row)
                    && (populated_columns(row).len() == 1
                        || is_length_outlier(&rows[..*index], row))
            })
            .collect::<BTreeSet<_>>();

        if remove.is_empty() {
            Processed::Unchanged
        } else {
            Processed::Changed(grid.without_rows(&remove))
        }
    }
}
