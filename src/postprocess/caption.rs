use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::{Postprocessor, Processed};
use crate::geometry::GeometryContext;
use crate::grid::{CellGrid, populated_columns};

static CAPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(table|figure|fig\.?)\s*[A-Z]?\d+[a-z]?\b")
        .expect("hardcoded caption regex is valid")
});

/// Removes a table or figure caption that cell extraction pulled into the
/// header or the first data rows.
#[derive(Debug, Clone, Default)]
pub struct CaptionStrip;

/// The row's only populated cell, when there is exactly one.
fn sole_text(row: &[String]) -> Option<&str> {
    match populated_columns(row).as_slice() {
        [index] => Some(row[*index].trim()),
        _ => None,
    }
}

fn is_caption_row(row: &[String]) -> bool {
    sole_text(row).is_some_and(|text| CAPTION_RE.is_match(text))
}

impl Postprocessor for CaptionStrip {
    fn name(&self) -> &str {
        "caption_strip"
    }

    fn process(&self, grid: &CellGrid, _ctx: &GeometryContext) -> Processed {
        let header_caption = is_caption_row(grid.headers());
        let leading = grid
            .rows()
            .iter()
            .take_while(|row| is_caption_row(row))
            .count();
        if !header_caption && leading == 0 {
            return Processed::Unchanged;
        }

        let mut next = if header_caption {
            // Only one header cell was populated, so clearing it empties
            // the whole header.
            grid.with_headers(Vec::new(), None)
        } else {
            grid.clone()
        };
        if leading > 0 {
            next = next.without_rows(&(0..leading).collect::<BTreeSet<_>>());
        }
        Processed::Changed(next)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::CaptionStrip;
    use crate::geometry::{BBox, GeometryContext};
    use crate::grid::CellGrid;
    use crate::postprocess::{Postprocessor, Processed};

    fn ctx() -> GeometryContext {
        GeometryContext::new(BBox::new(0.0, 0.0, 10.0, 10.0), vec![], vec![], vec![])
    }

    #[test]
    fn strips_caption_from_first_row() {
        let grid = CellGrid::from_strs(
            &["A", "B", "C"],
            &[&["Table 1. Results", "", ""], &["1", "2", "3"]],
        );
        let Processed::Changed(next) = CaptionStrip.process(&grid, &ctx()) else {
            panic!("caption row should be removed");
        };
        assert_eq!(next.headers(), ["A", "B", "C"]);
        assert_eq!(next.rows(), [vec!["1", "2", "3"]]);
    }

    #[test]
    fn drops_caption_headers_entirely() {
        let grid = CellGrid::from_strs(&["", "FIGURE 3a: overview", ""], &[&["x", "y", "z"]]);
        let Processed::Changed(next) = CaptionStrip.process(&grid, &ctx()) else {
            panic!("caption header should be cleared");
        };
        assert!(next.headers().is_empty());
        assert_eq!(next.rows(), [vec!["x", "y", "z"]]);
    }

    #[test]
    fn leaves_ordinary_rows_alone() {
        let grid = CellGrid::from_strs(
            &["A", "B"],
            &[&["Tablespoons", ""], &["Table 1", "extra"]],
        );
        assert_eq!(CaptionStrip.process(&grid, &ctx()), Processed::Unchanged);
    }
}
