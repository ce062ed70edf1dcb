use super::footnote::starts_with_marker;
use super::{Postprocessor, Processed};
use crate::geometry::GeometryContext;
use crate::grid::{CellGrid, RowExtent, populated_columns};

/// Folds wrapped cell overflow back into the row it belongs to.
///
/// A row continues the current anchor row when its populated columns are a
/// proper, non-empty subset of the anchor's and occupy consecutive positions
/// among the anchor's populated columns. Rows opening with a footnote marker
/// never continue a row.
#[derive(Debug, Clone, Default)]
pub struct ContinuationMerge;

fn continues(anchor: &[usize], candidate: &[usize]) -> bool {
    if candidate.is_empty() || candidate == anchor {
        return false;
    }
    let positions = candidate
        .iter()
        .map(|column| anchor.iter().position(|anchored| anchored == column))
        .collect::<Option<Vec<_>>>();
    positions.is_some_and(|positions| positions.windows(2).all(|pair| pair[1] == pair[0] + 1))
}

fn join_extents(first: Option<RowExtent>, second: Option<RowExtent>) -> Option<RowExtent> {
    match (first, second) {
        (Some((top, bottom)), Some((next_top, next_bottom))) => {
            Some((top.min(next_top), bottom.max(next_bottom)))
        }
        (extent, None) | (None, extent) => extent,
    }
}

impl Postprocessor for ContinuationMerge {
    fn name(&self) -> &str {
        "continuation_merge"
    }

    fn process(&self, grid: &CellGrid, _ctx: &GeometryContext) -> Processed {
        let mut rows: Vec<Vec<String>> = Vec::with_capacity(grid.n_rows());
        let mut extents: Vec<Option<RowExtent>> = Vec::with_capacity(grid.n_rows());
        // Index into `rows` and populated columns of the current anchor.
        let mut anchor: Option<(usize, Vec<usize>)> = None;
        let mut merged = false;

        for (row, extent) in grid.rows().iter().zip(grid.row_extents()) {
            let cells = populated_columns(row);
            match &anchor {
                Some((index, anchor_cells))
                    if !starts_with_marker(row) && continues(anchor_cells, &cells) =>
                {
                    let target = &mut rows[*index];
                    for column in &cells {
                        let addition = row[*column].trim();
                        let cell = &mut target[*column];
                        // Values carried down by inline header fill repeat
                        // the anchor's text.
                        if cell.trim() == addition {
                            continue;
                        }
                        cell.push(' ');
                        cell.push_str(addition);
                    }
                    extents[*index] = join_extents(extents[*index], *extent);
                    merged = true;
                }
                Some(_) => {
                    anchor = Some((rows.len(), cells));
                    rows.push(row.clone());
                    extents.push(*extent);
                }
                None => {
                    if cells.len() >= 2 {
                        anchor = Some((rows.len(), cells));
                    }
                    rows.push(row.clone());
                    extents.push(*extent);
                }
            }
        }

        if merged {
            Processed::Changed(grid.with_rows(rows, extents))
        } else {
            Processed::Unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{ContinuationMerge, continues};
    use crate::geometry::{BBox, GeometryContext};
    use crate::grid::CellGrid;
    use crate::postprocess::{Postprocessor, Processed};

    fn ctx() -> GeometryContext {
        GeometryContext::new(BBox::new(0.0, 0.0, 10.0, 10.0), vec![], vec![], vec![])
    }

    #[test]
    fn merges_wrapped_cell_into_anchor() {
        let grid = CellGrid::from_strs(&[], &[&["A", "long text", "C"], &["", "continued", ""]]);
        let Processed::Changed(next) = ContinuationMerge.process(&grid, &ctx()) else {
            panic!("continuation should merge");
        };
        assert_eq!(next.rows(), [vec!["A", "long text continued", "C"]]);
    }

    #[test]
    fn requires_contiguous_subset() {
        assert!(continues(&[0, 1, 2], &[1, 2]));
        assert!(!continues(&[0, 1, 2], &[0, 2]));
        assert!(!continues(&[0, 1, 2], &[0, 1, 2]));
        assert!(!continues(&[0, 1], &[3]));
        assert!(!continues(&[0, 1], &[]));
    }

    #[test]
    fn non_matching_row_becomes_new_anchor() {
        let grid = CellGrid::from_strs(
            &[],
            &[
                &["a", "b", ""],
                &["c", "d", "e"],
                &["", "", "more"],
            ],
        )
        .with_extents(None, vec![Some((0.0, 5.0)), Some((5.0, 10.0)), Some((10.0, 15.0))]);
        let Processed::Changed(next) = ContinuationMerge.process(&grid, &ctx()) else {
            panic!("continuation should merge");
        };
        assert_eq!(next.rows(), [vec!["a", "b", ""], vec!["c", "d", "e more"]]);
        assert_eq!(next.row_extents(), [Some((0.0, 5.0)), Some((5.0, 15.0))]);
    }

    #[test]
    fn repeated_carried_value_is_not_duplicated() {
        let grid = CellGrid::from_strs(
            &[],
            &[&["Panel A", "long item", "1"], &["Panel A", "wrapped", ""]],
        );
        let Processed::Changed(next) = ContinuationMerge.process(&grid, &ctx()) else {
            panic!("continuation should merge");
        };
        assert_eq!(next.rows(), [vec!["Panel A", "long item wrapped", "1"]]);
    }

    #[test]
    fn footnote_row_is_not_a_continuation() {
        let grid = CellGrid::from_strs(&[], &[&["a", "b"], &["Note: estimates", ""]]);
        assert_eq!(ContinuationMerge.process(&grid, &ctx()), Processed::Unchanged);
    }
}
