//! Strategies that turn fixed boundaries into a grid of cell text.

mod region;
mod word_assign;

pub use region::{RegionText, RegionTextMethod, RegionTextSource, SpanTextSource};
pub use word_assign::WordAssignment;

use crate::error::MethodError;
use crate::geometry::GeometryContext;
use crate::grid::CellGrid;

/// A cell extraction strategy.
///
/// Boundaries are interior cuts only; the region's own edges are added by
/// the method. `Ok(None)` means there was no usable text.
pub trait CellMethod: Send + Sync {
    fn name(&self) -> &str;

    fn extract(
        &self,
        ctx: &GeometryContext,
        col_boundaries: &[f64],
        row_boundaries: &[f64],
    ) -> Result<Option<CellGrid>, MethodError>;
}

/// Outer edges plus the interior cuts that fall strictly inside them.
pub(crate) fn full_edges(low: f64, high: f64, interior: &[f64]) -> Vec<f64> {
    let mut edges = vec![low];
    let mut inside = interior
        .iter()
        .copied()
        .filter(|cut| cut.is_finite() && *cut > low && *cut < high)
        .collect::<Vec<_>>();
    inside.sort_by(f64::total_cmp);
    inside.dedup();
    edges.extend(inside);
    edges.push(high);
    edges
}

/// Index of the slot `value` falls into given interior cuts. A value sitting
/// exactly on a cut belongs to the slot on its right.
pub(crate) fn slot_index(value: f64, cuts: &[f64]) -> usize {
    cuts.partition_point(|cut| *cut <= value)
}

/// Drop rows that came out empty and promote the first remaining row to
/// headers. `cells` is indexed `[row][col]` over the full edge grid.
pub(crate) fn finalize_grid(
    cells: Vec<Vec<String>>,
    col_edges: Vec<f64>,
    row_edges: Vec<f64>,
    method: &str,
) -> Option<CellGrid> {
    let mut logical = cells
        .into_iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|(index, row)| {
            let extent = row_edges
                .get(index)
                .zip(row_edges.get(index + 1))
                .map(|(top, bottom)| (*top, *bottom));
            (row, extent)
        })
        .collect::<Vec<_>>();
    if logical.is_empty() {
        return None;
    }

    let (headers, header_extent) = logical.remove(0);
    let (rows, row_extents): (Vec<_>, Vec<_>) = logical.into_iter().unzip();
    Some(
        CellGrid::new(headers, rows)
            .with_geometry(col_edges, row_edges, method)
            .with_extents(header_extent, row_extents),
    )
}

#[cfg(test)]
mod tests {
    use super::{finalize_grid, full_edges, slot_index};

    #[test]
    fn slot_index_is_right_biased() {
        let cuts = [10.0, 20.0];
        assert_eq!(slot_index(5.0, &cuts), 0);
        assert_eq!(slot_index(10.0, &cuts), 1);
        assert_eq!(slot_index(25.0, &cuts), 2);
    }

    #[test]
    fn full_edges_drops_cuts_outside_region() {
        assert_eq!(
            full_edges(0.0, 100.0, &[150.0, 40.0, 0.0, 40.0]),
            vec![0.0, 40.0, 100.0]
        );
    }

    #[test]
    fn finalize_skips_empty_rows_and_promotes_header() {
        let cells = vec![
            vec!["A".to_string(), "B".to_string()],
            vec![String::new(), String::new()],
            vec!["1".to_string(), String::new()],
        ];
        let grid = finalize_grid(cells, vec![0.0, 5.0, 10.0], vec![0.0, 1.0, 2.0, 3.0], "m")
            .expect("grid should be built");

        assert_eq!(grid.headers(), ["A", "B"]);
        assert_eq!(grid.rows(), [vec!["1", ""]]);
        assert_eq!(grid.header_extent(), Some((0.0, 1.0)));
        assert_eq!(grid.row_extents(), [Some((2.0, 3.0))]);
    }
}
