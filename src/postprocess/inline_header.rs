use super::{Postprocessor, Processed};
use crate::geometry::GeometryContext;
use crate::grid::{CellGrid, populated_columns};

/// Turns section rows ("Panel A: Men") that span the table into a value
/// carried down the rows beneath them.
///
/// A column qualifies when every row either has it as its only populated
/// cell (a section row) or leaves it empty, and both kinds of row occur.
#[derive(Debug, Clone, Default)]
pub struct InlineHeaderFill;

fn section_column(grid: &CellGrid) -> Option<usize> {
    if grid.n_cols() < 2 {
        return None;
    }
    let populated = grid
        .rows()
        .iter()
        .map(|row| populated_columns(row))
        .collect::<Vec<_>>();

    (0..grid.n_cols()).find(|column| {
        let mut sections = 0;
        let mut data = 0;
        for cells in &populated {
            match cells.as_slice() {
                [only] if only == column => sections += 1,
                cells if !cells.contains(column) => {
                    if !cells.is_empty() {
                        data += 1;
                    }
                }
                _ => return false,
            }
        }
        sections > 0 && data > 0
    })
}

impl Postprocessor for InlineHeaderFill {
    fn name(&self) -> &str {
        "inline_header_fill"
    }

    fn process(&self, grid: &CellGrid, _ctx: &GeometryContext) -> Processed {
        let Some(column) = section_column(grid) else {
            return Processed::Unchanged;
        };

        let mut current: Option<String> = None;
        let mut rows = Vec::with_capacity(grid.n_rows());
        let mut extents = Vec::with_capacity(grid.n_rows());
        for (row, extent) in grid.rows().iter().zip(grid.row_extents()) {
            let cells = populated_columns(row);
            if cells.as_slice() == [column] {
                current = Some(row[column].trim().to_string());
                continue;
            }
            let mut row = row.clone();
            if !cells.is_empty()
                && let Some(section) = &current
            {
                row[column].clone_from(section);
            }
            rows.push(row);
            extents.push(*extent);
        }
        Processed::Changed(grid.with_rows(rows, extents))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::InlineHeaderFill;
    use crate::geometry::{BBox, GeometryContext};
    use crate::grid::CellGrid;
    use crate::postprocess::{Postprocessor, Processed};

    fn ctx() -> GeometryContext {
        GeometryContext::new(BBox::new(0.0, 0.0, 10.0, 10.0), vec![], vec![], vec![])
    }

    #[test]
    fn fills_section_value_down_and_drops_section_rows() {
        let grid = CellGrid::from_strs(
            &["Group", "Item", "Value"],
            &[
                &["Fruit", "", ""],
                &["", "Apple", "3"],
                &["", "Pear", "4"],
                &["Vegetables", "", ""],
                &["", "Leek", "1"],
            ],
        );
        let Processed::Changed(next) = InlineHeaderFill.process(&grid, &ctx()) else {
            panic!("section rows should be filled down");
        };
        assert_eq!(
            next.rows(),
            [
                vec!["Fruit", "Apple", "3"],
                vec!["Fruit", "Pear", "4"],
                vec!["Vegetables", "Leek", "1"],
            ]
        );
        assert_eq!(InlineHeaderFill.process(&next, &ctx()), Processed::Unchanged);
    }

    #[test]
    fn regular_table_is_untouched() {
        let grid = CellGrid::from_strs(&["A", "B"], &[&["1", "2"], &["3", ""], &["", "4"]]);
        assert_eq!(InlineHeaderFill.process(&grid, &ctx()), Processed::Unchanged);
    }
}
