use super::{CellMethod, finalize_grid, full_edges, slot_index};
use crate::error::MethodError;
use crate::geometry::GeometryContext;
use crate::grid::CellGrid;

const NAME: &str = "word_assign";

/// Assigns every word to the cell containing its center point.
#[derive(Debug, Clone, Default)]
pub struct WordAssignment;

impl CellMethod for WordAssignment {
    fn name(&self) -> &str {
        NAME
    }

    fn extract(
        &self,
        ctx: &GeometryContext,
        col_boundaries: &[f64],
        row_boundaries: &[f64],
    ) -> Result<Option<CellGrid>, MethodError> {
        if ctx.words().is_empty() {
            return Ok(None);
        }

        let region = ctx.region();
        let col_edges = full_edges(region.x0, region.x1, col_boundaries);
        let row_edges = full_edges(region.y0, region.y1, row_boundaries);
        let col_cuts = &col_edges[1..col_edges.len() - 1];
        let row_cuts = &row_edges[1..row_edges.len() - 1];

        let mut cells = vec![vec![Vec::<&str>::new(); col_cuts.len() + 1]; row_cuts.len() + 1];
        // Visual rows are already in reading order, so pushing in this order
        // keeps each cell's words left-to-right, top-to-bottom.
        for word in ctx.rows().iter().flatten() {
            let text = word.text.trim();
            if text.is_empty() {
                continue;
            }
            let col = slot_index(word.center_x(), col_cuts);
            let row = slot_index(word.bbox.center_y(), row_cuts);
            cells[row][col].push(text);
        }

        let cells = cells
            .into_iter()
            .map(|row| row.into_iter().map(|words| words.join(" ")).collect())
            .collect();
        Ok(finalize_grid(cells, col_edges, row_edges, NAME))
    }
}
