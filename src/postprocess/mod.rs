//! Ordered grid-to-grid repairs applied after cell extraction.

mod caption;
mod clean;
mod continuation;
mod footnote;
mod header_split;
mod inline_header;
mod typography;

pub use caption::CaptionStrip;
pub use clean::CellCleaner;
pub use continuation::ContinuationMerge;
pub use footnote::FootnoteStrip;
pub use header_split::HeaderDataSplit;
pub use inline_header::InlineHeaderFill;
pub use typography::TypographyHeader;

use tracing::{debug, warn};

use crate::geometry::GeometryContext;
use crate::grid::CellGrid;

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Processed {
    Unchanged,
    Changed(CellGrid),
}

impl Processed {
    /// `Changed(next)` unless `next` equals `original`.
    #[must_use]
    pub fn changed_if(original: &CellGrid, next: CellGrid) -> Self {
        if next == *original {
            Self::Unchanged
        } else {
            Self::Changed(next)
        }
    }

    #[must_use]
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }

    /// The resulting grid, falling back to `original` for a no-op.
    #[must_use]
    pub fn into_grid(self, original: CellGrid) -> CellGrid {
        match self {
            Self::Unchanged => original,
            Self::Changed(next) => next,
        }
    }
}

/// One repair stage. Stages never fail: a predicate that does not hold means
/// the stage does not apply.
pub trait Postprocessor: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, grid: &CellGrid, ctx: &GeometryContext) -> Processed;
}

/// The seven repair stages in their fixed order.
#[must_use]
pub fn standard_cascade() -> Vec<Box<dyn Postprocessor>> {
    vec![
        Box::new(CaptionStrip),
        Box::new(HeaderDataSplit),
        Box::new(TypographyHeader),
        Box::new(InlineHeaderFill),
        Box::new(ContinuationMerge),
        Box::new(FootnoteStrip),
        Box::new(CellCleaner),
    ]
}

/// Run every stage once, in order. Reports whether any stage changed the
/// grid.
fn run_pass(
    stages: &[Box<dyn Postprocessor>],
    grid: CellGrid,
    ctx: &GeometryContext,
) -> (CellGrid, bool) {
    let mut changed = false;
    let grid = stages.iter().fold(grid, |grid, stage| {
        match stage.process(&grid, ctx) {
            Processed::Unchanged => grid,
            Processed::Changed(next) => {
                debug!(
                    stage = stage.name(),
                    before = ?grid.shape(),
                    after = ?next.shape(),
                    "postprocessor changed grid"
                );
                changed = true;
                next
            }
        }
    });
    (grid, changed)
}

/// Run the stages in order, repeating the pass until it changes nothing, so
/// running the cascade again on the result is a no-op.
///
/// A late stage can expose work for an earlier one: dropping a trailing
/// footnote row may leave a column that only section rows populate. After
/// the first pass every pass that changes the grid removes a row, which
/// bounds the number of passes.
#[must_use]
pub fn run_cascade(
    stages: &[Box<dyn Postprocessor>],
    grid: CellGrid,
    ctx: &GeometryContext,
) -> CellGrid {
    let max_passes = grid.n_rows() + 3;
    let mut grid = grid;
    for _ in 0..max_passes {
        let (next, changed) = run_pass(stages, grid, ctx);
        grid = next;
        if !changed {
            return grid;
        }
    }
    warn!(passes = max_passes, "postprocessor cascade did not settle");
    grid
}
