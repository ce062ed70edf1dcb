use tracing::debug;

use super::{StructureMethod, phrase_gap, phrases};
use crate::boundary::{BoundaryHypothesis, BoundaryPoint};
use crate::error::MethodError;
use crate::geometry::{BBox, GeometryContext};

const DEFAULT_FINDER_CONFIDENCE: f64 = 0.7;
const EDGE_TOLERANCE: f64 = 0.5;

/// Cell rectangles reported by a table-finding routine.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundTable {
    pub cells: Vec<BBox>,
    /// The routine's own quality score on a 0..=100 scale, if it has one.
    pub accuracy: Option<f64>,
}

/// A table-finding routine restricted to one region.
pub trait TableFinder: Send + Sync {
    fn name(&self) -> &str;

    fn find(&self, ctx: &GeometryContext) -> Result<Option<FoundTable>, MethodError>;
}

/// Turns any [`TableFinder`] into a structure method by reading boundaries
/// off the reported cell rectangles.
#[derive(Debug, Clone)]
pub struct TableFinderMethod<F> {
    finder: F,
    default_confidence: f64,
}

impl<F: TableFinder> TableFinderMethod<F> {
    #[must_use]
    pub fn new(finder: F) -> Self {
        Self {
            finder,
            default_confidence: DEFAULT_FINDER_CONFIDENCE,
        }
    }

    #[must_use]
    pub fn with_default_confidence(mut self, confidence: f64) -> Self {
        self.default_confidence = confidence;
        self
    }
}

impl<F: TableFinder> StructureMethod for TableFinderMethod<F> {
    fn name(&self) -> &str {
        self.finder.name()
    }

    fn detect(&self, ctx: &GeometryContext) -> Result<Option<BoundaryHypothesis>, MethodError> {
        let Some(found) = self.finder.find(ctx)? else {
            return Ok(None);
        };
        if found.cells.is_empty() {
            return Ok(None);
        }

        let confidence = found
            .accuracy
            .filter(|accuracy| accuracy.is_finite())
            .map_or(self.default_confidence, |accuracy| {
                (accuracy / 100.0).clamp(0.0, 1.0)
            });
        let name = self.finder.name();

        let columns = interior_edges(found.cells.iter().map(|cell| cell.x0))
            .into_iter()
            .map(|x| BoundaryPoint::new(x, confidence, name))
            .collect::<Vec<_>>();
        let rows = interior_edges(found.cells.iter().map(|cell| cell.y0))
            .into_iter()
            .map(|y| BoundaryPoint::new(y, confidence, name))
            .collect::<Vec<_>>();

        if columns.is_empty() && rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(BoundaryHypothesis::new(name, columns, rows)))
    }
}

/// Distinct leading edges, minus the grid's own outer edge.
fn interior_edges(edges: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut values = edges.filter(|value| value.is_finite()).collect::<Vec<_>>();
    values.sort_by(f64::total_cmp);
    values.dedup_by(|next, kept| (*next - *kept).abs() <= EDGE_TOLERANCE);
    if !values.is_empty() {
        values.remove(0);
    }
    values
}

/// Finds columns from vertical whitespace corridors shared by the rows that
/// contain more than one phrase.
#[derive(Debug, Clone, Default)]
pub struct StreamFinder;

impl TableFinder for StreamFinder {
    fn name(&self) -> &str {
        "stream_finder"
    }

    fn find(&self, ctx: &GeometryContext) -> Result<Option<FoundTable>, MethodError> {
        let rows = ctx.rows();
        if rows.len() < 2 {
            return Ok(None);
        }

        let max_gap = phrase_gap(ctx);
        let row_phrases = rows
            .iter()
            .map(|row| phrases(row, max_gap))
            .collect::<Vec<_>>();
        let tabular = row_phrases
            .iter()
            .filter(|phrases| phrases.len() >= 2)
            .collect::<Vec<_>>();
        if tabular.len() < 2 {
            return Ok(None);
        }

        let mut spans = tabular
            .iter()
            .flat_map(|phrases| phrases.iter().map(|phrase| (phrase.x0, phrase.x1)))
            .collect::<Vec<_>>();
        spans.sort_by(|left, right| left.0.total_cmp(&right.0));

        let mut covered: Vec<(f64, f64)> = Vec::new();
        for (start, end) in spans {
            match covered.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => covered.push((start, end)),
            }
        }
        if covered.len() < 2 {
            return Ok(None);
        }

        let region = ctx.region();
        let mut col_edges = vec![region.x0];
        col_edges.extend(
            covered
                .windows(2)
                .map(|pair| f64::midpoint(pair[0].1, pair[1].0)),
        );
        col_edges.push(region.x1);

        let mut row_edges = vec![region.y0];
        row_edges.extend(rows.windows(2).map(|pair| {
            let bottom = pair[0]
                .iter()
                .map(|word| word.bbox.y1)
                .fold(f64::NEG_INFINITY, f64::max);
            let top = pair[1]
                .iter()
                .map(|word| word.bbox.y0)
                .fold(f64::INFINITY, f64::min);
            f64::midpoint(bottom, top)
        }));
        row_edges.push(region.y1);

        let cells = row_edges
            .windows(2)
            .flat_map(|ys| {
                col_edges
                    .windows(2)
                    .map(move |xs| BBox::new(xs[0], ys[0], xs[1], ys[1]))
            })
            .collect::<Vec<_>>();

        #[allow(clippy::cast_precision_loss)]
        let accuracy = 100.0 * tabular.len() as f64 / rows.len() as f64;
        debug!(
            columns = col_edges.len() - 1,
            rows = row_edges.len() - 1,
            accuracy,
            "stream finder located a grid"
        );
        Ok(Some(FoundTable {
            cells,
            accuracy: Some(accuracy),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::{FoundTable, StreamFinder, TableFinder, TableFinderMethod};
    use crate::error::MethodError;
    use crate::geometry::{BBox, GeometryContext, Word};
    use crate::structure::StructureMethod;

    struct FixedFinder(Option<FoundTable>);

    impl TableFinder for FixedFinder {
        fn name(&self) -> &str {
            "fixed"
        }

        fn find(&self, _ctx: &GeometryContext) -> Result<Option<FoundTable>, MethodError> {
            Ok(self.0.clone())
        }
    }

    fn empty_ctx() -> GeometryContext {
        GeometryContext::new(BBox::new(0.0, 0.0, 100.0, 100.0), vec![], vec![], vec![])
    }

    #[test]
    fn converts_cell_rectangles_to_interior_boundaries() {
        let cells = vec![
            BBox::new(0.0, 0.0, 50.0, 20.0),
            BBox::new(50.0, 0.0, 100.0, 20.0),
            BBox::new(0.0, 20.0, 50.0, 40.0),
            BBox::new(50.2, 20.0, 100.0, 40.0),
        ];
        let method = TableFinderMethod::new(FixedFinder(Some(FoundTable {
            cells,
            accuracy: Some(87.0),
        })));

        let hypothesis = method
            .detect(&empty_ctx())
            .expect("detection should not fail")
            .expect("cells should produce boundaries");
        assert_eq!(hypothesis.method, "fixed");
        assert_eq!(hypothesis.column_positions(), vec![50.0]);
        assert_eq!(hypothesis.row_positions(), vec![20.0]);
        assert!((hypothesis.columns[0].confidence - 0.87).abs() < 1e-9);
    }

    #[test]
    fn uses_default_confidence_without_accuracy() {
        let method = TableFinderMethod::new(FixedFinder(Some(FoundTable {
            cells: vec![BBox::new(0.0, 0.0, 10.0, 10.0), BBox::new(10.0, 0.0, 20.0, 10.0)],
            accuracy: None,
        })));
        let hypothesis = method
            .detect(&empty_ctx())
            .expect("detection should not fail")
            .expect("cells should produce boundaries");
        assert!((hypothesis.columns[0].confidence - 0.7).abs() < 1e-9);

        let method = TableFinderMethod::new(FixedFinder(Some(FoundTable {
            cells: vec![BBox::new(0.0, 0.0, 10.0, 10.0), BBox::new(10.0, 0.0, 20.0, 10.0)],
            accuracy: None,
        })))
        .with_default_confidence(0.6);
        let hypothesis = method
            .detect(&empty_ctx())
            .expect("detection should not fail")
            .expect("cells should produce boundaries");
        assert!((hypothesis.columns[0].confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn finder_without_table_yields_none() {
        let method = TableFinderMethod::new(FixedFinder(None));
        assert!(method.detect(&empty_ctx()).expect("should not fail").is_none());
    }

    #[test]
    fn stream_finder_splits_on_shared_whitespace() {
        let ctx = GeometryContext::new(
            BBox::new(0.0, 0.0, 200.0, 40.0),
            vec![
                Word::new("Name", 0.0, 0.0, 40.0, 10.0),
                Word::new("Age", 100.0, 0.0, 130.0, 10.0),
                Word::new("Alice", 0.0, 20.0, 45.0, 30.0),
                Word::new("30", 100.0, 20.0, 115.0, 30.0),
            ],
            vec![],
            vec![],
        );

        let found = StreamFinder
            .find(&ctx)
            .expect("finder should not fail")
            .expect("table should be found");
        assert_eq!(found.cells.len(), 4);
        assert_eq!(found.cells[0], BBox::new(0.0, 0.0, 72.5, 15.0));
        assert_eq!(found.accuracy, Some(100.0));
    }
}
