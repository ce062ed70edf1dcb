use super::{CellMethod, finalize_grid, full_edges};
use crate::error::MethodError;
use crate::geometry::{BBox, GeometryContext, StyledSpan};
use crate::grid::CellGrid;

/// An opened text extractor that answers per-rectangle queries.
pub trait RegionText {
    /// Text inside `rect`, or `None` when the extractor has nothing there.
    fn text_in(&self, rect: BBox) -> Option<String>;
}

/// A text extractor that can be re-queried for arbitrary sub-rectangles.
///
/// `open` is called once per extraction; the returned handle serves every
/// cell of that table.
pub trait RegionTextSource: Send + Sync {
    fn name(&self) -> &str;

    fn open<'a>(
        &'a self,
        ctx: &'a GeometryContext,
    ) -> Result<Box<dyn RegionText + 'a>, MethodError>;
}

/// Cell method that re-extracts the text of every cell rectangle from a
/// [`RegionTextSource`].
#[derive(Debug, Clone)]
pub struct RegionTextMethod<S> {
    source: S,
}

impl<S: RegionTextSource> RegionTextMethod<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: RegionTextSource> CellMethod for RegionTextMethod<S> {
    fn name(&self) -> &str {
        self.source.name()
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
        let text = self.source.open(ctx)?;

        let cells = row_edges
            .windows(2)
            .map(|ys| {
                col_edges
                    .windows(2)
                    .map(|xs| {
                        text.text_in(BBox::new(xs[0], ys[0], xs[1], ys[1]))
                            .map(|found| collapse_whitespace(&found))
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();
        Ok(finalize_grid(cells, col_edges, row_edges, self.source.name()))
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Re-extracts cell text from the context's styled spans. A span belongs to
/// the cell containing its center.
#[derive(Debug, Clone, Default)]
pub struct SpanTextSource;

struct SpanText<'a> {
    spans: Vec<&'a StyledSpan>,
}

impl RegionText for SpanText<'_> {
    fn text_in(&self, rect: BBox) -> Option<String> {
        let parts = self
            .spans
            .iter()
            .filter(|span| rect.contains_point(span.bbox.center_x(), span.bbox.center_y()))
            .map(|span| span.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

impl RegionTextSource for SpanTextSource {
    fn name(&self) -> &str {
        "span_region"
    }

    fn open<'a>(
        &'a self,
        ctx: &'a GeometryContext,
    ) -> Result<Box<dyn RegionText + 'a>, MethodError> {
        let mut spans = ctx.spans().iter().collect::<Vec<_>>();
        spans.sort_by(|left, right| {
            left.bbox
                .center_y()
                .total_cmp(&right.bbox.center_y())
                .then(left.bbox.x0.total_cmp(&right.bbox.x0))
        });
        Ok(Box::new(SpanText { spans }))
    }
}
