use std::collections::HashMap;

use super::{Postprocessor, Processed};
use crate::geometry::GeometryContext;
use crate::grid::{CellGrid, RowExtent};

const SIZE_EPSILON: f64 = 0.1;

/// Dominant font size (in tenths of a point) and weight of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RowStyle {
    size_tenths: i64,
    bold: bool,
}

impl RowStyle {
    fn stands_out_from(self, body: Self) -> bool {
        #[allow(clippy::cast_precision_loss)]
        let larger = (self.size_tenths - body.size_tenths) as f64 / 10.0 > SIZE_EPSILON;
        (self.bold && !body.bold) || larger
    }
}

fn row_style(ctx: &GeometryContext, (top, bottom): RowExtent) -> Option<RowStyle> {
    let mut counts: HashMap<RowStyle, usize> = HashMap::new();
    for span in ctx.spans() {
        let center = span.bbox.center_y();
        if center < top || center >= bottom || span.text.trim().is_empty() {
            continue;
        }
        #[allow(clippy::cast_possible_truncation)]
        let style = RowStyle {
            size_tenths: (span.size * 10.0).round() as i64,
            bold: span.bold,
        };
        *counts.entry(style).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(style, count)| (*count, style.size_tenths, style.bold))
        .map(|(style, _)| style)
}

/// Promotes leading rows set in bold or a larger size than the body into the
/// header. Needs row extents and styled spans; grids without them pass
/// through unchanged.
#[derive(Debug, Clone, Default)]
pub struct TypographyHeader;

impl Postprocessor for TypographyHeader {
    fn name(&self) -> &str {
        "typography_header"
    }

    fn process(&self, grid: &CellGrid, ctx: &GeometryContext) -> Processed {
        if ctx.spans().is_empty() || grid.n_rows() < 2 {
            return Processed::Unchanged;
        }

        let styles = grid
            .row_extents()
            .iter()
            .map(|extent| extent.and_then(|extent| row_style(ctx, extent)))
            .collect::<Vec<_>>();

        let mut freq: HashMap<RowStyle, usize> = HashMap::new();
        for style in styles.iter().flatten() {
            *freq.entry(*style).or_insert(0) += 1;
        }
        let Some(body) = freq
            .into_iter()
            .max_by_key(|(style, count)| (*count, -style.size_tenths, !style.bold))
            .map(|(style, _)| style)
        else {
            return Processed::Unchanged;
        };

        let run = styles
            .iter()
            .take_while(|style| style.is_some_and(|style| style.stands_out_from(body)))
            .count();
        if run == 0 || run >= grid.n_rows() {
            return Processed::Unchanged;
        }

        let width = grid.n_cols();
        let mut header_parts: Vec<Vec<&str>> = vec![Vec::new(); width];
        let header_rows = grid.headers().iter().map(String::as_str).collect::<Vec<_>>();
        let promoted = grid.rows()[..run]
            .iter()
            .map(|row| row.iter().map(String::as_str).collect::<Vec<_>>());
        for row in std::iter::once(header_rows).chain(promoted) {
            for (index, cell) in row.into_iter().enumerate() {
                let cell = cell.trim();
                if !cell.is_empty() && index < width {
                    header_parts[index].push(cell);
                }
            }
        }
        let headers = header_parts
            .into_iter()
            .map(|parts| parts.join(" "))
            .collect::<Vec<_>>();

        let extents = grid.row_extents();
        let top = grid
            .header_extent()
            .or(extents[0])
            .map(|(top, _)| top);
        let bottom = extents[run - 1].map(|(_, bottom)| bottom);
        let header_extent = top.zip(bottom);

        Processed::Changed(
            grid.with_headers(headers, header_extent)
                .with_rows(grid.rows()[run..].to_vec(), extents[run..].to_vec()),
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::TypographyHeader;
    use crate::geometry::{BBox, GeometryContext, StyledSpan};
    use crate::grid::CellGrid;
    use crate::postprocess::{Postprocessor, Processed};

    fn span(text: &str, y: f64, size: f64, bold: bool) -> StyledSpan {
        let span = StyledSpan::new(text, BBox::new(0.0, y, 30.0, y + 8.0), "Helvetica", size);
        if bold { span.bold() } else { span }
    }

    fn grid() -> CellGrid {
        CellGrid::from_strs(
            &[],
            &[&["Region", "Sales"], &["", "(USD)"], &["North", "10"], &["South", "12"]],
        )
        .with_extents(
            None,
            vec![
                Some((0.0, 10.0)),
                Some((10.0, 20.0)),
                Some((20.0, 30.0)),
                Some((30.0, 40.0)),
            ],
        )
    }

    #[test]
    fn merges_leading_bold_rows_into_header() {
        let ctx = GeometryContext::new(
            BBox::new(0.0, 0.0, 100.0, 40.0),
            vec![],
            vec![],
            vec![
                span("Region", 1.0, 9.0, true),
                span("(USD)", 11.0, 9.0, true),
                span("North", 21.0, 9.0, false),
                span("South", 31.0, 9.0, false),
            ],
        );
        let Processed::Changed(next) = TypographyHeader.process(&grid(), &ctx) else {
            panic!("bold rows should become the header");
        };
        assert_eq!(next.headers(), ["Region", "Sales (USD)"]);
        assert_eq!(next.rows(), [vec!["North", "10"], vec!["South", "12"]]);
        assert_eq!(next.header_extent(), Some((0.0, 20.0)));
    }

    #[test]
    fn uniform_typography_is_a_no_op() {
        let ctx = GeometryContext::new(
            BBox::new(0.0, 0.0, 100.0, 40.0),
            vec![],
            vec![],
            vec![
                span("Region", 1.0, 9.0, false),
                span("North", 21.0, 9.0, false),
                span("South", 31.0, 9.0, false),
            ],
        );
        assert_eq!(TypographyHeader.process(&grid(), &ctx), Processed::Unchanged);
    }

    #[test]
    fn larger_first_row_is_promoted() {
        let ctx = GeometryContext::new(
            BBox::new(0.0, 0.0, 100.0, 40.0),
            vec![],
            vec![],
            vec![
                span("Region", 1.0, 11.0, false),
                span("(USD)", 11.0, 9.0, false),
                span("North", 21.0, 9.0, false),
                span("South", 31.0, 9.0, false),
            ],
        );
        let Processed::Changed(next) = TypographyHeader.process(&grid(), &ctx) else {
            panic!("larger row should become the header");
        };
        assert_eq!(next.headers(), ["Region", "Sales"]);
        assert_eq!(next.n_rows(), 3);
    }
}
