use std::sync::LazyLock;

use regex::Regex;

use super::{Postprocessor, Processed};
use crate::geometry::GeometryContext;
use crate::grid::CellGrid;

const FUSED_TRIGGER: f64 = 0.3;

/// Words that turn a trailing number into a label ("Model 2", "Panel 3").
const LABEL_WORDS: &[&str] = &[
    "model",
    "column",
    "col",
    "specification",
    "spec",
    "panel",
    "wave",
    "round",
    "step",
    "stage",
    "phase",
    "group",
    "sample",
    "study",
    "experiment",
    "table",
    "no",
    "no.",
];

static FUSED_RE: LazyLock<Regex> = LazyLock::new(|| {
    let number = r"[-+\x{2212}]?(?:\d[\d,]*(?:\.\d+)?|\.\d+)%?";
    Regex::new(&format!(
        r"(?s)^(?P<label>.*?[^\s\d.,%+\-\x{{2212}}])\s+(?P<values>{number}(?:\s+{number})*)$"
    ))
    .expect("hardcoded fused header regex is valid")
});

/// Split of one fused header cell.
fn split_fused(header: &str) -> Option<(String, String)> {
    let caps = FUSED_RE.captures(header.trim())?;
    let label = caps.name("label")?.as_str().trim_end();
    let values = caps.name("values")?.as_str();

    let last_word = label
        .split_whitespace()
        .last()
        .map(str::to_lowercase)
        .unwrap_or_default();
    if LABEL_WORDS.contains(&last_word.as_str()) {
        return None;
    }
    Some((label.to_string(), values.to_string()))
}

/// Moves numeric values that got fused onto the end of header cells into a
/// new first data row, once enough columns show the pattern.
#[derive(Debug, Clone, Default)]
pub struct HeaderDataSplit;

impl Postprocessor for HeaderDataSplit {
    fn name(&self) -> &str {
        "header_data_split"
    }

    fn process(&self, grid: &CellGrid, _ctx: &GeometryContext) -> Processed {
        let headers = grid.headers();
        if headers.is_empty() {
            return Processed::Unchanged;
        }

        let splits = headers
            .iter()
            .map(|header| split_fused(header))
            .collect::<Vec<_>>();
        let fused = splits.iter().filter(|split| split.is_some()).count();
        #[allow(clippy::cast_precision_loss)]
        let fraction = fused as f64 / headers.len() as f64;
        if fused == 0 || fraction < FUSED_TRIGGER {
            return Processed::Unchanged;
        }

        let (new_headers, values): (Vec<_>, Vec<_>) = headers
            .iter()
            .zip(splits)
            .map(|(header, split)| split.unwrap_or_else(|| (header.clone(), String::new())))
            .unzip();

        let mut rows = Vec::with_capacity(grid.n_rows() + 1);
        rows.push(values);
        rows.extend(grid.rows().iter().cloned());
        let mut extents = Vec::with_capacity(rows.len());
        extents.push(None);
        extents.extend(grid.row_extents().iter().copied());

        Processed::Changed(
            grid.with_headers(new_headers, grid.header_extent())
                .with_rows(rows, extents),
        )
    }
}
