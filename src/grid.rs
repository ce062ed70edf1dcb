use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::geometry::BBox;

/// Vertical extent `(top, bottom)` of one logical row on the page.
pub type RowExtent = (f64, f64);

/// Rectangular header + rows table of cell strings.
///
/// Every row has the same width as `headers` (or, when there are no headers,
/// as the widest row); constructors pad short rows with empty strings.
/// Stages that reshape a grid build a new one through the `with_*`/`without_*`
/// helpers, which also keep `row_extents` aligned with `rows`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellGrid {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    col_boundaries: Vec<f64>,
    row_boundaries: Vec<f64>,
    method: String,
    header_extent: Option<RowExtent>,
    row_extents: Vec<Option<RowExtent>>,
}

impl CellGrid {
    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let (headers, rows) = normalize(headers, rows);
        let row_extents = vec![None; rows.len()];
        Self {
            headers,
            rows,
            col_boundaries: Vec::new(),
            row_boundaries: Vec::new(),
            method: "text".to_string(),
            header_extent: None,
            row_extents,
        }
    }

    /// Convenience constructor from string slices, mostly for fixtures.
    #[must_use]
    pub fn from_strs(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self::new(
            headers.iter().map(|cell| (*cell).to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|cell| (*cell).to_string()).collect())
                .collect(),
        )
    }

    #[must_use]
    pub fn with_geometry(
        mut self,
        col_boundaries: Vec<f64>,
        row_boundaries: Vec<f64>,
        method: impl Into<String>,
    ) -> Self {
        self.col_boundaries = col_boundaries;
        self.row_boundaries = row_boundaries;
        self.method = method.into();
        self
    }

    /// Attach the page extent of the header row and of each data row.
    /// Ignored when `row_extents` does not line up with the rows.
    #[must_use]
    pub fn with_extents(
        mut self,
        header_extent: Option<RowExtent>,
        row_extents: Vec<Option<RowExtent>>,
    ) -> Self {
        if row_extents.len() == self.rows.len() {
            self.header_extent = header_extent;
            self.row_extents = row_extents;
        }
        self
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Column boundaries including the region's outer edges.
    #[must_use]
    pub fn col_boundaries(&self) -> &[f64] {
        &self.col_boundaries
    }

    /// Row boundaries including the region's outer edges.
    #[must_use]
    pub fn row_boundaries(&self) -> &[f64] {
        &self.row_boundaries
    }

    /// Name of the cell extraction method that produced the grid.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn header_extent(&self) -> Option<RowExtent> {
        self.header_extent
    }

    #[must_use]
    pub fn row_extents(&self) -> &[Option<RowExtent>] {
        &self.row_extents
    }

    #[must_use]
    pub fn n_cols(&self) -> usize {
        if self.headers.is_empty() {
            self.rows.first().map_or(0, Vec::len)
        } else {
            self.headers.len()
        }
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// `(data rows, columns)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows(), self.n_cols())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.iter().all(|cell| cell.trim().is_empty())
            && self
                .rows
                .iter()
                .all(|row| row.iter().all(|cell| cell.trim().is_empty()))
    }

    /// Replace headers, keeping rows.
    #[must_use]
    pub fn with_headers(&self, headers: Vec<String>, header_extent: Option<RowExtent>) -> Self {
        let mut next = self.clone();
        let (headers, rows) = normalize(headers, std::mem::take(&mut next.rows));
        next.headers = headers;
        next.rows = rows;
        next.header_extent = header_extent;
        next
    }

    /// Replace rows; `row_extents` must line up with `rows`, otherwise every
    /// extent is dropped.
    #[must_use]
    pub fn with_rows(&self, rows: Vec<Vec<String>>, row_extents: Vec<Option<RowExtent>>) -> Self {
        let mut next = self.clone();
        let (headers, rows) = normalize(std::mem::take(&mut next.headers), rows);
        next.row_extents = if row_extents.len() == rows.len() {
            row_extents
        } else {
            vec![None; rows.len()]
        };
        next.headers = headers;
        next.rows = rows;
        next
    }

    #[must_use]
    pub fn without_rows(&self, remove: &BTreeSet<usize>) -> Self {
        let (rows, extents): (Vec<_>, Vec<_>) = self
            .rows
            .iter()
            .zip(&self.row_extents)
            .enumerate()
            .filter(|(index, _)| !remove.contains(index))
            .map(|(_, (row, extent))| (row.clone(), *extent))
            .unzip();
        self.with_rows(rows, extents)
    }

    /// Share of non-empty cells across headers and rows.
    #[must_use]
    pub fn fill_rate(&self) -> f64 {
        let cells = self.headers.iter().chain(self.rows.iter().flatten());
        let (total, filled) = cells.fold((0_usize, 0_usize), |(total, filled), cell| {
            (total + 1, filled + usize::from(!cell.trim().is_empty()))
        });
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = filled as f64 / total as f64;
        rate
    }

    /// Share of rows whose populated-cell count equals the most common one.
    #[must_use]
    pub fn regularity(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }

        let counts = self
            .rows
            .iter()
            .map(|row| populated_columns(row).len())
            .collect::<Vec<_>>();
        let modal = modal_value(&counts);
        #[allow(clippy::cast_precision_loss)]
        let share = counts.iter().filter(|count| **count == modal).count() as f64
            / counts.len() as f64;
        share
    }

    /// Compact shape and fill description used by the evaluation store.
    #[must_use]
    pub fn summary(&self) -> String {
        let (rows, cols) = self.shape();
        format!("{rows}x{cols} fill={:.2} method={}", self.fill_rate(), self.method)
    }

    /// Render as a GitHub-flavoured markdown table.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let width = self.n_cols();
        if width == 0 {
            return String::new();
        }

        let header_cells = if self.headers.is_empty() {
            (1..=width).map(|index| format!("col_{index}")).collect()
        } else {
            self.headers.iter().map(|cell| escape_markdown(cell)).collect::<Vec<_>>()
        };

        let mut out = format!("| {} |\n", header_cells.join(" | "));
        out.push_str(&format!("|{}\n", " --- |".repeat(width)));
        for row in &self.rows {
            let cells = row.iter().map(|cell| escape_markdown(cell)).collect::<Vec<_>>();
            out.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        out
    }
}

fn escape_markdown(cell: &str) -> String {
    cell.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn normalize(mut headers: Vec<String>, rows: Vec<Vec<String>>) -> (Vec<String>, Vec<Vec<String>>) {
    let width = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(headers.len()))
        .max()
        .unwrap_or(0);
    if !headers.is_empty() {
        headers.resize(width, String::new());
    }
    (headers, normalize_rows(rows, width))
}

pub(crate) fn normalize_rows(rows: Vec<Vec<String>>, width: usize) -> Vec<Vec<String>> {
    rows.into_iter()
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect()
}

/// Indices of non-empty cells in a row.
#[must_use]
pub fn populated_columns(row: &[String]) -> Vec<usize> {
    row.iter()
        .enumerate()
        .filter(|(_, cell)| !cell.trim().is_empty())
        .map(|(index, _)| index)
        .collect()
}

/// Most frequent value; ties go to the larger value.
pub(crate) fn modal_value(values: &[usize]) -> usize {
    let mut freq = HashMap::new();
    for value in values {
        *freq.entry(*value).or_insert(0_usize) += 1;
    }

    freq.into_iter()
        .max_by_key(|(value, count)| (*count, *value))
        .map_or(0, |(value, _)| value)
}

/// A finished table handed to the indexing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableOutput {
    pub grid: CellGrid,
    pub bbox: BBox,
    pub page: u32,
}

impl TableOutput {
    #[must_use]
    pub fn to_markdown(&self) -> String {
        self.grid.to_markdown()
    }
}
