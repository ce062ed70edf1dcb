//! Page geometry handed over by the document reader for one table region.
//!
//! Coordinates use a top-left origin with y growing downward, so for every
//! box `y0` is the top edge and `y1` the bottom edge.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rows::cluster_rows;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    #[must_use]
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    #[must_use]
    pub fn center_x(&self) -> f64 {
        f64::midpoint(self.x0, self.x1)
    }

    #[must_use]
    pub fn center_y(&self) -> f64 {
        f64::midpoint(self.y0, self.y1)
    }

    #[must_use]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|value| value.is_finite())
            && self.x1 > self.x0
            && self.y1 > self.y0
    }
}

impl FromStr for BBox {
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let parts = spec.split(',').map(str::trim).collect::<Vec<_>>();
        if parts.len() != 4 {
            return Err(format!(
                "invalid box '{spec}', expected exactly 4 coordinates"
            ));
        }

        let mut values = [0.0_f64; 4];
        for (slot, (part, name)) in values
            .iter_mut()
            .zip(parts.iter().zip(["x0", "y0", "x1", "y1"]))
        {
            *slot = part
                .parse()
                .map_err(|_| format!("invalid {name} coordinate: '{part}'"))?;
        }

        let bbox = Self::new(values[0], values[1], values[2], values[3]);
        if !bbox.is_valid() {
            return Err("box requires x1>x0 and y1>y0".to_string());
        }
        Ok(bbox)
    }
}

/// One word as reported by the document reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub bbox: BBox,
    pub text: String,
    #[serde(default)]
    pub block: u32,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub word: u32,
}

impl Word {
    #[must_use]
    pub fn new(text: impl Into<String>, x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            bbox: BBox::new(x0, y0, x1, y1),
            text: text.into(),
            block: 0,
            line: 0,
            word: 0,
        }
    }

    #[must_use]
    pub fn with_indices(mut self, block: u32, line: u32, word: u32) -> Self {
        self.block = block;
        self.line = line;
        self.word = word;
        self
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.bbox.height()
    }

    #[must_use]
    pub fn mid_y(&self) -> f64 {
        self.bbox.center_y()
    }

    #[must_use]
    pub fn center_x(&self) -> f64 {
        self.bbox.center_x()
    }

    /// Total order used wherever words must be sorted deterministically.
    pub(crate) fn reading_cmp(&self, other: &Self) -> Ordering {
        self.bbox
            .x0
            .total_cmp(&other.bbox.x0)
            .then_with(|| self.bbox.y0.total_cmp(&other.bbox.y0))
            .then_with(|| self.bbox.x1.total_cmp(&other.bbox.x1))
            .then_with(|| self.bbox.y1.total_cmp(&other.bbox.y1))
            .then_with(|| self.text.cmp(&other.text))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A straight segment taken from the page's vector drawing operators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl LineSegment {
    #[must_use]
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    #[must_use]
    pub fn length(&self) -> f64 {
        (self.x1 - self.x0).hypot(self.y1 - self.y0)
    }

    /// Axis the segment runs along, if it deviates from that axis by less
    /// than `max_angle_degrees`.
    #[must_use]
    pub fn orientation(&self, max_angle_degrees: f64) -> Option<Orientation> {
        let dx = (self.x1 - self.x0).abs();
        let dy = (self.y1 - self.y0).abs();
        if dx == 0.0 && dy == 0.0 {
            return None;
        }

        let angle = dy.atan2(dx).to_degrees();
        if angle < max_angle_degrees {
            Some(Orientation::Horizontal)
        } else if 90.0 - angle < max_angle_degrees {
            Some(Orientation::Vertical)
        } else {
            None
        }
    }
}

/// A run of text sharing one font, as reported by the reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyledSpan {
    pub bbox: BBox,
    pub font: String,
    pub size: f64,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    pub text: String,
}

impl StyledSpan {
    #[must_use]
    pub fn new(text: impl Into<String>, bbox: BBox, font: impl Into<String>, size: f64) -> Self {
        Self {
            bbox,
            font: font.into(),
            size,
            bold: false,
            italic: false,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    #[must_use]
    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    /// Symbol-encoded fonts map glyph codes into the control range.
    #[must_use]
    pub fn is_symbol_font(&self) -> bool {
        let lower = self.font.to_ascii_lowercase();
        ["symbol", "dingbat", "wingding", "cmsy", "msam", "msbm", "mt extra"]
            .iter()
            .any(|marker| lower.contains(marker))
    }
}

/// Immutable per-table input. Row clustering and the median word height are
/// computed once at construction.
#[derive(Debug, Clone)]
pub struct GeometryContext {
    region: BBox,
    page: u32,
    page_width: f64,
    page_height: f64,
    words: Vec<Word>,
    lines: Vec<LineSegment>,
    spans: Vec<StyledSpan>,
    rows: Vec<Vec<Word>>,
    median_height: f64,
}

impl GeometryContext {
    #[must_use]
    pub fn new(
        region: BBox,
        words: Vec<Word>,
        lines: Vec<LineSegment>,
        spans: Vec<StyledSpan>,
    ) -> Self {
        let rows = cluster_rows(&words);
        let median_height = median_word_height(&words);
        Self {
            region,
            page: 1,
            page_width: region.x1.max(0.0),
            page_height: region.y1.max(0.0),
            words,
            lines,
            spans,
            rows,
            median_height,
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: u32, width: f64, height: f64) -> Self {
        self.page = page;
        self.page_width = width;
        self.page_height = height;
        self
    }

    #[must_use]
    pub fn region(&self) -> BBox {
        self.region
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub fn page_size(&self) -> (f64, f64) {
        (self.page_width, self.page_height)
    }

    #[must_use]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    #[must_use]
    pub fn lines(&self) -> &[LineSegment] {
        &self.lines
    }

    #[must_use]
    pub fn spans(&self) -> &[StyledSpan] {
        &self.spans
    }

    /// Words grouped into visual rows, top to bottom, each row left to right.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Word>] {
        &self.rows
    }

    /// Median height of all words with positive height, or 0.0 without words.
    #[must_use]
    pub fn median_word_height(&self) -> f64 {
        self.median_height
    }

    /// Clustering tolerance used when several positions should collapse into
    /// one; never zero so that exact duplicates still merge.
    #[must_use]
    pub fn merge_tolerance(&self) -> f64 {
        if self.median_height > 0.0 {
            self.median_height * 0.5
        } else {
            1.0
        }
    }
}

pub(crate) fn median_word_height(words: &[Word]) -> f64 {
    let heights = words
        .iter()
        .map(Word::height)
        .filter(|height| *height > 0.0)
        .collect::<Vec<_>>();
    median(heights).unwrap_or(0.0)
}

pub(crate) fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some(f64::midpoint(values[mid - 1], values[mid]))
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{BBox, GeometryContext, LineSegment, Orientation, StyledSpan, Word, median};

    #[test]
    fn parses_bbox_from_comma_list() {
        let bbox = BBox::from_str("10, 20,120,220").expect("box should parse");
        assert_eq!(bbox, BBox::new(10.0, 20.0, 120.0, 220.0));
    }

    #[test]
    fn rejects_inverted_bbox() {
        let err = BBox::from_str("10,20,5,30").expect_err("inverted box should fail");
        assert!(err.contains("x1>x0"));
    }

    #[test]
    fn classifies_segment_orientation_within_angle() {
        let flat = LineSegment::new(0.0, 10.0, 100.0, 12.0);
        let upright = LineSegment::new(50.0, 0.0, 51.0, 80.0);
        let diagonal = LineSegment::new(0.0, 0.0, 50.0, 50.0);

        assert_eq!(flat.orientation(5.0), Some(Orientation::Horizontal));
        assert_eq!(upright.orientation(5.0), Some(Orientation::Vertical));
        assert_eq!(diagonal.orientation(5.0), None);
    }

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(Vec::new()), None);
    }

    #[test]
    fn context_precomputes_rows_and_median_height() {
        let words = vec![
            Word::new("b", 30.0, 0.0, 40.0, 10.0),
            Word::new("a", 0.0, 0.0, 20.0, 10.0),
            Word::new("c", 0.0, 20.0, 20.0, 32.0),
        ];
        let ctx = GeometryContext::new(BBox::new(0.0, 0.0, 100.0, 40.0), words, vec![], vec![]);

        assert_eq!(ctx.rows().len(), 2);
        assert_eq!(ctx.rows()[0][0].text, "a");
        assert!((ctx.median_word_height() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn detects_symbol_fonts_by_name() {
        let bbox = BBox::new(0.0, 0.0, 5.0, 5.0);
        assert!(StyledSpan::new("x", bbox, "ABCDEF+Symbol", 9.0).is_symbol_font());
        assert!(!StyledSpan::new("x", bbox, "Times-Roman", 9.0).is_symbol_font());
    }
}
