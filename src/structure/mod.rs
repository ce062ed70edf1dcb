//! Strategies that propose column and row cuts for a table region.

mod header_anchor;
mod ruled_lines;
mod table_finder;

pub use header_anchor::HeaderAnchor;
pub use ruled_lines::RuledLines;
pub use table_finder::{FoundTable, StreamFinder, TableFinder, TableFinderMethod};

use crate::boundary::BoundaryHypothesis;
use crate::error::MethodError;
use crate::geometry::{GeometryContext, Word};

/// A boundary detection strategy.
///
/// `Ok(None)` means the method found no usable evidence in this region;
/// `Err` is reserved for genuine faults.
pub trait StructureMethod: Send + Sync {
    fn name(&self) -> &str;

    fn detect(&self, ctx: &GeometryContext) -> Result<Option<BoundaryHypothesis>, MethodError>;
}

/// Horizontal extent of a run of words that sit close enough to read as one
/// phrase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Phrase {
    pub x0: f64,
    pub x1: f64,
}

/// Join words of one row into phrases; a gap narrower than
/// `max_gap` does not separate phrases.
pub(crate) fn phrases(row: &[Word], max_gap: f64) -> Vec<Phrase> {
    let mut out: Vec<Phrase> = Vec::new();
    for word in row {
        match out.last_mut() {
            Some(last) if word.bbox.x0 - last.x1 < max_gap => {
                last.x1 = last.x1.max(word.bbox.x1);
            }
            _ => out.push(Phrase {
                x0: word.bbox.x0,
                x1: word.bbox.x1,
            }),
        }
    }
    out
}

/// Minimum horizontal gap that separates two phrases in a row.
pub(crate) fn phrase_gap(ctx: &GeometryContext) -> f64 {
    ctx.median_word_height() * 0.4
}

#[cfg(test)]
mod tests {
    use super::{Phrase, phrases};
    use crate::geometry::Word;

    #[test]
    fn joins_tightly_spaced_words() {
        let row = vec![
            Word::new("Std", 0.0, 0.0, 15.0, 10.0),
            Word::new("Error", 17.0, 0.0, 40.0, 10.0),
            Word::new("N", 80.0, 0.0, 86.0, 10.0),
        ];
        assert_eq!(
            phrases(&row, 4.0),
            vec![Phrase { x0: 0.0, x1: 40.0 }, Phrase { x0: 80.0, x1: 86.0 }]
        );
    }
}
