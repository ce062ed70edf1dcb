use tracing::debug;

use super::{Phrase, StructureMethod, phrase_gap, phrases};
use crate::boundary::{BoundaryHypothesis, BoundaryPoint, HypothesisMetadata};
use crate::error::MethodError;
use crate::geometry::GeometryContext;

const NAME: &str = "header_anchor";
const HEADER_CONFIDENCE: f64 = 0.9;
const CONFIRMED_HEADER_CONFIDENCE: f64 = 0.95;
const ROW_CONFIDENCE: f64 = 0.8;

/// Column cuts from the gaps of the row with the most gaps.
///
/// The topmost row with the largest gap count is taken as the header; a cut
/// is placed midway through each of its gaps. Row cuts are placed midway
/// between consecutive text rows.
#[derive(Debug, Clone, Default)]
pub struct HeaderAnchor;

impl StructureMethod for HeaderAnchor {
    fn name(&self) -> &str {
        NAME
    }

    fn detect(&self, ctx: &GeometryContext) -> Result<Option<BoundaryHypothesis>, MethodError> {
        let rows = ctx.rows();
        if rows.is_empty() {
            return Ok(None);
        }

        let max_gap = phrase_gap(ctx);
        let row_phrases = rows
            .iter()
            .map(|row| phrases(row, max_gap))
            .collect::<Vec<_>>();

        let gap_counts = row_phrases
            .iter()
            .map(|phrases| phrases.len().saturating_sub(1))
            .collect::<Vec<_>>();
        let most_gaps = gap_counts.iter().copied().max().unwrap_or(0);
        if most_gaps == 0 {
            return Ok(None);
        }
        let Some(header_index) = gap_counts.iter().position(|count| *count == most_gaps) else {
            return Ok(None);
        };

        let header = &row_phrases[header_index];
        let cuts = header
            .windows(2)
            .map(|pair| (pair[0].x1, pair[1].x0))
            .collect::<Vec<_>>();

        let confirmed = row_phrases
            .get(header_index + 1)
            .is_some_and(|next| confirms(&cuts, next));
        let confidence = if confirmed {
            CONFIRMED_HEADER_CONFIDENCE
        } else {
            HEADER_CONFIDENCE
        };

        let columns = cuts
            .iter()
            .map(|(left, right)| {
                BoundaryPoint::new(f64::midpoint(*left, *right), confidence, NAME)
                    .with_evidence(*left, *right)
            })
            .collect::<Vec<_>>();

        let row_cuts = rows
            .windows(2)
            .map(|pair| {
                let bottom = pair[0]
                    .iter()
                    .map(|word| word.bbox.y1)
                    .fold(f64::NEG_INFINITY, f64::max);
                let top = pair[1]
                    .iter()
                    .map(|word| word.bbox.y0)
                    .fold(f64::INFINITY, f64::min);
                BoundaryPoint::new(f64::midpoint(bottom, top), ROW_CONFIDENCE, NAME)
                    .with_evidence(bottom, top)
            })
            .collect::<Vec<_>>();

        debug!(
            header_index,
            confirmed,
            columns = columns.len(),
            "header anchor located"
        );

        let metadata = HypothesisMetadata {
            header_row_index: Some(header_index),
            multi_row_header: confirmed,
            notes: Vec::new(),
        };
        Ok(Some(
            BoundaryHypothesis::new(NAME, columns, row_cuts).with_metadata(metadata),
        ))
    }
}

/// The next row confirms the header when it has the same number of gaps and
/// each header cut falls inside the matching gap.
fn confirms(cuts: &[(f64, f64)], next: &[Phrase]) -> bool {
    if next.len() != cuts.len() + 1 {
        return false;
    }

    cuts.iter()
        .zip(next.windows(2))
        .all(|((left, right), pair)| {
            let cut = f64::midpoint(*left, *right);
            cut > pair[0].x1 && cut < pair[1].x0
        })
}
