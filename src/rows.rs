use std::collections::BTreeSet;

use crate::geometry::{Word, median_word_height};

const FALLBACK_HEIGHT_FACTOR: f64 = 0.3;
const GAP_BREAK_RATIO: f64 = 2.0;

/// Vertical tolerance separating "same row" from "next row".
///
/// Looks for the first jump in the sorted gaps between distinct word
/// midpoints; the gap just below that jump is the largest intra-row spread.
#[must_use]
pub fn adaptive_tolerance(words: &[Word]) -> f64 {
    let fallback = median_word_height(words) * FALLBACK_HEIGHT_FACTOR;

    #[allow(clippy::cast_possible_truncation)]
    let midpoints = words
        .iter()
        .map(|word| (word.mid_y() * 10.0).round() as i64)
        .collect::<BTreeSet<_>>();
    if midpoints.len() < 3 {
        return fallback;
    }

    #[allow(clippy::cast_precision_loss)]
    let mut gaps = midpoints
        .iter()
        .zip(midpoints.iter().skip(1))
        .map(|(upper, lower)| (lower - upper) as f64 / 10.0)
        .filter(|gap| *gap > 0.0)
        .collect::<Vec<_>>();
    gaps.sort_by(f64::total_cmp);

    gaps.windows(2)
        .find(|pair| pair[1] / pair[0] > GAP_BREAK_RATIO)
        .map_or(fallback, |pair| pair[0])
}

/// Group words into visual rows.
///
/// A new row starts whenever a word's midpoint is further than the tolerance
/// from the midpoint of the first word of the current row. The result does
/// not depend on the order of `words`.
#[must_use]
pub fn cluster_rows(words: &[Word]) -> Vec<Vec<Word>> {
    if words.is_empty() {
        return Vec::new();
    }

    let tolerance = adaptive_tolerance(words);
    let mut sorted = words.iter().collect::<Vec<_>>();
    sorted.sort_by(|left, right| {
        left.mid_y()
            .total_cmp(&right.mid_y())
            .then_with(|| left.reading_cmp(right))
    });

    let mut rows: Vec<Vec<Word>> = Vec::new();
    let mut current: Vec<Word> = Vec::new();
    let mut reference = sorted[0].mid_y();

    for word in sorted {
        if !current.is_empty() && (word.mid_y() - reference).abs() > tolerance {
            rows.push(std::mem::take(&mut current));
        }
        if current.is_empty() {
            reference = word.mid_y();
        }
        current.push(word.clone());
    }
    rows.push(current);

    for row in &mut rows {
        row.sort_by(Word::reading_cmp);
    }
    rows
}
