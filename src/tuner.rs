//! Derives confidence multipliers from historical per-method quality scores.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::combine::EXPAND_OVERLAP;
use crate::weights::Multipliers;

/// Multiplier for a structure method that never won.
pub const FLOOR_MULTIPLIER: f64 = 0.1;

/// One historical candidate score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRecord {
    pub table_id: String,
    /// `structure+cell`.
    pub method: String,
    /// `None` when the combination produced nothing scoreable.
    pub quality_score: Option<f64>,
}

impl MethodRecord {
    #[must_use]
    pub fn new(
        table_id: impl Into<String>,
        method: impl Into<String>,
        quality_score: Option<f64>,
    ) -> Self {
        Self {
            table_id: table_id.into(),
            method: method.into(),
            quality_score,
        }
    }
}

/// Structure half of a `structure+cell` method name.
#[must_use]
pub fn structure_component(method: &str) -> &str {
    method.split_once('+').map_or(method, |(structure, _)| structure)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinCount {
    pub wins: usize,
    /// Tables in which the method appeared in any combination.
    pub tables: usize,
}

impl WinCount {
    #[must_use]
    pub fn rate(self) -> f64 {
        if self.tables == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.wins as f64 / self.tables as f64;
        rate
    }
}

/// Wins and participations per structure method. Candidates built from the
/// merged `expand_overlap` boundary set belong to no single structure method
/// and are skipped.
#[must_use]
pub fn win_counts(records: &[MethodRecord]) -> BTreeMap<String, WinCount> {
    let mut by_table: BTreeMap<&str, Vec<&MethodRecord>> = BTreeMap::new();
    for record in records
        .iter()
        .filter(|record| structure_component(&record.method) != EXPAND_OVERLAP)
    {
        by_table.entry(record.table_id.as_str()).or_default().push(record);
    }

    let mut counts: BTreeMap<String, WinCount> = BTreeMap::new();
    for (table_id, table_records) in by_table {
        let participants = table_records
            .iter()
            .map(|record| structure_component(&record.method))
            .collect::<BTreeSet<_>>();
        for structure in participants {
            counts.entry(structure.to_string()).or_default().tables += 1;
        }

        let best = table_records
            .iter()
            .filter_map(|record| {
                record
                    .quality_score
                    .filter(|score| score.is_finite())
                    .map(|score| (score, *record))
            })
            .reduce(|best, next| if next.0 > best.0 { next } else { best });
        if let Some((score, record)) = best {
            let structure = structure_component(&record.method);
            debug!(table_id, method = %record.method, score, "table winner");
            counts.entry(structure.to_string()).or_default().wins += 1;
        }
    }
    counts
}

/// Multipliers proportional to win rate, the best method at 1.0 and
/// methods without wins at [`FLOOR_MULTIPLIER`].
#[must_use]
pub fn compute_multipliers(records: &[MethodRecord]) -> Multipliers {
    let counts = win_counts(records);
    let best_rate = counts
        .values()
        .map(|count| count.rate())
        .fold(0.0_f64, f64::max);

    counts
        .into_iter()
        .map(|(method, count)| {
            let rate = count.rate();
            let multiplier = if best_rate <= 0.0 || rate <= 0.0 {
                FLOOR_MULTIPLIER
            } else {
                rate / best_rate
            };
            (method, multiplier)
        })
        .collect()
}
