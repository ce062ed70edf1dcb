//! Reconciling boundary hypotheses and choosing among candidate grids.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::boundary::{BoundaryHypothesis, BoundaryPoint};
use crate::grid::CellGrid;

/// Label of the hypothesis produced by [`expand_overlap`].
pub const EXPAND_OVERLAP: &str = "expand_overlap";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombinationStrategy {
    /// Pool every hypothesis into one shared boundary set.
    #[default]
    ExpandOverlap,
    /// Run every hypothesis on its own; candidates are named
    /// `structure+cell`.
    Independent,
}

impl fmt::Display for CombinationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ExpandOverlap => EXPAND_OVERLAP,
            Self::Independent => "independent",
        })
    }
}

impl FromStr for CombinationStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "expand_overlap" => Ok(Self::ExpandOverlap),
            "independent" => Ok(Self::Independent),
            other => Err(format!("unknown combination strategy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrategy {
    #[default]
    RankBased,
    /// The first non-empty candidate in declaration order.
    FirstProduced,
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RankBased => "rank_based",
            Self::FirstProduced => "first_produced",
        })
    }
}

impl FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rank_based" => Ok(Self::RankBased),
            "first_produced" => Ok(Self::FirstProduced),
            other => Err(format!("unknown selection strategy: {other}")),
        }
    }
}

/// A hypothesis together with its method's multiplier and declaration index.
#[derive(Debug, Clone, Copy)]
pub struct WeightedHypothesis<'a> {
    pub hypothesis: &'a BoundaryHypothesis,
    pub multiplier: f64,
    pub order: usize,
}

struct Pooled<'a> {
    point: &'a BoundaryPoint,
    weight: f64,
    order: usize,
}

/// Merge hypotheses axis by axis.
///
/// Points closer than `tolerance` are single-link clustered; each cluster
/// collapses onto its highest-weighted point, where weight is
/// `confidence * multiplier` and ties go to the earlier-declared method.
#[must_use]
pub fn expand_overlap(hypotheses: &[WeightedHypothesis<'_>], tolerance: f64) -> BoundaryHypothesis {
    let columns = merge_axis(
        hypotheses
            .iter()
            .flat_map(|weighted| pool(weighted, &weighted.hypothesis.columns)),
        tolerance,
    );
    let rows = merge_axis(
        hypotheses
            .iter()
            .flat_map(|weighted| pool(weighted, &weighted.hypothesis.rows)),
        tolerance,
    );
    debug!(
        inputs = hypotheses.len(),
        columns = columns.len(),
        rows = rows.len(),
        "combined boundary hypotheses"
    );
    BoundaryHypothesis::new(EXPAND_OVERLAP, columns, rows)
}

fn pool<'a>(
    weighted: &WeightedHypothesis<'a>,
    points: &'a [BoundaryPoint],
) -> impl Iterator<Item = Pooled<'a>> {
    let multiplier = weighted.multiplier;
    let order = weighted.order;
    points.iter().map(move |point| Pooled {
        point,
        weight: point.confidence * multiplier,
        order,
    })
}

fn merge_axis<'a>(points: impl Iterator<Item = Pooled<'a>>, tolerance: f64) -> Vec<BoundaryPoint> {
    let mut points = points.collect::<Vec<_>>();
    points.sort_by(|left, right| {
        left.point
            .position
            .total_cmp(&right.point.position)
            .then(left.order.cmp(&right.order))
    });

    let mut clusters: Vec<Vec<Pooled<'a>>> = Vec::new();
    for pooled in points {
        match clusters.last_mut() {
            Some(cluster)
                if cluster.last().is_some_and(|last| {
                    pooled.point.position - last.point.position <= tolerance
                }) =>
            {
                cluster.push(pooled);
            }
            _ => clusters.push(vec![pooled]),
        }
    }

    clusters
        .into_iter()
        .filter_map(|cluster| {
            let min = cluster.first().map(|pooled| pooled.point.position)?;
            let max = cluster.last().map(|pooled| pooled.point.position)?;
            let best = cluster.into_iter().reduce(|best, next| {
                match next.weight.total_cmp(&best.weight) {
                    Ordering::Greater => next,
                    Ordering::Equal if next.order < best.order => next,
                    _ => best,
                }
            })?;
            Some(best.point.clone().with_evidence(min, max))
        })
        .collect()
}

/// Quality signals of one candidate grid, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridScore {
    pub fill_rate: f64,
    pub regularity: f64,
    pub confidence: f64,
}

impl GridScore {
    #[must_use]
    pub fn of(grid: &CellGrid, confidence: f64) -> Self {
        Self {
            fill_rate: grid.fill_rate(),
            regularity: grid.regularity(),
            confidence,
        }
    }
}

/// Index of the best candidate: highest fill rate, then regularity, then
/// structure confidence; remaining ties go to the earliest candidate.
#[must_use]
pub fn rank_based(scores: &[GridScore]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .min_by(|(left_index, left), (right_index, right)| {
            right
                .fill_rate
                .total_cmp(&left.fill_rate)
                .then(right.regularity.total_cmp(&left.regularity))
                .then(right.confidence.total_cmp(&left.confidence))
                .then(left_index.cmp(right_index))
        })
        .map(|(index, _)| index)
}

/// Index of the first candidate with any text.
#[must_use]
pub fn first_produced(grids: &[&CellGrid]) -> Option<usize> {
    grids.iter().position(|grid| !grid.is_empty())
}
