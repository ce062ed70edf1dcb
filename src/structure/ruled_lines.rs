use tracing::debug;

use super::StructureMethod;
use crate::boundary::{BoundaryHypothesis, BoundaryPoint};
use crate::error::MethodError;
use crate::geometry::{GeometryContext, Orientation};

const NAME: &str = "ruled_lines";
const DEFAULT_MAX_ANGLE_DEGREES: f64 = 5.0;
const FALLBACK_CLUSTER_DISTANCE: f64 = 2.0;

/// Boundaries from drawn table rules.
#[derive(Debug, Clone)]
pub struct RuledLines {
    max_angle_degrees: f64,
}

impl Default for RuledLines {
    fn default() -> Self {
        Self {
            max_angle_degrees: DEFAULT_MAX_ANGLE_DEGREES,
        }
    }
}

impl RuledLines {
    #[must_use]
    pub fn with_max_angle(max_angle_degrees: f64) -> Self {
        Self { max_angle_degrees }
    }
}

/// A rule clipped to the region: its cross-axis position and covered span.
#[derive(Debug, Clone, Copy)]
struct Rule {
    position: f64,
    start: f64,
    end: f64,
}

impl StructureMethod for RuledLines {
    fn name(&self) -> &str {
        NAME
    }

    fn detect(&self, ctx: &GeometryContext) -> Result<Option<BoundaryHypothesis>, MethodError> {
        if ctx.lines().is_empty() {
            return Ok(None);
        }

        let region = ctx.region();
        let distance = if ctx.median_word_height() > 0.0 {
            ctx.median_word_height()
        } else {
            FALLBACK_CLUSTER_DISTANCE
        };

        let mut horizontal = Vec::new();
        let mut vertical = Vec::new();
        for segment in ctx.lines() {
            match segment.orientation(self.max_angle_degrees) {
                Some(Orientation::Horizontal) => {
                    let position = f64::midpoint(segment.y0, segment.y1);
                    let start = segment.x0.min(segment.x1).max(region.x0);
                    let end = segment.x0.max(segment.x1).min(region.x1);
                    if position >= region.y0 - distance
                        && position <= region.y1 + distance
                        && end > start
                    {
                        horizontal.push(Rule { position, start, end });
                    }
                }
                Some(Orientation::Vertical) => {
                    let position = f64::midpoint(segment.x0, segment.x1);
                    let start = segment.y0.min(segment.y1).max(region.y0);
                    let end = segment.y0.max(segment.y1).min(region.y1);
                    if position >= region.x0 - distance
                        && position <= region.x1 + distance
                        && end > start
                    {
                        vertical.push(Rule { position, start, end });
                    }
                }
                None => {}
            }
        }

        let rows = boundaries_from_rules(
            horizontal,
            distance,
            (region.y0, region.y1),
            region.width(),
        );
        let columns = boundaries_from_rules(
            vertical,
            distance,
            (region.x0, region.x1),
            region.height(),
        );
        debug!(
            columns = columns.len(),
            rows = rows.len(),
            "ruled line boundaries detected"
        );

        if columns.is_empty() && rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(BoundaryHypothesis::new(NAME, columns, rows)))
    }
}

/// Collapse parallel rules lying within `distance` of each other and keep
/// the interior ones. Confidence is the share of the region span the
/// cluster's rules cover.
fn boundaries_from_rules(
    mut rules: Vec<Rule>,
    distance: f64,
    (low_edge, high_edge): (f64, f64),
    span: f64,
) -> Vec<BoundaryPoint> {
    if rules.is_empty() || span <= 0.0 {
        return Vec::new();
    }
    rules.sort_by(|left, right| left.position.total_cmp(&right.position));

    let mut clusters: Vec<Vec<Rule>> = Vec::new();
    for rule in rules {
        match clusters.last_mut() {
            Some(cluster)
                if cluster
                    .last()
                    .is_some_and(|last| rule.position - last.position <= distance) =>
            {
                cluster.push(rule);
            }
            _ => clusters.push(vec![rule]),
        }
    }

    clusters
        .iter()
        .filter_map(|cluster| {
            let total_length = cluster.iter().map(|rule| rule.end - rule.start).sum::<f64>();
            let position = cluster
                .iter()
                .map(|rule| rule.position * (rule.end - rule.start))
                .sum::<f64>()
                / total_length;
            if position <= low_edge + distance || position >= high_edge - distance {
                return None;
            }

            let coverage = covered_length(cluster) / span;
            let min = cluster.first().map_or(position, |rule| rule.position);
            let max = cluster.last().map_or(position, |rule| rule.position);
            Some(BoundaryPoint::new(position, coverage.min(1.0), NAME).with_evidence(min, max))
        })
        .collect()
}

fn covered_length(cluster: &[Rule]) -> f64 {
    let mut spans = cluster
        .iter()
        .map(|rule| (rule.start, rule.end))
        .collect::<Vec<_>>();
    spans.sort_by(|left, right| left.0.total_cmp(&right.0));

    let mut total = 0.0;
    let mut current: Option<(f64, f64)> = None;
    for (start, end) in spans {
        current = match current {
            Some((open_start, open_end)) if start <= open_end => {
                Some((open_start, open_end.max(end)))
            }
            Some((open_start, open_end)) => {
                total += open_end - open_start;
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((start, end)) = current {
        total += end - start;
    }
    total
}
