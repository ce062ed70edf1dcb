use serde::{Deserialize, Serialize};

/// One proposed cut position on either axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryPoint {
    pub position: f64,
    /// Range of raw evidence positions that collapsed into this point.
    pub evidence: (f64, f64),
    pub confidence: f64,
    pub method: String,
}

impl BoundaryPoint {
    /// Confidence is clamped into `[0, 1]`.
    #[must_use]
    pub fn new(position: f64, confidence: f64, method: impl Into<String>) -> Self {
        Self {
            position,
            evidence: (position, position),
            confidence: clamp_confidence(confidence),
            method: method.into(),
        }
    }

    #[must_use]
    pub fn with_evidence(mut self, min: f64, max: f64) -> Self {
        self.evidence = (min.min(max), min.max(max));
        self
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HypothesisMetadata {
    pub header_row_index: Option<usize>,
    pub multi_row_header: bool,
    pub notes: Vec<String>,
}

/// Interior column and row cuts proposed by one structure method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryHypothesis {
    pub method: String,
    pub columns: Vec<BoundaryPoint>,
    pub rows: Vec<BoundaryPoint>,
    pub metadata: HypothesisMetadata,
}

impl BoundaryHypothesis {
    /// Sorts both axes and drops points that do not strictly increase.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        columns: Vec<BoundaryPoint>,
        rows: Vec<BoundaryPoint>,
    ) -> Self {
        Self {
            method: method.into(),
            columns: strictly_increasing(columns),
            rows: strictly_increasing(rows),
            metadata: HypothesisMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: HypothesisMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    #[must_use]
    pub fn column_positions(&self) -> Vec<f64> {
        self.columns.iter().map(|point| point.position).collect()
    }

    #[must_use]
    pub fn row_positions(&self) -> Vec<f64> {
        self.rows.iter().map(|point| point.position).collect()
    }

    /// Mean confidence across every point, 0.0 when there are none.
    #[must_use]
    pub fn mean_confidence(&self) -> f64 {
        let all = self.columns.iter().chain(&self.rows).collect::<Vec<_>>();
        if all.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = all.len() as f64;
        all.iter().map(|point| point.confidence).sum::<f64>() / count
    }

    /// Compact human-readable summary used by the evaluation store.
    #[must_use]
    pub fn summary(&self) -> String {
        let fmt = |points: &[BoundaryPoint]| {
            points
                .iter()
                .map(|point| format!("{:.1}", point.position))
                .collect::<Vec<_>>()
                .join(",")
        };
        format!("cols=[{}] rows=[{}]", fmt(&self.columns), fmt(&self.rows))
    }
}

fn strictly_increasing(mut points: Vec<BoundaryPoint>) -> Vec<BoundaryPoint> {
    points.retain(|point| point.position.is_finite());
    points.sort_by(|left, right| left.position.total_cmp(&right.position));
    points.dedup_by(|next, kept| {
        if next.position <= kept.position {
            if next.confidence > kept.confidence {
                kept.confidence = next.confidence;
            }
            true
        } else {
            false
        }
    });
    points
}
