//! Offline evaluation: score every candidate against a reference grid and
//! keep the history the weight tuner learns from.

use tracing::{info, warn};

use crate::combine::CombinationStrategy;
use crate::compare::{ComparisonResult, compare_grids};
use crate::error::{MethodError, StoreError};
use crate::geometry::GeometryContext;
use crate::grid::CellGrid;
use crate::pipeline::Pipeline;
use crate::store::{EvaluationStore, MethodResult};
use crate::tuner::compute_multipliers;
use crate::weights::{Multipliers, merge_multipliers};

/// Method label stored for a table where nothing was extracted.
const NO_WINNER: &str = "none";

#[derive(Debug, Clone, PartialEq)]
pub struct TableEvaluation {
    pub table_id: String,
    pub candidates: usize,
    /// `structure+cell` of the selected candidate.
    pub winner: Option<String>,
    /// Winner (or empty extraction) against the reference.
    pub comparison: ComparisonResult,
    pub method_errors: Vec<MethodError>,
}

/// Run `pipeline` on one table and record every candidate, scored by fuzzy
/// accuracy, plus the winner's diff.
///
/// Candidates are recorded per structure method only when the pipeline
/// runs in independent combination mode. Combined candidates are still
/// stored but the tuner ignores them.
///
/// # Errors
///
/// Returns [`StoreError`] when a record cannot be written.
pub fn evaluate_table(
    pipeline: &Pipeline,
    ctx: &GeometryContext,
    table_id: &str,
    ground_truth: &CellGrid,
    store: &EvaluationStore,
) -> Result<TableEvaluation, StoreError> {
    if pipeline.config().combination != CombinationStrategy::Independent {
        warn!(
            table_id,
            combination = %pipeline.config().combination,
            "combined candidates carry no per-method history for tuning"
        );
    }
    let result = pipeline.extract(ctx);

    for candidate in &result.candidates {
        let comparison = compare_grids(&candidate.grid, ground_truth);
        store.record_method_result(&MethodResult {
            table_id: table_id.to_string(),
            structure_method: candidate.structure.clone(),
            cell_method: candidate.cell.clone(),
            boundary_summary: candidate.boundary_summary.clone(),
            grid_summary: candidate.grid.summary(),
            quality_score: Some(comparison.fuzzy_accuracy),
            execution_ms: u64::try_from(candidate.elapsed.as_millis()).unwrap_or(u64::MAX),
        })?;
    }

    let winner = result.winning();
    let comparison = match winner {
        Some(candidate) => compare_grids(&candidate.grid, ground_truth),
        None => compare_grids(&CellGrid::new(Vec::new(), Vec::new()), ground_truth),
    };
    let winner_name = winner.map(crate::pipeline::Candidate::name);
    store.record_table_diff(
        table_id,
        winner_name.as_deref().unwrap_or(NO_WINNER),
        &comparison,
    )?;

    info!(
        table_id,
        candidates = result.candidates.len(),
        winner = winner_name.as_deref().unwrap_or(NO_WINNER),
        accuracy = comparison.cell_accuracy,
        fuzzy = comparison.fuzzy_accuracy,
        errors = result.method_errors.len(),
        "table evaluated"
    );

    Ok(TableEvaluation {
        table_id: table_id.to_string(),
        candidates: result.candidates.len(),
        winner: winner_name,
        comparison,
        method_errors: result.method_errors,
    })
}

/// Multipliers learned from the store's history, merged over `defaults`.
///
/// # Errors
///
/// Returns [`StoreError`] when the history cannot be read.
pub fn tune_from_store(
    store: &EvaluationStore,
    defaults: &Multipliers,
) -> Result<Multipliers, StoreError> {
    let learned = compute_multipliers(&store.method_scores()?);
    info!(methods = learned.len(), "computed multipliers from history");
    Ok(merge_multipliers(defaults, &learned))
}
