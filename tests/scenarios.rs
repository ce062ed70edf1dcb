mod common;

use std::collections::HashMap;

use pretty_assertions::assert_eq;
use table_structure::boundary::BoundaryHypothesis;
use table_structure::cell::WordAssignment;
use table_structure::postprocess::{
    CaptionStrip, ContinuationMerge, FootnoteStrip, Postprocessor, Processed, run_cascade,
    standard_cascade,
};
use table_structure::structure::StructureMethod;
use table_structure::{
    BBox, CellGrid, CombinationStrategy, ConfigError, GeometryContext, MethodError, Pipeline,
    PipelineConfig, SelectionStrategy,
};

fn empty_ctx() -> GeometryContext {
    GeometryContext::new(BBox::new(0.0, 0.0, 100.0, 100.0), vec![], vec![], vec![])
}

fn processed(stage: &dyn Postprocessor, grid: &CellGrid) -> CellGrid {
    stage.process(grid, &empty_ctx()).into_grid(grid.clone())
}

#[test]
fn cascade_is_idempotent_on_a_messy_grid() {
    let grid = CellGrid::from_strs(
        &["Key", "Text", "Flag"],
        &[
            &["Table 2. Sample", "", ""],
            &["A", "long text", "C"],
            &["", "continued", ""],
            &["B", "short", "D"],
            &["Source: survey data.", "", ""],
        ],
    );
    let ctx = common::grid_context(&[&["Key", "Text", "Flag"]]);
    let stages = standard_cascade();

    let once = run_cascade(&stages, grid, &ctx);
    let twice = run_cascade(&stages, once.clone(), &ctx);
    assert_eq!(twice, once);
    assert_eq!(
        once.rows(),
        [vec!["A", "long text continued", "C"], vec!["B", "short", "D"]]
    );
}

#[test]
fn caption_row_is_stripped_and_headers_kept() {
    let grid = CellGrid::from_strs(
        &["A", "B", "C"],
        &[&["Table 1. Results", "", ""], &["1", "2", "3"]],
    );
    let result = processed(&CaptionStrip, &grid);
    assert_eq!(result.headers(), ["A", "B", "C"]);
    assert_eq!(result.rows(), [vec!["1", "2", "3"]]);
}

#[test]
fn continuation_row_is_merged_upward() {
    let grid = CellGrid::from_strs(
        &["Key", "Text", "Flag"],
        &[&["A", "long text", "C"], &["", "continued", ""]],
    );
    let result = processed(&ContinuationMerge, &grid);
    assert_eq!(result.rows(), [vec!["A", "long text continued", "C"]]);
}

#[test]
fn section_label_is_not_repeated_when_a_wrapped_row_merges() {
    let grid = CellGrid::from_strs(
        &["Group", "Item", "Value"],
        &[
            &["Panel A", "", ""],
            &["", "long item", "1"],
            &["", "wrapped", ""],
            &["", "other", "2"],
        ],
    );
    let ctx = common::grid_context(&[&["Group", "Item", "Value"]]);
    let result = run_cascade(&standard_cascade(), grid, &ctx);

    assert_eq!(
        result.rows(),
        [
            vec!["Panel A", "long item wrapped", "1"],
            vec!["Panel A", "other", "2"],
        ]
    );
}

#[test]
fn only_trailing_footnotes_are_removed() {
    let note = "Note: * p<0.05, standard errors in parentheses.";
    let trailing = CellGrid::from_strs(
        &["A", "B", "C"],
        &[&["1", "2", "3"], &["4", "5", "6"], &[note, "", ""]],
    );
    let result = processed(&FootnoteStrip, &trailing);
    assert_eq!(result.rows(), [vec!["1", "2", "3"], vec!["4", "5", "6"]]);

    let leading = CellGrid::from_strs(&["A", "B", "C"], &[&[note, "", ""], &["1", "2", "3"]]);
    assert_eq!(
        FootnoteStrip.process(&leading, &empty_ctx()),
        Processed::Unchanged
    );
}

struct Failing;

impl StructureMethod for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn detect(&self, _ctx: &GeometryContext) -> Result<Option<BoundaryHypothesis>, MethodError> {
        Err(MethodError::new("failing", "external finder crashed"))
    }
}

fn config(structure_methods: Vec<Box<dyn StructureMethod>>) -> PipelineConfig {
    PipelineConfig {
        structure_methods,
        cell_methods: vec![Box::new(WordAssignment)],
        postprocessors: standard_cascade(),
        activation: HashMap::new(),
        combination: CombinationStrategy::ExpandOverlap,
        selection: SelectionStrategy::RankBased,
        confidence_multipliers: table_structure::Multipliers::new(),
    }
}

#[test]
fn every_method_failing_is_a_total_failure_not_a_panic() {
    let pipeline = Pipeline::new(config(vec![Box::new(Failing)])).expect("config should be valid");
    let result = pipeline.extract(&common::grid_context(&[&["Name", "Age"], &["Alice", "30"]]));

    assert!(result.candidates.is_empty());
    assert!(result.winning_grid().is_none());
    assert_eq!(
        result.method_errors,
        vec![MethodError::new("failing", "external finder crashed")]
    );
}

#[test]
fn empty_method_list_is_rejected_at_construction() {
    assert!(matches!(
        Pipeline::new(config(Vec::new())),
        Err(ConfigError::NoStructureMethods)
    ));
}

#[test]
fn batch_extraction_keeps_input_order() {
    let pipeline = Pipeline::new(PipelineConfig::standard()).expect("config should be valid");
    let contexts = vec![
        common::grid_context(&[&["Name", "Age"], &["Alice", "30"]]),
        common::grid_context(&[&["City", "Pop"], &["Oslo", "700"]]),
    ];

    let results = pipeline.extract_many(&contexts);
    assert_eq!(results.len(), 2);
    let first = results[0].winning_grid().expect("first table should be extracted");
    let second = results[1].winning_grid().expect("second table should be extracted");
    assert_eq!(first.headers(), ["Name", "Age"]);
    assert_eq!(first.rows(), [vec!["Alice", "30"]]);
    assert_eq!(second.headers(), ["City", "Pop"]);
    assert_eq!(second.rows(), [vec!["Oslo", "700"]]);
}
