//! Drives structure methods, combination, cell methods, the post-processor
//! cascade and selection for one table region.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::boundary::BoundaryHypothesis;
use crate::cell::{CellMethod, RegionTextMethod, SpanTextSource, WordAssignment};
use crate::combine::{
    CombinationStrategy, EXPAND_OVERLAP, GridScore, SelectionStrategy, WeightedHypothesis,
    expand_overlap, first_produced, rank_based,
};
use crate::error::{ConfigError, MethodError};
use crate::geometry::GeometryContext;
use crate::grid::CellGrid;
use crate::postprocess::{Postprocessor, run_cascade, standard_cascade};
use crate::structure::{HeaderAnchor, RuledLines, StreamFinder, StructureMethod, TableFinderMethod};
use crate::weights::Multipliers;

/// When a structure method is worth running for a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationRule {
    Always,
    RequiresLines,
    RequiresSpans,
}

impl ActivationRule {
    #[must_use]
    pub fn allows(self, ctx: &GeometryContext) -> bool {
        match self {
            Self::Always => true,
            Self::RequiresLines => !ctx.lines().is_empty(),
            Self::RequiresSpans => !ctx.spans().is_empty(),
        }
    }
}

/// Everything a [`Pipeline`] runs, in declaration order.
pub struct PipelineConfig {
    pub structure_methods: Vec<Box<dyn StructureMethod>>,
    pub cell_methods: Vec<Box<dyn CellMethod>>,
    pub postprocessors: Vec<Box<dyn Postprocessor>>,
    /// Structure methods absent from this map always run.
    pub activation: HashMap<String, ActivationRule>,
    pub combination: CombinationStrategy,
    pub selection: SelectionStrategy,
    /// Structure method name to multiplier; missing entries mean 1.0.
    pub confidence_multipliers: Multipliers,
}

impl PipelineConfig {
    /// The built-in method set.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            structure_methods: vec![
                Box::new(RuledLines::default()),
                Box::new(HeaderAnchor),
                Box::new(TableFinderMethod::new(StreamFinder)),
            ],
            cell_methods: vec![
                Box::new(WordAssignment),
                Box::new(RegionTextMethod::new(SpanTextSource)),
            ],
            postprocessors: standard_cascade(),
            activation: HashMap::from([("ruled_lines".to_string(), ActivationRule::RequiresLines)]),
            combination: CombinationStrategy::default(),
            selection: SelectionStrategy::default(),
            confidence_multipliers: Multipliers::new(),
        }
    }

    #[must_use]
    pub fn with_combination(mut self, combination: CombinationStrategy) -> Self {
        self.combination = combination;
        self
    }

    #[must_use]
    pub fn with_selection(mut self, selection: SelectionStrategy) -> Self {
        self.selection = selection;
        self
    }

    #[must_use]
    pub fn with_multipliers(mut self, multipliers: Multipliers) -> Self {
        self.confidence_multipliers = multipliers;
        self
    }
}

/// One structure x cell combination that produced a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Structure method name, or `expand_overlap` for a combined set.
    pub structure: String,
    pub cell: String,
    pub grid: CellGrid,
    /// Mean confidence of the boundaries the grid was built from.
    pub confidence: f64,
    pub boundary_summary: String,
    /// Cell extraction plus cascade time.
    pub elapsed: Duration,
}

impl Candidate {
    /// `structure+cell`, the name used by the evaluation store and tuner.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}+{}", self.structure, self.cell)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineResult {
    pub candidates: Vec<Candidate>,
    /// Index into `candidates`; `None` means nothing usable was extracted.
    pub winner: Option<usize>,
    pub method_errors: Vec<MethodError>,
}

impl PipelineResult {
    #[must_use]
    pub fn winning(&self) -> Option<&Candidate> {
        self.winner.and_then(|index| self.candidates.get(index))
    }

    #[must_use]
    pub fn winning_grid(&self) -> Option<&CellGrid> {
        self.winning().map(|candidate| &candidate.grid)
    }
}

/// A validated, ready-to-run configuration.
pub struct Pipeline {
    config: PipelineConfig,
    /// Multiplier per structure method, by declaration index.
    multipliers: Vec<f64>,
}

/// A boundary set handed to every cell method.
struct BoundarySet {
    structure: String,
    hypothesis: BoundaryHypothesis,
}

impl Pipeline {
    /// Validate `config` and resolve its multipliers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an empty structure or cell method list,
    /// duplicate method names, an activation rule naming an unknown method,
    /// or a negative or non-finite multiplier.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        if config.structure_methods.is_empty() {
            return Err(ConfigError::NoStructureMethods);
        }
        if config.cell_methods.is_empty() {
            return Err(ConfigError::NoCellMethods);
        }

        check_unique(config.structure_methods.iter().map(|method| method.name()))?;
        check_unique(config.cell_methods.iter().map(|method| method.name()))?;
        check_unique(config.postprocessors.iter().map(|stage| stage.name()))?;

        for name in config.activation.keys() {
            if !config
                .structure_methods
                .iter()
                .any(|method| method.name() == name)
            {
                return Err(ConfigError::UnknownMethod(name.clone()));
            }
        }
        for (method, value) in &config.confidence_multipliers {
            if !value.is_finite() || *value < 0.0 {
                return Err(ConfigError::InvalidMultiplier {
                    method: method.clone(),
                    value: *value,
                });
            }
        }

        let multipliers = config
            .structure_methods
            .iter()
            .map(|method| {
                config
                    .confidence_multipliers
                    .get(method.name())
                    .copied()
                    .unwrap_or(1.0)
            })
            .collect();

        Ok(Self {
            config,
            multipliers,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Resolved multiplier of the structure method at `index`.
    #[must_use]
    pub fn multiplier(&self, index: usize) -> Option<f64> {
        self.multipliers.get(index).copied()
    }

    /// Extract one table. Method faults and panics are recorded in
    /// `method_errors`; they never abort the table.
    #[must_use]
    pub fn extract(&self, ctx: &GeometryContext) -> PipelineResult {
        let mut result = PipelineResult::default();

        let mut hypotheses = Vec::new();
        for (order, method) in self.config.structure_methods.iter().enumerate() {
            let name = method.name();
            let active = self
                .config
                .activation
                .get(name)
                .is_none_or(|rule| rule.allows(ctx));
            if !active {
                debug!(method = name, "structure method not active for context");
                continue;
            }

            match guarded(name, || method.detect(ctx)) {
                Ok(Some(hypothesis)) if !hypothesis.is_empty() => {
                    debug!(method = name, boundaries = %hypothesis.summary(), "structure method proposed boundaries");
                    hypotheses.push((order, hypothesis));
                }
                Ok(_) => debug!(method = name, "structure method found no evidence"),
                Err(error) => {
                    warn!(%error, "structure method failed");
                    result.method_errors.push(error);
                }
            }
        }

        for set in self.boundary_sets(ctx, hypotheses) {
            let columns = set.hypothesis.column_positions();
            let rows = set.hypothesis.row_positions();
            let confidence = set.hypothesis.mean_confidence();
            let boundary_summary = set.hypothesis.summary();

            for method in &self.config.cell_methods {
                let name = method.name();
                let started = Instant::now();
                match guarded(name, || method.extract(ctx, &columns, &rows)) {
                    Ok(Some(grid)) => {
                        let grid = run_cascade(&self.config.postprocessors, grid, ctx);
                        if grid.is_empty() {
                            debug!(structure = %set.structure, cell = name, "grid empty after cascade");
                            continue;
                        }
                        result.candidates.push(Candidate {
                            structure: set.structure.clone(),
                            cell: name.to_string(),
                            grid,
                            confidence,
                            boundary_summary: boundary_summary.clone(),
                            elapsed: started.elapsed(),
                        });
                    }
                    Ok(None) => debug!(cell = name, "cell method found no text"),
                    Err(error) => {
                        warn!(%error, "cell method failed");
                        result.method_errors.push(error);
                    }
                }
            }
        }

        result.winner = self.select(&result.candidates);
        debug!(
            candidates = result.candidates.len(),
            winner = ?result.winning().map(Candidate::name),
            errors = result.method_errors.len(),
            "table extraction finished"
        );
        result
    }

    /// Extract many tables in parallel; results keep the input order.
    #[must_use]
    pub fn extract_many(&self, contexts: &[GeometryContext]) -> Vec<PipelineResult> {
        contexts.par_iter().map(|ctx| self.extract(ctx)).collect()
    }

    fn boundary_sets(
        &self,
        ctx: &GeometryContext,
        hypotheses: Vec<(usize, BoundaryHypothesis)>,
    ) -> Vec<BoundarySet> {
        if hypotheses.is_empty() {
            return Vec::new();
        }

        match self.config.combination {
            CombinationStrategy::ExpandOverlap => {
                let weighted = hypotheses
                    .iter()
                    .map(|(order, hypothesis)| WeightedHypothesis {
                        hypothesis,
                        multiplier: self.multipliers.get(*order).copied().unwrap_or(1.0),
                        order: *order,
                    })
                    .collect::<Vec<_>>();
                vec![BoundarySet {
                    structure: EXPAND_OVERLAP.to_string(),
                    hypothesis: expand_overlap(&weighted, ctx.merge_tolerance()),
                }]
            }
            CombinationStrategy::Independent => hypotheses
                .into_iter()
                .map(|(_, hypothesis)| BoundarySet {
                    structure: hypothesis.method.clone(),
                    hypothesis,
                })
                .collect(),
        }
    }

    fn select(&self, candidates: &[Candidate]) -> Option<usize> {
        match self.config.selection {
            SelectionStrategy::RankBased => rank_based(
                &candidates
                    .iter()
                    .map(|candidate| GridScore::of(&candidate.grid, candidate.confidence))
                    .collect::<Vec<_>>(),
            ),
            SelectionStrategy::FirstProduced => first_produced(
                &candidates
                    .iter()
                    .map(|candidate| &candidate.grid)
                    .collect::<Vec<_>>(),
            ),
        }
    }
}

fn check_unique<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateMethod(name.to_string()));
        }
    }
    Ok(())
}

/// Run a method, turning a panic into a [`MethodError`].
fn guarded<T>(
    name: &str,
    call: impl FnOnce() -> Result<Option<T>, MethodError>,
) -> Result<Option<T>, MethodError> {
    catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|payload| Err(MethodError::new(name, panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use pretty_assertions::assert_eq;

    use super::{ActivationRule, Pipeline, PipelineConfig};
    use crate::boundary::{BoundaryHypothesis, BoundaryPoint};
    use crate::combine::CombinationStrategy;
    use crate::error::{ConfigError, MethodError};
    use crate::geometry::{BBox, GeometryContext, Word};
    use crate::structure::StructureMethod;

    struct Fixed {
        name: &'static str,
        columns: Vec<f64>,
    }

    impl StructureMethod for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn detect(&self, _ctx: &GeometryContext) -> Result<Option<BoundaryHypothesis>, MethodError> {
            Ok(Some(BoundaryHypothesis::new(
                self.name,
                self.columns
                    .iter()
                    .map(|x| BoundaryPoint::new(*x, 0.9, self.name))
                    .collect(),
                vec![BoundaryPoint::new(15.0, 0.9, self.name)],
            )))
        }
    }

    struct Failing;

    impl StructureMethod for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn detect(&self, _ctx: &GeometryContext) -> Result<Option<BoundaryHypothesis>, MethodError> {
            Err(MethodError::new("failing", "external tool crashed"))
        }
    }

    struct Panicking;

    impl StructureMethod for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn detect(&self, _ctx: &GeometryContext) -> Result<Option<BoundaryHypothesis>, MethodError> {
            panic!("index out of range")
        }
    }

    fn table_ctx() -> GeometryContext {
        GeometryContext::new(
            BBox::new(0.0, 0.0, 200.0, 30.0),
            vec![
                Word::new("Name", 0.0, 0.0, 40.0, 10.0),
                Word::new("Age", 100.0, 0.0, 130.0, 10.0),
                Word::new("Alice", 0.0, 20.0, 45.0, 30.0),
                Word::new("30", 100.0, 20.0, 115.0, 30.0),
            ],
            vec![],
            vec![],
        )
    }

    fn config(methods: Vec<Box<dyn StructureMethod>>) -> PipelineConfig {
        PipelineConfig {
            structure_methods: methods,
            activation: HashMap::new(),
            ..PipelineConfig::standard()
        }
    }

    #[test]
    fn standard_pipeline_extracts_simple_table() {
        let pipeline = Pipeline::new(PipelineConfig::standard()).expect("standard config is valid");
        let result = pipeline.extract(&table_ctx());

        let grid = result.winning_grid().expect("a grid should win");
        assert_eq!(grid.headers(), ["Name", "Age"]);
        assert_eq!(grid.rows(), [vec!["Alice", "30"]]);
        assert!(result.method_errors.is_empty());
        assert!(
            result
                .candidates
                .iter()
                .all(|candidate| candidate.structure == "expand_overlap")
        );
    }

    #[test]
    fn faults_and_panics_are_recorded_not_raised() {
        let pipeline = Pipeline::new(config(vec![
            Box::new(Failing),
            Box::new(Panicking),
            Box::new(Fixed {
                name: "fixed",
                columns: vec![70.0],
            }),
        ]))
        .expect("config should be valid");
        let result = pipeline.extract(&table_ctx());

        assert_eq!(result.method_errors.len(), 2);
        assert_eq!(result.method_errors[0].method, "failing");
        assert_eq!(result.method_errors[1].method, "panicking");
        assert!(result.method_errors[1].message.contains("index out of range"));
        assert!(result.winning_grid().is_some());
    }

    #[test]
    fn total_failure_yields_no_winner() {
        let pipeline = Pipeline::new(config(vec![Box::new(Failing)])).expect("config should be valid");
        let result = pipeline.extract(&table_ctx());
        assert!(result.winner.is_none());
        assert!(result.candidates.is_empty());
        assert_eq!(result.method_errors.len(), 1);
    }

    #[test]
    fn independent_mode_names_candidates_by_structure() {
        let pipeline = Pipeline::new(
            config(vec![
                Box::new(Fixed {
                    name: "a",
                    columns: vec![70.0],
                }),
                Box::new(Fixed {
                    name: "b",
                    columns: vec![20.0],
                }),
            ])
            .with_combination(CombinationStrategy::Independent),
        )
        .expect("config should be valid");
        let result = pipeline.extract(&table_ctx());

        let names = result
            .candidates
            .iter()
            .map(super::Candidate::name)
            .collect::<Vec<_>>();
        assert!(names.contains(&"a+word_assign".to_string()));
        assert!(names.contains(&"b+word_assign".to_string()));
        assert_eq!(result.winning().map(|c| c.structure.as_str()), Some("a"));
    }

    #[test]
    fn rejects_invalid_configs() {
        let empty = config(vec![]);
        assert!(matches!(Pipeline::new(empty), Err(ConfigError::NoStructureMethods)));

        let duplicate = config(vec![
            Box::new(Fixed {
                name: "dup",
                columns: vec![],
            }),
            Box::new(Fixed {
                name: "dup",
                columns: vec![],
            }),
        ]);
        assert!(matches!(Pipeline::new(duplicate), Err(ConfigError::DuplicateMethod(name)) if name == "dup"));

        let negative = PipelineConfig::standard()
            .with_multipliers(BTreeMap::from([("header_anchor".to_string(), -1.0)]));
        assert!(matches!(
            Pipeline::new(negative),
            Err(ConfigError::InvalidMultiplier { .. })
        ));

        let mut unknown = PipelineConfig::standard();
        unknown
            .activation
            .insert("nope".to_string(), ActivationRule::Always);
        assert!(matches!(Pipeline::new(unknown), Err(ConfigError::UnknownMethod(_))));
    }

    #[test]
    fn resolves_multipliers_by_declaration_order() {
        let pipeline = Pipeline::new(
            PipelineConfig::standard()
                .with_multipliers(BTreeMap::from([("header_anchor".to_string(), 0.5)])),
        )
        .expect("config should be valid");
        assert_eq!(pipeline.multiplier(0), Some(1.0));
        assert_eq!(pipeline.multiplier(1), Some(0.5));
        assert_eq!(pipeline.multiplier(3), None);
    }

    #[test]
    fn batch_extraction_preserves_order() {
        let pipeline = Pipeline::new(PipelineConfig::standard()).expect("standard config is valid");
        let empty = GeometryContext::new(BBox::new(0.0, 0.0, 10.0, 10.0), vec![], vec![], vec![]);
        let results = pipeline.extract_many(&[table_ctx(), empty]);
        assert_eq!(results.len(), 2);
        assert!(results[0].winning_grid().is_some());
        assert!(results[1].winning_grid().is_none());
    }
}
