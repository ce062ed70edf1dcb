//! Table structure recognition for document page regions.
//!
//! Several structure methods propose column and row boundaries for a region,
//! their proposals are combined, cell methods turn the boundaries into text
//! grids, a cascade of post-processors repairs common extraction defects, and
//! the best grid is selected. Offline, grids are compared against ground
//! truth and the per-method confidence multipliers are tuned from the
//! results.

pub mod boundary;
pub mod cell;
pub mod combine;
pub mod compare;
pub mod csv_out;
pub mod error;
pub mod evaluate;
pub mod geometry;
pub mod grid;
pub mod options;
pub mod pdf_reader;
pub mod pipeline;
pub mod postprocess;
pub mod rows;
pub mod store;
pub mod structure;
pub mod tuner;
pub mod weights;

pub use boundary::{BoundaryHypothesis, BoundaryPoint, HypothesisMetadata};
pub use combine::{CombinationStrategy, SelectionStrategy};
pub use compare::{ComparisonResult, compare, compare_grids};
pub use error::{ConfigError, ExportError, MethodError, ReaderError, StoreError, WeightsError};
pub use geometry::{BBox, GeometryContext, LineSegment, StyledSpan, Word};
pub use grid::{CellGrid, TableOutput};
pub use options::{OutputFormat, RegionSpec};
pub use pdf_reader::{PageLayout, PdfPageReader, PdfRegionSource};
pub use pipeline::{ActivationRule, Candidate, Pipeline, PipelineConfig, PipelineResult};
pub use store::EvaluationStore;
pub use weights::Multipliers;
