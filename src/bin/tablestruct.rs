use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use table_structure::cell::RegionTextMethod;
use table_structure::csv_out::{grid_to_csv_string, read_grid};
use table_structure::evaluate::{evaluate_table, tune_from_store};
use table_structure::weights::{load_multipliers, save_multipliers};
use table_structure::{
    CombinationStrategy, EvaluationStore, Multipliers, OutputFormat, PageLayout, PdfPageReader,
    Pipeline, PipelineConfig, PipelineResult, RegionSpec, SelectionStrategy, compare_grids,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "tablestruct",
    version,
    about = "Recognize table structure in PDF page regions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract the tables in one or more regions and print them.
    Extract(ExtractArgs),
    /// Compare an extracted CSV with a ground-truth CSV and print the result as JSON.
    Compare(CompareArgs),
    /// Score one region against ground truth and record it in an evaluation store.
    Evaluate(EvaluateArgs),
    /// Learn confidence multipliers from an evaluation store.
    Tune(TuneArgs),
}

#[derive(Debug, Args)]
struct ExtractArgs {
    /// Input PDF path.
    #[arg(short, long)]
    pdf: PathBuf,

    /// Table region in format page:x0,y0,x1,y1 (top-left origin). Repeatable.
    #[arg(long = "region", required = true)]
    regions: Vec<String>,

    /// JSON file mapping structure method names to confidence multipliers.
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Output format: csv or markdown.
    #[arg(long, default_value = "csv")]
    format: String,

    /// Output delimiter character for csv.
    #[arg(long, default_value = ",")]
    delimiter: char,

    /// Combination strategy: expand_overlap or independent.
    #[arg(long, default_value = "expand_overlap")]
    combination: String,

    /// Selection strategy: rank_based or first_produced.
    #[arg(long, default_value = "rank_based")]
    selection: String,
}

#[derive(Debug, Args)]
struct CompareArgs {
    /// CSV produced by extraction; the first record is the header row.
    #[arg(long)]
    extracted: PathBuf,

    /// Ground-truth CSV; the first record is the header row.
    #[arg(long)]
    truth: PathBuf,

    /// Delimiter character of both files.
    #[arg(long, default_value = ",")]
    delimiter: char,
}

#[derive(Debug, Args)]
struct EvaluateArgs {
    /// Input PDF path.
    #[arg(short, long)]
    pdf: PathBuf,

    /// Table region in format page:x0,y0,x1,y1 (top-left origin).
    #[arg(long)]
    region: String,

    /// Ground-truth CSV; the first record is the header row.
    #[arg(long)]
    truth: PathBuf,

    /// SQLite evaluation store, created if missing.
    #[arg(long)]
    store: PathBuf,

    /// Identifier recorded for the table. Defaults to `<pdf name>:<region>`.
    #[arg(long)]
    table_id: Option<String>,

    /// Delimiter character of the ground-truth file.
    #[arg(long, default_value = ",")]
    delimiter: char,
}

#[derive(Debug, Args)]
struct TuneArgs {
    /// SQLite evaluation store.
    #[arg(long)]
    store: PathBuf,

    /// Where to write the learned multipliers.
    #[arg(short, long)]
    output: PathBuf,

    /// Multipliers to keep for methods the store has no history for.
    #[arg(long)]
    defaults: Option<PathBuf>,
}

fn ascii_delimiter(delimiter: char) -> Result<u8> {
    if !delimiter.is_ascii() {
        anyhow::bail!("delimiter must be a single ASCII character");
    }
    Ok(delimiter as u8)
}

fn parse_region(value: &str) -> Result<RegionSpec> {
    RegionSpec::from_str(value)
        .map_err(|error| anyhow!("invalid region: {error}"))
        .with_context(|| format!("failed to parse --region '{value}'"))
}

fn build_pipeline(
    layout: &PageLayout,
    config: impl FnOnce() -> PipelineConfig,
) -> Result<Pipeline> {
    let mut config = config();
    config
        .cell_methods
        .push(Box::new(RegionTextMethod::new(layout.region_source())));
    Pipeline::new(config).context("invalid pipeline configuration")
}

/// Rendered tables in region order; `None` where nothing was extracted.
fn run_extract(args: &ExtractArgs) -> Result<Vec<Option<String>>> {
    let format = OutputFormat::from_str(&args.format)
        .map_err(|error| anyhow!(error))
        .context("failed to parse --format")?;
    let combination = CombinationStrategy::from_str(&args.combination)
        .map_err(|error| anyhow!(error))
        .context("failed to parse --combination")?;
    let selection = SelectionStrategy::from_str(&args.selection)
        .map_err(|error| anyhow!(error))
        .context("failed to parse --selection")?;
    let delimiter = ascii_delimiter(args.delimiter)?;
    let regions = args
        .regions
        .iter()
        .map(|value| parse_region(value))
        .collect::<Result<Vec<_>>>()?;
    let multipliers = match &args.weights {
        Some(path) => load_multipliers(path)
            .with_context(|| format!("failed to read weights '{}'", path.display()))?,
        None => Multipliers::new(),
    };

    let reader = PdfPageReader::open(&args.pdf)
        .with_context(|| format!("failed to open '{}'", args.pdf.display()))?;

    let mut by_page: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (index, region) in regions.iter().enumerate() {
        by_page.entry(region.page).or_default().push(index);
    }

    let mut results: Vec<Option<PipelineResult>> = vec![None; regions.len()];
    for (page, indices) in by_page {
        let layout = reader
            .layout(page)
            .with_context(|| format!("failed to read page {page}"))?;
        let contexts = indices
            .iter()
            .map(|index| layout.context(regions[*index].bbox))
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("failed to build regions on page {page}"))?;
        let pipeline = build_pipeline(&layout, || {
            PipelineConfig::standard()
                .with_combination(combination)
                .with_selection(selection)
                .with_multipliers(multipliers.clone())
        })?;
        for (index, result) in indices.into_iter().zip(pipeline.extract_many(&contexts)) {
            results[index] = Some(result);
        }
    }

    results
        .iter()
        .zip(&args.regions)
        .map(|(result, region)| -> Result<Option<String>> {
            let Some(grid) = result.as_ref().and_then(PipelineResult::winning_grid) else {
                warn!(region = %region, "no table extracted");
                return Ok(None);
            };
            let rendered = match format {
                OutputFormat::Csv => grid_to_csv_string(grid, delimiter)
                    .with_context(|| format!("failed to render region '{region}'"))?,
                OutputFormat::Markdown => grid.to_markdown(),
            };
            Ok(Some(rendered))
        })
        .collect()
}

fn run_compare(args: &CompareArgs) -> Result<String> {
    let delimiter = ascii_delimiter(args.delimiter)?;
    let extracted = read_grid(&args.extracted, delimiter)
        .with_context(|| format!("failed to read '{}'", args.extracted.display()))?;
    let truth = read_grid(&args.truth, delimiter)
        .with_context(|| format!("failed to read '{}'", args.truth.display()))?;
    let comparison = compare_grids(&extracted, &truth);
    serde_json::to_string_pretty(&comparison).context("failed to encode comparison")
}

/// Comparison JSON, and whether the pipeline selected a winner.
fn run_evaluate(args: &EvaluateArgs) -> Result<(String, bool)> {
    let region = parse_region(&args.region)?;
    let delimiter = ascii_delimiter(args.delimiter)?;
    let truth = read_grid(&args.truth, delimiter)
        .with_context(|| format!("failed to read '{}'", args.truth.display()))?;
    let reader = PdfPageReader::open(&args.pdf)
        .with_context(|| format!("failed to open '{}'", args.pdf.display()))?;
    let layout = reader
        .layout(region.page)
        .with_context(|| format!("failed to read page {}", region.page))?;
    let ctx = layout
        .context(region.bbox)
        .with_context(|| format!("failed to build region '{}'", args.region))?;
    let pipeline = build_pipeline(&layout, || {
        PipelineConfig::standard().with_combination(CombinationStrategy::Independent)
    })?;
    let store = EvaluationStore::open(&args.store)
        .with_context(|| format!("failed to open store '{}'", args.store.display()))?;

    let table_id = args.table_id.clone().unwrap_or_else(|| {
        let name = args
            .pdf
            .file_name()
            .map_or_else(String::new, |name| name.to_string_lossy().into_owned());
        format!("{name}:{}", args.region)
    });
    let evaluation = evaluate_table(&pipeline, &ctx, &table_id, &truth, &store)
        .context("failed to record evaluation")?;
    let json =
        serde_json::to_string_pretty(&evaluation.comparison).context("failed to encode comparison")?;
    Ok((json, evaluation.winner.is_some()))
}

fn run_tune(args: &TuneArgs) -> Result<Multipliers> {
    let defaults = match &args.defaults {
        Some(path) => load_multipliers(path)
            .with_context(|| format!("failed to read defaults '{}'", path.display()))?,
        None => Multipliers::new(),
    };
    let store = EvaluationStore::open(&args.store)
        .with_context(|| format!("failed to open store '{}'", args.store.display()))?;
    let multipliers = tune_from_store(&store, &defaults).context("failed to read history")?;
    save_multipliers(&args.output, &multipliers)
        .with_context(|| format!("failed to write '{}'", args.output.display()))?;
    Ok(multipliers)
}

fn report_error(error: &anyhow::Error) -> ExitCode {
    eprintln!("error: {error:#}");
    ExitCode::from(1)
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("table_structure=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Extract(args) => match run_extract(&args) {
            Ok(tables) => {
                let missing = tables.iter().filter(|table| table.is_none()).count();
                let rendered = tables.into_iter().flatten().collect::<Vec<_>>();
                print!("{}", rendered.join("\n"));
                if missing == 0 {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(2)
                }
            }
            Err(error) => report_error(&error),
        },
        Commands::Compare(args) => match run_compare(&args) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(error) => report_error(&error),
        },
        Commands::Evaluate(args) => match run_evaluate(&args) {
            Ok((json, has_winner)) => {
                println!("{json}");
                if has_winner {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(2)
                }
            }
            Err(error) => report_error(&error),
        },
        Commands::Tune(args) => match run_tune(&args) {
            Ok(multipliers) => {
                eprintln!(
                    "wrote {} multiplier(s) to {}",
                    multipliers.len(),
                    args.output.display()
                );
                ExitCode::SUCCESS
            }
            Err(error) => report_error(&error),
        },
    }
}
