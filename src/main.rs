use anyhow::{anyhow, Context};
use clap::Parser;
use pawprint::{
    ColorName, FusionRanker, Lab, QueryFeatures, RankedCandidate, Rgb, RuleMode, SearchOptions,
    TraceLog,
};
use pawprint_storage::CatalogStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Rank catalog dog photos against a query photo's features
#[derive(Parser, Debug)]
#[command(name = "pawprint")]
#[command(about = "Multi-signal dog photo retrieval", long_about = None)]
struct Args {
    /// Catalog file (.json, .json.gz or .bin)
    #[arg(short, long)]
    catalog: PathBuf,

    /// Expected SHA-256 of the catalog file
    #[arg(long)]
    checksum: Option<String>,

    /// Query features as JSON: {"embedding": [...], "lab" or "rgb": [..3], "breed": ...}
    #[arg(short, long)]
    query: PathBuf,

    /// Search options as JSON; missing fields take defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Nearest neighbors to re-rank
    #[arg(short, long)]
    k: Option<usize>,

    /// Results to return
    #[arg(short, long)]
    limit: Option<usize>,

    #[arg(long)]
    image_weight: Option<f64>,

    #[arg(long)]
    color_weight: Option<f64>,

    #[arg(long)]
    breed_weight: Option<f64>,

    /// ΔE scale of the color similarity kernel
    #[arg(long)]
    sigma: Option<f64>,

    #[arg(long)]
    min_color_similarity: Option<f64>,

    #[arg(long)]
    max_delta_e: Option<f64>,

    /// Do not penalize breed mismatches
    #[arg(long)]
    no_breed_rule: bool,

    /// Drop candidates that fail a rule instead of penalizing them
    #[arg(long)]
    exclude: bool,

    /// Include the ranking trace in the output
    #[arg(long)]
    trace: bool,

    /// Write results here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Query file contents. Color may be given as Lab or as 8-bit RGB.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryFile {
    embedding: Vec<f32>,
    #[serde(default, alias = "labColor")]
    lab: Option<Lab>,
    #[serde(default)]
    rgb: Option<Rgb>,
    #[serde(default)]
    breed: Option<String>,
}

#[derive(Serialize)]
struct Output<'a> {
    results: &'a [RankedCandidate],
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<&'a TraceLog>,
}

fn read_query(path: &Path) -> anyhow::Result<QueryFeatures> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read query file '{}'", path.display()))?;
    let file: QueryFile = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse query file '{}'", path.display()))?;

    let lab = match (file.lab, file.rgb) {
        (Some(lab), _) => lab,
        (None, Some(rgb)) => {
            let channels: [u8; 3] = rgb.into();
            info!("Query color {:?} ({})", channels, ColorName::classify(rgb));
            rgb.to_lab()
        }
        (None, None) => return Err(anyhow!("Query file needs a \"lab\" or \"rgb\" color")),
    };
    Ok(QueryFeatures::new(file.embedding, lab, file.breed))
}

/// Defaults, then the `--config` file, then individual flags
fn search_options(args: &Args) -> anyhow::Result<SearchOptions> {
    let base = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse config file '{}'", path.display()))?
        }
        None => SearchOptions::default(),
    };
    let options = apply_overrides(base, args);
    options.validate().map_err(pawprint::Error::from)?;
    Ok(options)
}

fn apply_overrides(mut options: SearchOptions, args: &Args) -> SearchOptions {
    if let Some(k) = args.k {
        options.candidates = k;
    }
    if let Some(limit) = args.limit {
        options.limit = limit;
    }
    let weights = &mut options.weights;
    if let Some(w) = args.image_weight {
        weights.image_weight = w;
    }
    if let Some(w) = args.color_weight {
        weights.color_weight = w;
    }
    if let Some(w) = args.breed_weight {
        weights.breed_weight = w;
    }
    if let Some(sigma) = args.sigma {
        weights.sigma = sigma;
    }
    let rules = &mut options.rules;
    if let Some(min) = args.min_color_similarity {
        rules.min_color_similarity = min;
    }
    if let Some(max) = args.max_delta_e {
        rules.max_delta_e = max;
    }
    if args.no_breed_rule {
        rules.require_breed_match = false;
    }
    if args.exclude {
        rules.mode = RuleMode::Exclude;
    }
    options
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting pawprint v{}", env!("CARGO_PKG_VERSION"));
    info!("Catalog: {:?}", args.catalog);

    let options = search_options(&args)?;
    let store = CatalogStore::open(&args.catalog, args.checksum.as_deref())?;
    let query = read_query(&args.query)?;

    let ranker = FusionRanker::new(store.snapshot());
    let mut trace = TraceLog::new();
    let results = ranker.rank_traced(&query, &options, &mut trace)?;
    trace.summary();
    info!("Ranked {} of {} retrieved candidates", results.len(), trace.retrieved);

    let output = Output {
        results: &results,
        trace: args.trace.then_some(&trace),
    };
    let json = serde_json::to_string_pretty(&output)?;
    match &args.output {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write results to '{}'", path.display()))?;
            info!("Results written to {:?}", path);
        }
        None => println!("{}", json),
    }

    Ok(())
}
