use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use neighbor_rec::datasets::{InputFormat, LoadOptions, MalformedPolicy, RatingStore};
use neighbor_rec::output::{CsvSink, JsonSink, OutputFormat, ResultSink, TextSink};
use neighbor_rec::pipeline::{Pipeline, PipelineConfig, RunSummary};
use neighbor_rec::recommenders::{Aggregation, DEFAULT_NEIGHBORS};

#[derive(Parser, Debug)]
#[command(
    name = "neighbor-rec",
    version,
    about = "Recommend a business to every user from their nearest neighbors"
)]
struct Args {
    /// Ratings file: JSON lines (Yelp reviews) or CSV with user_id,business_id,stars
    #[arg(value_name = "INPUT", env = "NEIGHBOR_REC_INPUT")]
    input: PathBuf,

    #[arg(
        long,
        value_enum,
        default_value_t = InputFormat::Auto,
        env = "NEIGHBOR_REC_INPUT_FORMAT"
    )]
    input_format: InputFormat,

    #[arg(
        long,
        value_enum,
        default_value_t = MalformedPolicy::Abort,
        env = "NEIGHBOR_REC_ON_MALFORMED"
    )]
    on_malformed: MalformedPolicy,

    /// Number of neighbors kept per user
    #[arg(
        short = 'k',
        long = "neighbors",
        default_value_t = DEFAULT_NEIGHBORS,
        env = "NEIGHBOR_REC_NEIGHBORS"
    )]
    k: usize,

    #[arg(
        long,
        value_enum,
        default_value_t = Aggregation::Sum,
        env = "NEIGHBOR_REC_AGGREGATION"
    )]
    aggregation: Aggregation,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text, env = "NEIGHBOR_REC_FORMAT")]
    format: OutputFormat,

    /// Output file (text, json) or directory (csv). Defaults to stdout, or ./output for csv
    #[arg(short, long, env = "NEIGHBOR_REC_OUTPUT")]
    output: Option<PathBuf>,

    /// Only compute these users (repeatable)
    #[arg(long = "user", value_name = "ID")]
    users: Vec<String>,

    /// Worker threads; 1 runs on the main thread
    #[arg(long, env = "NEIGHBOR_REC_JOBS")]
    jobs: Option<usize>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_sink(args: &Args) -> anyhow::Result<Box<dyn ResultSink>> {
    let writer = |path: &Option<PathBuf>| -> anyhow::Result<Box<dyn Write>> {
        Ok(match path {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("creating output file {}", path.display()))?;
                Box::new(BufWriter::new(file))
            }
            None => Box::new(BufWriter::new(io::stdout().lock())),
        })
    };

    Ok(match args.format {
        OutputFormat::Text => Box::new(TextSink::new(writer(&args.output)?)),
        OutputFormat::Json => Box::new(JsonSink::new(writer(&args.output)?)),
        OutputFormat::Csv => {
            let dir = args.output.clone().unwrap_or_else(|| PathBuf::from("output"));
            Box::new(CsvSink::create(&dir)?)
        }
    })
}

/// Load the ratings, then compute and write recommendations as `args` asks.
fn run(args: &Args) -> anyhow::Result<RunSummary> {
    let store = RatingStore::load(
        &args.input,
        LoadOptions {
            format: args.input_format,
            on_malformed: args.on_malformed,
        },
    )
    .with_context(|| format!("loading ratings from {}", args.input.display()))?;
    if store.is_empty() {
        warn!(path = %args.input.display(), "No ratings found");
    }

    let pipeline = Pipeline::new(
        &store,
        PipelineConfig {
            k: args.k,
            aggregation: args.aggregation,
            parallel: args.jobs != Some(1),
        },
    );

    let mut sink = open_sink(args)?;
    if args.users.is_empty() {
        pipeline.run(sink.as_mut())
    } else {
        let users: Vec<&str> = args.users.iter().map(String::as_str).collect();
        pipeline.run_users(&users, sink.as_mut())
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    if let Some(jobs) = args.jobs.filter(|&n| n > 1) {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("configuring worker threads")?;
    }

    let summary = run(&args)?;
    info!(
        users = summary.users,
        recommended = summary.recommended,
        skipped = summary.skipped,
        "Done"
    );
    Ok(())
}
