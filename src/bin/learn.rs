//! CLI binary: parses the flag table, reads a dataset, drives a [`bnstruct::learner::Learner`]
//! run, and writes either a neighborhood line or a Graphviz DOT network to stdout/`--output`.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use bnstruct::config::{Algorithm, LearnerConfig};
use bnstruct::data::Dataset;
use bnstruct::error::LearnError;
use bnstruct::learner::{Learner, NeighborhoodKind};
use bnstruct::reader::{DatasetReader, DelimitedTextReader, ReaderLayout};
use bnstruct::writer::{format_dot, format_neighborhood};

/// Constraint-based Bayesian network structure learning over discrete data.
#[derive(Parser, Debug)]
#[command(name = "learn", about = "Learn a Bayesian network skeleton (and optionally its orientation) from discrete data")]
struct Cli {
    /// Variable count.
    #[arg(long)]
    nvars: usize,

    /// Observation count.
    #[arg(long)]
    nobs: usize,

    /// Dataset path.
    #[arg(long)]
    file: PathBuf,

    /// One of gs, iamb, inter.iamb, mmpc, hiton, si.hiton.pc, getpc, pc.stable, pc.stable.2.
    #[arg(long, default_value = "gs")]
    algorithm: String,

    /// Independence threshold.
    #[arg(long, default_value_t = 0.05)]
    alpha: f64,

    /// Compute only this variable's neighborhood.
    #[arg(long)]
    target: Option<String>,

    /// Output mode: a single target's Markov blanket.
    #[arg(long, conflicts_with = "learn_network")]
    discover_mb: bool,

    /// Output mode: the full network (default).
    #[arg(long)]
    learn_network: bool,

    /// Orient the skeleton.
    #[arg(long)]
    direct_edges: bool,

    /// Graphviz DOT output path; stdout if omitted.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Rows are variables rather than observations.
    #[arg(long)]
    col_obs: bool,

    /// First row of the dataset file carries variable names.
    #[arg(long)]
    var_names: bool,

    /// First column of the dataset file carries row indices to discard.
    #[arg(long)]
    obs_indices: bool,

    /// Field separator.
    #[arg(long, default_value_t = ' ')]
    separator: char,

    /// Workers each read a contiguous row stripe (reader layer only; the learner's own
    /// parallelism is controlled independently, see `--imbalance`/`workers` in library use).
    #[arg(long)]
    parallel_read: bool,

    /// Threshold for imbalance-triggered redistribution in distributed runs.
    #[arg(long)]
    imbalance: Option<f64>,

    /// Cap on |S| for every CI test and subset search.
    #[arg(long)]
    max_conditioning: Option<usize>,

    /// off/error/info/debug/trace.
    #[arg(long, default_value = "error")]
    log_level: String,
}

fn parse_log_level(level: &str) -> Result<LevelFilter, LearnError> {
    match level {
        "off" => Ok(LevelFilter::Off),
        "error" => Ok(LevelFilter::Error),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        other => Err(LearnError::Configuration(format!("unknown log level {other:?}"))),
    }
}

fn run(cli: Cli) -> Result<(), LearnError> {
    let level = parse_log_level(&cli.log_level)?;
    env_logger::Builder::new().filter_level(level).init();

    let algorithm = Algorithm::parse(&cli.algorithm)
        .ok_or_else(|| LearnError::Configuration(format!("unknown algorithm {:?}", cli.algorithm)))?;

    let layout = ReaderLayout {
        separator: cli.separator,
        var_names: cli.var_names,
        obs_indices: cli.obs_indices,
        col_obs: cli.col_obs,
    };
    // `--parallel-read` (workers each read a stripe, then broadcast/all-gather to form a
    // replicated dataset) degenerates to a single-pass read here: there is only one OS process
    // in this binary, so the replicated-dataset result is identical either way.
    let reader = DelimitedTextReader::new(layout);
    let (raw, names) = reader.read(&cli.file, cli.nvars, cli.nobs)?;
    let dataset = Dataset::from_raw_columns(raw, names)?;

    let config = {
        let mut c = LearnerConfig::new(
            algorithm,
            cli.alpha,
            cli.max_conditioning,
            dataset.n(),
            cli.direct_edges,
            1,
        )
        .map_err(LearnError::StructureLearning)?;
        if let Some(threshold) = cli.imbalance {
            c = c.with_imbalance_threshold(threshold);
        }
        c
    };
    let learner = Learner::new(&dataset, config);

    let output_text = if let Some(target_name) = &cli.target {
        let target = dataset
            .var_by_name(target_name)
            .ok_or_else(|| LearnError::Configuration(format!("unknown target variable {target_name:?}")))?;
        let kind = if cli.discover_mb { NeighborhoodKind::Mb } else { NeighborhoodKind::Pc };
        let neighborhood = learner
            .neighborhood(target, kind)
            .map_err(LearnError::StructureLearning)?;
        let names: Vec<String> = neighborhood.iter().map(|&v| dataset.name(v).to_string()).collect();
        format_neighborhood(&names)
    } else {
        if cli.discover_mb {
            return Err(LearnError::Configuration(
                "--discover-mb requires --target".to_string(),
            ));
        }
        let net = learner.learn_network().map_err(LearnError::StructureLearning)?;
        format_dot(&net)
    };

    match &cli.output {
        Some(path) => fs::write(path, output_text)?,
        None => println!("{output_text}"),
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
