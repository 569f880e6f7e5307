use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use fuzzer::algorithm::AlgorithmSet;
use fuzzer::config::FuzzConfig;
use fuzzer::engine::{FailurePolicy, DEFAULT_BATCH_SIZE};

/// `-Database` value selecting the non-persistent store.
pub const MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Operation {
    #[value(name = "FuzzFeatureDetectors")]
    FuzzFeatureDetectors,
}

/// Sweeps keypoint detector parameters and scores them against a region of interest
#[derive(Parser, Debug, Clone)]
#[command(name = "feature-fuzzer", author, version, about)]
pub struct Args {
    /// Operation to perform
    #[arg(long, value_enum, ignore_case = true)]
    pub operation: Operation,

    /// Directory containing fuzzer-input.json and the listed images
    #[arg(long)]
    pub input_path: PathBuf,

    /// Directory receiving the CSV report, annotated images and database
    #[arg(long)]
    pub output_path: PathBuf,

    /// Comma separated detector families, e.g. "AKAZE,ORB" (default: all)
    #[arg(long)]
    pub algorithms: Option<AlgorithmSet>,

    /// Parameter sets executed concurrently per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// What a failing parameter set does: abort the family or skip it
    #[arg(long, default_value_t = FailurePolicy::Abort)]
    pub failure_policy: FailurePolicy,

    /// Do not write annotated images
    #[arg(long, default_value_t = false)]
    pub no_images: bool,

    /// Result database file, or ":memory:" to keep results in memory only
    #[arg(long)]
    pub database: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Directory for the daily rolling log files
    #[arg(long, default_value = common::log_setup::LOG_DIR)]
    pub log_dir: PathBuf,
}

impl Args {
    /// Parses command-line arguments, accepting `-PascalCase` flags.
    pub fn parse_normalized<I: IntoIterator<Item = String>>(args: I) -> Self {
        Self::parse_from(normalize_flags(args))
    }

    pub fn try_parse_normalized<I: IntoIterator<Item = String>>(args: I) -> Result<Self, clap::Error> {
        Self::try_parse_from(normalize_flags(args))
    }

    pub fn in_memory_database(&self) -> bool {
        self.database.as_deref() == Some(MEMORY_DATABASE)
    }

    pub fn to_config(&self) -> FuzzConfig {
        FuzzConfig {
            input_path: self.input_path.clone(),
            output_path: self.output_path.clone(),
            algorithms: self.algorithms.unwrap_or_else(AlgorithmSet::all),
            batch_size: self.batch_size,
            failure_policy: self.failure_policy,
            write_images: !self.no_images,
            database_path: self
                .database
                .as_ref()
                .filter(|database| database.as_str() != MEMORY_DATABASE)
                .map(PathBuf::from),
        }
    }
}

/// Rewrites `-InputPath` style flags into clap's `--input-path`.
///
/// The program name and anything that is not a single-dash PascalCase flag
/// pass through unchanged.
pub fn normalize_flags<I: IntoIterator<Item = String>>(args: I) -> Vec<String> {
    args.into_iter()
        .enumerate()
        .map(|(index, arg)| if index == 0 { arg } else { normalize_flag(arg) })
        .collect()
}

fn normalize_flag(arg: String) -> String {
    let Some(name) = arg.strip_prefix('-') else {
        return arg;
    };
    if !name.starts_with(|c: char| c.is_ascii_uppercase()) {
        return arg;
    }

    let mut flag = String::with_capacity(arg.len() + 4);
    flag.push_str("--");
    for (index, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if index > 0 {
                flag.push('-');
            }
            flag.push(c.to_ascii_lowercase());
        } else {
            flag.push(c);
        }
    }
    flag
}
