use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod common;
pub use common::*;

#[derive(Parser)]
#[command(
    name = "artgap",
    version,
    about = "Measure whether a model can state the classification rules it learns in context"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run every rule listed in a rules file
    Run(RunArgs),
    /// Run a single rule
    Rule(RuleArgs),
    /// Rebuild the genuine-failures report from existing rule summaries
    Report(ReportArgs),
    Version,
}

#[derive(clap::Args, Clone, Debug)]
pub struct RunArgs {
    /// One rule per line; blank lines and `#` comments are skipped
    #[arg(long, default_value = "rules_to_evaluate.txt")]
    pub rules: PathBuf,

    /// Rules processed at the same time (overrides config)
    #[arg(long, env = "ARTGAP_RULE_CONCURRENCY")]
    pub rule_concurrency: Option<usize>,

    /// Skip writing genuine_failures_<timestamp>.json after the batch
    #[arg(long)]
    pub no_report: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(clap::Args, Clone, Debug)]
pub struct RuleArgs {
    /// Rule text, optionally prefixed with "Rule:"
    pub rule: String,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(clap::Args, Clone, Debug)]
pub struct ReportArgs {
    /// Directory holding *_summary.json files
    #[arg(long, default_value = DEFAULT_OUT_DIR)]
    pub out: PathBuf,
}
