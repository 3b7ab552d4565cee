//! Shared tail of `run` and `rule`: execute, persist, summarise, exit code.

use super::runner_builder::Runner;
use crate::exit_codes::{RULE_FAILED, SUCCESS};
use anyhow::Context;
use artgap_core::batch::{run_batch, BatchSummary, OutcomeHook};
use artgap_core::pipeline::ArtifactSink;
use artgap_core::report::artifacts::FileSink;
use artgap_core::report::console::{print_batch_summary, print_progress};
use artgap_core::report::failures;
use artgap_core::report::summary::{write_summary, RuleSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

pub(crate) async fn execute_rules(
    runner: Runner,
    rules: Vec<String>,
    out: &Path,
    write_failures_report: bool,
) -> anyhow::Result<i32> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("failed to create output directory {}", out.display()))?;

    let sink: Arc<dyn ArtifactSink> = Arc::new(FileSink::new(out));
    let hook = summary_writer(out.to_path_buf());
    let outcomes = run_batch(
        runner.oracle,
        rules,
        runner.config.rule_concurrency,
        sink,
        Some(hook),
    )
    .await;

    print_batch_summary(&outcomes);

    if write_failures_report {
        match failures::write_report(out, chrono::Utc::now())? {
            Some(path) => eprintln!("\nGenuine failures report: {}", path.display()),
            None => eprintln!("\nNo genuine failures to report."),
        }
    }

    let stats = BatchSummary::from_outcomes(&outcomes);
    info!(
        total = stats.total,
        completed = stats.completed,
        errored = stats.errored,
        "batch finished"
    );
    Ok(if stats.all_completed() {
        SUCCESS
    } else {
        RULE_FAILED
    })
}

/// Persist each rule summary as soon as the rule finishes.
fn summary_writer(out: PathBuf) -> OutcomeHook {
    Arc::new(move |outcome, done, total| {
        print_progress(outcome, done, total);
        if let Err(e) = write_summary(&RuleSummary::from_outcome(outcome), &out) {
            error!(rule = %outcome.rule, error = %format!("{e:#}"), "failed to write rule summary");
        }
    })
}
