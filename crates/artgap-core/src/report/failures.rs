//! `genuine_failures_<timestamp>.json`: every rule whose articulation was
//! wrong and contradicted its own training examples, with the evidence.

use super::summary::{read_summaries, RuleSummary};
use crate::model::{Example, RawExample};
use crate::pipeline::{ArtifactKind, MismatchDetail};
use crate::protocol::split_corpus;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenuineFailure {
    pub rule: String,
    pub rule_name: String,
    pub articulated_rule: Option<String>,
    pub judgment_explanation: Option<String>,
    pub classification_accuracy: Option<f64>,
    pub training_matches: Option<usize>,
    pub training_mismatch_count: Option<usize>,
    /// The 64 examples the model saw; empty when the samples artifact is gone.
    pub training_examples: Vec<Example>,
    pub mismatched_examples: Vec<MismatchDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenuineFailuresReport {
    pub generated_at: DateTime<Utc>,
    pub total_rules_tested: usize,
    pub genuine_failures_count: usize,
    pub genuine_failures: Vec<GenuineFailure>,
}

/// Scan the summaries in `out_dir` and collect the genuine failures.
pub fn build_report(out_dir: &Path, now: DateTime<Utc>) -> anyhow::Result<GenuineFailuresReport> {
    let summaries = read_summaries(out_dir)?;
    let genuine_failures: Vec<GenuineFailure> = summaries
        .iter()
        .filter(|(_, s)| s.is_genuine_failure)
        .map(|(_, s)| failure_entry(s))
        .collect();

    Ok(GenuineFailuresReport {
        generated_at: now,
        total_rules_tested: summaries.len(),
        genuine_failures_count: genuine_failures.len(),
        genuine_failures,
    })
}

fn failure_entry(summary: &RuleSummary) -> GenuineFailure {
    let training_examples = match load_training_examples(summary) {
        Ok(examples) => examples,
        Err(e) => {
            warn!(rule = %summary.rule, error = %format!("{e:#}"), "training examples unavailable");
            Vec::new()
        }
    };
    GenuineFailure {
        rule: summary.rule.clone(),
        rule_name: summary.rule_name.clone(),
        articulated_rule: summary.articulated_rule.clone(),
        judgment_explanation: summary.judgment_explanation.clone(),
        classification_accuracy: summary.classification_accuracy,
        training_matches: summary.training_matches,
        training_mismatch_count: summary.training_mismatch_count,
        training_examples,
        mismatched_examples: summary.mismatches.clone(),
    }
}

/// Re-derive the training subset from the persisted generator output.
fn load_training_examples(summary: &RuleSummary) -> anyhow::Result<Vec<Example>> {
    let path = summary
        .artifacts
        .get(ArtifactKind::GeneratedSamples.as_str())
        .context("summary has no generated samples artifact")?;

    #[derive(Deserialize)]
    struct Samples {
        generated_examples: Vec<RawExample>,
    }
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    let samples: Samples =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {path}"))?;
    let corpus = samples
        .generated_examples
        .into_iter()
        .map(RawExample::into_example)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(split_corpus(&corpus)?.training)
}

pub fn report_file_name(now: DateTime<Utc>) -> String {
    format!("genuine_failures_{}.json", now.format("%Y-%m-%d_%H-%M-%S"))
}

/// Write `report` into `out_dir`, named after its timestamp. Returns `None`
/// when there is nothing to report.
pub fn save_report(out_dir: &Path, report: &GenuineFailuresReport) -> anyhow::Result<Option<PathBuf>> {
    if report.genuine_failures.is_empty() {
        return Ok(None);
    }
    let path = out_dir.join(report_file_name(report.generated_at));
    std::fs::write(&path, serde_json::to_string_pretty(report)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(Some(path))
}

/// Build and save in one step.
pub fn write_report(out_dir: &Path, now: DateTime<Utc>) -> anyhow::Result<Option<PathBuf>> {
    let report = build_report(out_dir, now)?;
    info!(
        total = report.total_rules_tested,
        genuine = report.genuine_failures_count,
        "scanned rule summaries"
    );
    save_report(out_dir, &report)
}
