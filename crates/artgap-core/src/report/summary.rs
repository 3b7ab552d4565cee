//! Per-rule `<safe_name>_summary.json`.
//!
//! One file per rule, written as soon as the rule finishes. Completed rules
//! carry the verdict and the numbers behind it; errored rules carry the
//! error code and message instead. The genuine-failures report is rebuilt
//! from these files alone.

use super::safe_name;
use crate::batch::RuleOutcome;
use crate::pipeline::{parse_rule_input, MismatchDetail};
use crate::protocol::Verdict;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Current schema version for rule summaries.
pub const SCHEMA_VERSION: u32 = 1;

const SUMMARY_SUFFIX: &str = "_summary.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSummary {
    pub schema_version: u32,
    pub rule: String,
    pub rule_name: String,
    pub status: RuleStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(default)]
    pub is_genuine_failure: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_passed: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub articulated_rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgment_match: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgment_explanation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_matches: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_mismatch_count: Option<usize>,
    /// 0-based positions into the training subset.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mismatch_indices: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mismatches: Vec<MismatchDetail>,

    /// Digest of the validated corpus the numbers were computed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corpus_digest: Option<String>,
    /// Artifact kind to file path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable machine-readable code, e.g. `E_MALFORMED_CORPUS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<String>,
}

impl RuleSummary {
    fn empty(rule: String, status: RuleStatus) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            rule_name: safe_name(&rule),
            rule,
            status,
            verdict: None,
            is_genuine_failure: false,
            classification_accuracy: None,
            classification_passed: None,
            articulated_rule: None,
            judgment_match: None,
            judgment_explanation: None,
            training_matches: None,
            training_mismatch_count: None,
            mismatch_indices: Vec::new(),
            mismatches: Vec::new(),
            corpus_digest: None,
            artifacts: BTreeMap::new(),
            duration_ms: None,
            error: None,
            error_code: None,
            failed_stage: None,
        }
    }

    pub fn from_outcome(outcome: &RuleOutcome) -> Self {
        match &outcome.result {
            Ok(report) => {
                let mut s = Self::empty(report.rule.clone(), RuleStatus::Complete);
                s.verdict = Some(report.verdict);
                s.is_genuine_failure = report.is_genuine_failure();
                s.classification_accuracy = Some(report.classification.accuracy);
                s.classification_passed = Some(report.classification.passed());
                s.articulated_rule = report
                    .articulation
                    .as_ref()
                    .map(|a| a.rule_text().to_string());
                s.judgment_match = report.judgment.as_ref().map(|j| j.matches);
                s.judgment_explanation = report.judgment.as_ref().map(|j| j.explanation.clone());
                if let Some(record) = &report.consistency {
                    s.training_matches = Some(record.matches);
                    s.training_mismatch_count = Some(record.mismatch_count);
                    s.mismatch_indices = record.mismatch_indices.clone();
                }
                s.mismatches = report.mismatches();
                s.corpus_digest = Some(report.corpus_digest.clone());
                s.artifacts = report.artifacts.clone();
                s.duration_ms = Some(report.duration_ms);
                s
            }
            Err(e) => {
                // Keep the same file name the artifacts used when the rule parsed.
                let rule = parse_rule_input(&outcome.rule).unwrap_or_else(|_| outcome.rule.trim().to_string());
                let mut s = Self::empty(rule, RuleStatus::Error);
                s.error = Some(e.to_string());
                s.error_code = Some(e.code().to_string());
                s.failed_stage = e.failed_stage().map(|st| st.as_str().to_string());
                s
            }
        }
    }
}

pub fn summary_path(out_dir: &Path, rule: &str) -> PathBuf {
    out_dir.join(format!("{}{}", safe_name(rule), SUMMARY_SUFFIX))
}

/// Write `summary` into `out_dir`; returns the file path.
pub fn write_summary(summary: &RuleSummary, out_dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let path = summary_path(out_dir, &summary.rule);
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// All `*_summary.json` files in `out_dir`, sorted by file name.
/// Unparseable files are skipped with a warning.
pub fn read_summaries(out_dir: &Path) -> anyhow::Result<Vec<(PathBuf, RuleSummary)>> {
    let entries = std::fs::read_dir(out_dir)
        .with_context(|| format!("failed to read results directory {}", out_dir.display()))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(SUMMARY_SUFFIX))
        })
        .collect();
    paths.sort();

    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        let parsed = std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_str::<RuleSummary>(&raw).map_err(anyhow::Error::from));
        match parsed {
            Ok(summary) => out.push((path, summary)),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable summary"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ProtocolError, RuleError, Stage};

    fn errored(rule: &str, error: RuleError) -> RuleOutcome {
        RuleOutcome {
            rule: rule.to_string(),
            result: Err(error),
        }
    }

    #[test]
    fn error_summary_carries_code_and_stage() {
        let outcome = errored(
            "Rule: contains a digit",
            RuleError::stage(Stage::Judge, anyhow::anyhow!("timeout")),
        );
        let s = RuleSummary::from_outcome(&outcome);
        assert_eq!(s.rule, "contains a digit");
        assert_eq!(s.rule_name, "contains_a_digit");
        assert_eq!(s.status, RuleStatus::Error);
        assert_eq!(s.error_code.as_deref(), Some("E_STAGE_FAILED"));
        assert_eq!(s.failed_stage.as_deref(), Some("judge"));
        assert!(s.verdict.is_none());
        assert!(!s.is_genuine_failure);
    }

    #[test]
    fn error_summary_omits_absent_fields() {
        let outcome = errored(
            "x",
            RuleError::Protocol(ProtocolError::malformed("expected 96 examples, got 95")),
        );
        let v = serde_json::to_value(RuleSummary::from_outcome(&outcome)).unwrap();
        assert_eq!(v["status"], "error");
        assert_eq!(v["error_code"], "E_MALFORMED_CORPUS");
        assert!(v.get("verdict").is_none());
        assert!(v.get("classification_accuracy").is_none());
        assert!(v.get("mismatches").is_none());
        assert_eq!(v["schema_version"], 1);
    }

    #[test]
    fn write_then_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let a = RuleSummary::from_outcome(&errored("b rule", RuleError::InvalidRule("?".into())));
        let b = RuleSummary::from_outcome(&errored("a rule", RuleError::Aborted("panicked".into())));
        let path = write_summary(&a, tmp.path()).unwrap();
        assert!(path.ends_with("b_rule_summary.json"));
        write_summary(&b, tmp.path()).unwrap();
        std::fs::write(tmp.path().join("junk_summary.json"), "{not json").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let read = read_summaries(tmp.path()).unwrap();
        let rules: Vec<&str> = read.iter().map(|(_, s)| s.rule.as_str()).collect();
        assert_eq!(rules, vec!["a rule", "b rule"]);
        assert_eq!(read[1].1, a);
    }

    #[test]
    fn missing_results_directory_is_an_error() {
        let err = read_summaries(Path::new("/no/such/results")).unwrap_err();
        assert!(err.to_string().contains("/no/such/results"));
    }
}
