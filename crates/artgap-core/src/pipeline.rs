//! One rule, end to end.
//!
//! `run_rule` drives the oracle through generate, classify, articulate,
//! judge and training evaluation, stopping at the first gate that decides
//! the verdict. Every stage output is handed to an [`ArtifactSink`] before
//! the next stage runs, so a failing rule still leaves its raw outputs
//! behind.

use crate::errors::{RuleError, Stage};
use crate::model::{corpus_digest, Example};
use crate::protocol::{
    articulation_gate, check_consistency, classification_gate, consistency_verdict,
    score_predictions, split_corpus, ClassificationScore, ConsistencyRecord, Split, Verdict,
};
use crate::stages::{Articulation, MatchJudgment, PredicateEvaluation, RuleOracle, UnparsedOutput};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{info, warn};

/// Raw stage outputs persisted per rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    GeneratedSamples,
    ClassificationResults,
    ArticulatedRule,
    RuleComparison,
    TrainingEvaluation,
    /// Raw generator text that did not parse.
    #[serde(rename = "generated_samples_debug")]
    GeneratorDebug,
}

impl ArtifactKind {
    /// File-name suffix and summary key.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::GeneratedSamples => "generated_samples",
            ArtifactKind::ClassificationResults => "classification_results",
            ArtifactKind::ArticulatedRule => "articulated_rule",
            ArtifactKind::RuleComparison => "rule_comparison",
            ArtifactKind::TrainingEvaluation => "training_evaluation",
            ArtifactKind::GeneratorDebug => "generated_samples_debug",
        }
    }
}

/// Destination for raw stage outputs.
pub trait ArtifactSink: Send + Sync {
    /// Persist `payload`. Returns where it went, if it has a location worth
    /// recording in the rule summary.
    fn write(&self, rule: &str, kind: ArtifactKind, payload: &Value)
        -> anyhow::Result<Option<String>>;
}

/// Discards everything.
pub struct NullSink;

impl ArtifactSink for NullSink {
    fn write(&self, _rule: &str, _kind: ArtifactKind, _payload: &Value) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

/// Keeps artifacts in memory, mainly for tests.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(String, ArtifactKind, Value)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, ArtifactKind, Value)> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Artifact kinds written for `rule`, in write order.
    pub fn kinds_for(&self, rule: &str) -> Vec<ArtifactKind> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|(r, _, _)| r == rule)
            .map(|(_, k, _)| *k)
            .collect()
    }

    pub fn get(&self, rule: &str, kind: ArtifactKind) -> Option<Value> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .find(|(r, k, _)| r == rule && *k == kind)
            .map(|(_, _, v)| v.clone())
    }
}

impl ArtifactSink for MemorySink {
    fn write(&self, rule: &str, kind: ArtifactKind, payload: &Value) -> anyhow::Result<Option<String>> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((rule.to_string(), kind, payload.clone()));
        Ok(Some(format!("memory://{}/{}", rule, kind.as_str())))
    }
}

/// A training example the articulated rule labels differently than the
/// training data does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchDetail {
    /// 0-based position in the training subset.
    pub index: usize,
    pub text: String,
    pub training_label: bool,
    pub articulation_label: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Everything a completed rule produced.
///
/// Fields after `classification` are only present when the run got past the
/// gate that needs them: a `classification_failed` rule has no articulation
/// and never a consistency record.
#[derive(Debug, Clone)]
pub struct RuleReport {
    pub rule: String,
    pub corpus_digest: String,
    pub split: Split,
    pub classification: ClassificationScore,
    pub articulation: Option<Articulation>,
    pub judgment: Option<MatchJudgment>,
    pub evaluations: Option<Vec<PredicateEvaluation>>,
    pub consistency: Option<ConsistencyRecord>,
    pub verdict: Verdict,
    /// Artifact kind (`as_str`) to location.
    pub artifacts: BTreeMap<String, String>,
    pub duration_ms: u64,
}

impl RuleReport {
    pub fn is_genuine_failure(&self) -> bool {
        self.verdict == Verdict::GenuineFailure
    }

    pub fn mismatches(&self) -> Vec<MismatchDetail> {
        let (Some(record), Some(evals)) = (&self.consistency, &self.evaluations) else {
            return Vec::new();
        };
        record
            .mismatch_indices
            .iter()
            .filter_map(|&i| {
                let ex = self.split.training.get(i)?;
                let eval = evals.get(i)?;
                Some(MismatchDetail {
                    index: i,
                    text: ex.text().to_string(),
                    training_label: ex.label(),
                    articulation_label: eval.label,
                    reason: eval.reason.clone(),
                })
            })
            .collect()
    }
}

/// Strip an optional `Rule:` prefix and surrounding whitespace.
pub fn parse_rule_input(input: &str) -> Result<String, RuleError> {
    let trimmed = input.trim();
    let body = match trimmed.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("rule:") => trimmed[5..].trim(),
        _ => trimmed,
    };
    if body.is_empty() {
        return Err(RuleError::InvalidRule(format!(
            "empty rule text in {:?}",
            input
        )));
    }
    Ok(body.to_string())
}

struct Recorder<'a> {
    rule: &'a str,
    sink: &'a dyn ArtifactSink,
    paths: BTreeMap<String, String>,
}

impl Recorder<'_> {
    fn record(&mut self, kind: ArtifactKind, payload: Value) -> Result<(), RuleError> {
        let location = self
            .sink
            .write(self.rule, kind, &payload)
            .map_err(|e| RuleError::stage(Stage::Persist, e))?;
        if let Some(location) = location {
            self.paths.insert(kind.as_str().to_string(), location);
        }
        Ok(())
    }
}

/// Run the full protocol for one rule.
pub async fn run_rule(
    oracle: &dyn RuleOracle,
    rule_input: &str,
    sink: &dyn ArtifactSink,
) -> Result<RuleReport, RuleError> {
    let rule = parse_rule_input(rule_input)?;
    let started = Instant::now();
    let mut recorder = Recorder {
        rule: &rule,
        sink,
        paths: BTreeMap::new(),
    };
    info!(rule = %rule, "rule started");

    // Generate and split.
    let raw = match oracle.generate_corpus(&rule).await {
        Ok(raw) => raw,
        Err(e) => {
            if let Some(unparsed) = e.downcast_ref::<UnparsedOutput>() {
                let payload = json!({ "rule": rule, "raw_response": unparsed.raw });
                if let Err(persist) = recorder.record(ArtifactKind::GeneratorDebug, payload) {
                    warn!(rule = %rule, error = %persist, "failed to persist raw generator output");
                }
            }
            return Err(RuleError::stage(Stage::Generate, e));
        }
    };
    recorder.record(
        ArtifactKind::GeneratedSamples,
        json!({ "rule": rule, "generated_examples": raw }),
    )?;
    let corpus = raw
        .into_iter()
        .map(|r| r.into_example())
        .collect::<Result<Vec<Example>, _>>()?;
    let digest = corpus_digest(&corpus);
    let split = split_corpus(&corpus)?;

    // Classify held-out examples.
    let predictions = oracle
        .classify(&split.training, &split.test)
        .await
        .map_err(|e| RuleError::stage(Stage::Classify, e))?;
    let classification = score_predictions(&split.test, &predictions)?;
    recorder.record(
        ArtifactKind::ClassificationResults,
        json!({
            "rule": rule,
            "accuracy": classification.accuracy,
            "correct": classification.correct,
            "total": classification.total,
            "passed": classification.passed(),
            "results": classification.results,
        }),
    )?;
    info!(
        rule = %rule,
        accuracy = classification.accuracy,
        correct = classification.correct,
        total = classification.total,
        "classification scored"
    );

    let mut report = RuleReport {
        rule: rule.clone(),
        corpus_digest: digest,
        split,
        classification,
        articulation: None,
        judgment: None,
        evaluations: None,
        consistency: None,
        verdict: Verdict::ClassificationFailed,
        artifacts: BTreeMap::new(),
        duration_ms: 0,
    };

    if let Some(verdict) = classification_gate(report.classification.accuracy) {
        info!(rule = %rule, "classification below threshold; skipping articulation");
        return Ok(finish(report, verdict, recorder, started));
    }

    // Articulate and judge.
    let articulation = oracle
        .articulate(&report.split.training)
        .await
        .map_err(|e| RuleError::stage(Stage::Articulate, e))?;
    recorder.record(
        ArtifactKind::ArticulatedRule,
        json!({
            "rule": rule,
            "model_articulation": articulation.model_articulation,
            "final_rule": articulation.final_rule,
        }),
    )?;

    let judgment = oracle
        .judge_match(&rule, articulation.rule_text())
        .await
        .map_err(|e| RuleError::stage(Stage::Judge, e))?;
    recorder.record(
        ArtifactKind::RuleComparison,
        json!({
            "actual_rule": rule,
            "articulated_rule": articulation.rule_text(),
            "match": judgment.matches,
            "explanation": judgment.explanation,
        }),
    )?;
    info!(rule = %rule, matches = judgment.matches, "articulation judged");

    let matches = judgment.matches;
    report.articulation = Some(articulation);
    report.judgment = Some(judgment);
    if let Some(verdict) = articulation_gate(matches) {
        return Ok(finish(report, verdict, recorder, started));
    }

    // Check the articulation against its own training evidence.
    let articulated = report
        .articulation
        .as_ref()
        .map(|a| a.rule_text().to_string())
        .unwrap_or_default();
    let evaluations = oracle
        .evaluate_training(&articulated, &report.split.training)
        .await
        .map_err(|e| RuleError::stage(Stage::EvaluateTraining, e))?;
    let labels: Vec<bool> = evaluations.iter().map(|e| e.label).collect();
    let consistency = check_consistency(&report.split.training, &labels);
    recorder.record(
        ArtifactKind::TrainingEvaluation,
        json!({
            "rule": rule,
            "articulated_rule": articulated,
            "evaluations": evaluations,
            "consistency": consistency.as_ref().ok(),
        }),
    )?;
    let consistency = consistency?;
    if consistency.mismatch_count > 0 {
        warn!(
            rule = %rule,
            mismatches = consistency.mismatch_count,
            "articulation contradicts its training examples"
        );
    }

    let verdict = consistency_verdict(&consistency);
    report.evaluations = Some(evaluations);
    report.consistency = Some(consistency);
    Ok(finish(report, verdict, recorder, started))
}

fn finish(mut report: RuleReport, verdict: Verdict, recorder: Recorder<'_>, started: Instant) -> RuleReport {
    report.verdict = verdict;
    report.artifacts = recorder.paths;
    report.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        rule = %report.rule,
        verdict = %verdict,
        duration_ms = report.duration_ms,
        "rule finished"
    );
    report
}
