//! Batch driver: many rules, each an isolated task.

use crate::errors::{ConfigError, RuleError};
use crate::pipeline::{run_rule, ArtifactSink, RuleReport};
use crate::protocol::Verdict;
use crate::stages::RuleOracle;
use futures::FutureExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

/// One non-blank, trimmed line per rule. `#` lines are comments.
pub fn load_rules(path: &Path) -> Result<Vec<String>, ConfigError> {
    let display = path.display().to_string();
    if !path.exists() {
        return Err(ConfigError::RulesNotFound { path: display });
    }
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display,
        source,
    })?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Terminal result for one rule of a batch.
#[derive(Debug)]
pub struct RuleOutcome {
    /// The rule exactly as listed in the input.
    pub rule: String,
    pub result: Result<RuleReport, RuleError>,
}

impl RuleOutcome {
    pub fn verdict(&self) -> Option<Verdict> {
        self.result.as_ref().ok().map(|r| r.verdict)
    }
}

/// Called once per finished rule, in completion order, with `(done, total)`.
pub type OutcomeHook = Arc<dyn Fn(&RuleOutcome, usize, usize) + Send + Sync>;

/// Run every rule with at most `rule_concurrency` in flight.
///
/// Returns one outcome per input rule, in input order. A rule that errors
/// or panics yields an `Err` outcome and never affects the others.
pub async fn run_batch(
    oracle: Arc<dyn RuleOracle>,
    rules: Vec<String>,
    rule_concurrency: usize,
    sink: Arc<dyn ArtifactSink>,
    on_outcome: Option<OutcomeHook>,
) -> Vec<RuleOutcome> {
    let total = rules.len();
    let limiter = Arc::new(Semaphore::new(rule_concurrency.max(1)));
    let mut set = JoinSet::new();

    info!(rules = total, rule_concurrency, "batch started");
    for (idx, rule) in rules.iter().cloned().enumerate() {
        let oracle = oracle.clone();
        let sink = sink.clone();
        let limiter = limiter.clone();
        set.spawn(async move {
            let result = match limiter.acquire_owned().await {
                Ok(_permit) => {
                    AssertUnwindSafe(run_rule(oracle.as_ref(), &rule, sink.as_ref()))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(RuleError::Aborted(panic_message(&*panic))))
                }
                Err(_) => Err(RuleError::Aborted("rule limiter closed".to_string())),
            };
            (idx, RuleOutcome { rule, result })
        });
    }

    let mut slots: Vec<Option<RuleOutcome>> = (0..total).map(|_| None).collect();
    let mut done = 0;
    while let Some(joined) = set.join_next().await {
        let (idx, outcome) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "rule task did not complete");
                continue;
            }
        };
        done += 1;
        match &outcome.result {
            Ok(report) => info!(rule = %outcome.rule, verdict = %report.verdict, done, total, "rule complete"),
            Err(e) => error!(rule = %outcome.rule, code = e.code(), error = %e, done, total, "rule failed"),
        }
        if let Some(hook) = &on_outcome {
            hook(&outcome, done, total);
        }
        slots[idx] = Some(outcome);
    }

    slots
        .into_iter()
        .zip(rules)
        .map(|(slot, rule)| {
            slot.unwrap_or_else(|| RuleOutcome {
                rule,
                result: Err(RuleError::Aborted("rule task was cancelled".to_string())),
            })
        })
        .collect()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Batch-level counts for the console and exit code.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub errored: usize,
    pub classification_passed: usize,
    pub classification_failed: usize,
    pub verdicts: BTreeMap<Verdict, usize>,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[RuleOutcome]) -> Self {
        let mut summary = BatchSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match &outcome.result {
                Ok(report) => {
                    summary.completed += 1;
                    if report.classification.passed() {
                        summary.classification_passed += 1;
                    } else {
                        summary.classification_failed += 1;
                    }
                    *summary.verdicts.entry(report.verdict).or_default() += 1;
                }
                Err(_) => summary.errored += 1,
            }
        }
        summary
    }

    pub fn all_completed(&self) -> bool {
        self.errored == 0
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        self.verdicts.get(&verdict).copied().unwrap_or(0)
    }
}
