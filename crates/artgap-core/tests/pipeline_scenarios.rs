use artgap_core::batch::{run_batch, BatchSummary, OutcomeHook};
use artgap_core::model::{Example, RawExample};
use artgap_core::pipeline::{run_rule, ArtifactKind, MemorySink};
use artgap_core::protocol::Verdict;
use artgap_core::stages::{Articulation, MatchJudgment, PredicateEvaluation, RuleOracle};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const WORDS: [&str; 8] = ["apple", "river", "stone", "cloud", "tiger", "paper", "lamp", "ocean"];

fn text(i: usize, label: bool) -> String {
    let head = if label { "lizard" } else { "gecko" };
    format!(
        "{} {} {} {} {}",
        head,
        WORDS[i % 8],
        WORDS[(i / 8) % 8],
        i % 10,
        (i / 10) % 10
    )
}

/// 48 true then 48 false, `missing` examples dropped from the end.
fn corpus(missing: usize) -> Vec<RawExample> {
    let mut out: Vec<RawExample> = (0..48)
        .map(|i| RawExample {
            text: text(i, true),
            label: true,
        })
        .chain((0..48).map(|i| RawExample {
            text: text(i, false),
            label: false,
        }))
        .collect();
    out.truncate(96 - missing);
    out
}

#[derive(Default)]
struct Script {
    /// Test predictions answered wrongly, counted from the front.
    wrong_predictions: usize,
    judge_match: bool,
    /// Training evaluations that contradict the training label, from the front.
    contradictions: usize,
    missing_examples: usize,
    panic_in_generate: bool,
}

struct ScriptedOracle {
    scripts: Vec<(&'static str, Script)>,
    calls: Mutex<Vec<(String, &'static str)>>,
}

impl ScriptedOracle {
    fn new(scripts: Vec<(&'static str, Script)>) -> Self {
        Self {
            scripts,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn single(script: Script) -> Self {
        Self::new(vec![("any", script)])
    }

    fn script(&self, rule: &str) -> &Script {
        self.scripts
            .iter()
            .find(|(name, _)| *name == rule)
            .map(|(_, s)| s)
            .unwrap_or(&self.scripts[0].1)
    }

    fn note(&self, rule: &str, stage: &'static str) {
        self.calls.lock().unwrap().push((rule.to_string(), stage));
    }

    fn stages_called(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(|(_, s)| *s).collect()
    }

    /// Stages after generation only see examples; recover the rule from the
    /// first training example (see `corpus_for`).
    fn rule_for(&self, training: &[Example]) -> &'static str {
        let marker = training.first().map(|e| e.text()).unwrap_or("");
        self.scripts
            .get(marker_index(marker))
            .map(|(name, _)| *name)
            .unwrap_or(self.scripts[0].0)
    }
}

/// Rule `k` of a batch shifts its corpus so the first training example
/// starts at position `k`.
fn marker_index(first_training_text: &str) -> usize {
    let word = first_training_text.split(' ').nth(1).unwrap_or("apple");
    WORDS.iter().position(|w| *w == word).unwrap_or(0)
}

fn corpus_for(rule_index: usize, missing: usize) -> Vec<RawExample> {
    let mut c = corpus(missing);
    let end = 48.min(c.len());
    c[..end].rotate_left(rule_index);
    c
}

#[async_trait]
impl RuleOracle for ScriptedOracle {
    async fn generate_corpus(&self, rule: &str) -> anyhow::Result<Vec<RawExample>> {
        self.note(rule, "generate");
        let idx = self
            .scripts
            .iter()
            .position(|(name, _)| *name == rule)
            .unwrap_or(0);
        let script = self.script(rule);
        if script.panic_in_generate {
            panic!("generator exploded");
        }
        Ok(corpus_for(idx, script.missing_examples))
    }

    async fn classify(&self, training: &[Example], test: &[Example]) -> anyhow::Result<Vec<bool>> {
        let rule = self.rule_for(training);
        self.note(rule, "classify");
        let wrong = self.script(rule).wrong_predictions;
        Ok(test
            .iter()
            .enumerate()
            .map(|(i, ex)| if i < wrong { !ex.label() } else { ex.label() })
            .collect())
    }

    async fn articulate(&self, training: &[Example]) -> anyhow::Result<Articulation> {
        let rule = self.rule_for(training);
        self.note(rule, "articulate");
        Ok(Articulation {
            model_articulation: "Reasoning.\n**FINAL RULE:** second word is a fruit".into(),
            final_rule: Some("second word is a fruit".into()),
        })
    }

    async fn judge_match(&self, rule: &str, _articulated: &str) -> anyhow::Result<MatchJudgment> {
        self.note(rule, "judge");
        Ok(MatchJudgment {
            matches: self.script(rule).judge_match,
            explanation: "scripted".into(),
        })
    }

    async fn evaluate_training(
        &self,
        _articulated: &str,
        training: &[Example],
    ) -> anyhow::Result<Vec<PredicateEvaluation>> {
        let rule = self.rule_for(training);
        self.note(rule, "evaluate_training");
        let flips = self.script(rule).contradictions;
        Ok(training
            .iter()
            .enumerate()
            .map(|(i, ex)| PredicateEvaluation {
                label: if i < flips { !ex.label() } else { ex.label() },
                reason: (i < flips).then(|| format!("flipped {i}")),
            })
            .collect())
    }
}

#[tokio::test]
async fn correct_articulation() {
    let oracle = ScriptedOracle::single(Script {
        wrong_predictions: 1,
        judge_match: true,
        ..Default::default()
    });
    let sink = MemorySink::new();
    let report = run_rule(&oracle, "Rule: starts with lizard", &sink).await.unwrap();

    assert_eq!(report.rule, "starts with lizard");
    assert_eq!(report.classification.accuracy, 96.875);
    assert_eq!(report.verdict, Verdict::ArticulationCorrect);
    assert!(report.consistency.is_none());
    assert_eq!(
        oracle.stages_called(),
        vec!["generate", "classify", "articulate", "judge"]
    );
    assert_eq!(
        sink.kinds_for("starts with lizard"),
        vec![
            ArtifactKind::GeneratedSamples,
            ArtifactKind::ClassificationResults,
            ArtifactKind::ArticulatedRule,
            ArtifactKind::RuleComparison,
        ]
    );
    assert_eq!(report.artifacts.len(), 4);
}

#[tokio::test]
async fn genuine_failure_lists_contradicted_examples() {
    let oracle = ScriptedOracle::single(Script {
        wrong_predictions: 1,
        judge_match: false,
        contradictions: 6,
        ..Default::default()
    });
    let report = run_rule(&oracle, "starts with lizard", &MemorySink::new())
        .await
        .unwrap();

    assert_eq!(report.verdict, Verdict::GenuineFailure);
    let record = report.consistency.as_ref().unwrap();
    assert_eq!(record.mismatch_count, 6);
    assert_eq!(record.matches, 58);
    assert_eq!(record.mismatch_indices, vec![0, 1, 2, 3, 4, 5]);

    let details = report.mismatches();
    assert_eq!(details.len(), 6);
    assert_eq!(details[0].text, report.split.training[0].text());
    assert!(details[0].training_label);
    assert!(!details[0].articulation_label);
    assert_eq!(details[5].reason.as_deref(), Some("flipped 5"));
}

#[tokio::test]
async fn spurious_failure_when_articulation_fits_training() {
    let oracle = ScriptedOracle::single(Script {
        wrong_predictions: 2,
        judge_match: false,
        contradictions: 0,
        ..Default::default()
    });
    let report = run_rule(&oracle, "starts with lizard", &MemorySink::new())
        .await
        .unwrap();
    assert_eq!(report.classification.accuracy, 93.75);
    assert_eq!(report.verdict, Verdict::SpuriousFailure);
    assert!(report.consistency.unwrap().is_consistent());
}

#[tokio::test]
async fn low_accuracy_stops_before_articulation() {
    let oracle = ScriptedOracle::single(Script {
        wrong_predictions: 8,
        ..Default::default()
    });
    let sink = MemorySink::new();
    let report = run_rule(&oracle, "starts with lizard", &sink).await.unwrap();

    assert_eq!(report.classification.accuracy, 75.0);
    assert_eq!(report.verdict, Verdict::ClassificationFailed);
    assert!(report.articulation.is_none());
    assert!(report.judgment.is_none());
    assert!(report.consistency.is_none());
    assert_eq!(oracle.stages_called(), vec!["generate", "classify"]);
    assert!(sink
        .get("starts with lizard", ArtifactKind::ArticulatedRule)
        .is_none());
}

#[tokio::test]
async fn accuracy_just_above_and_below_threshold() {
    // 29/32 = 90.625 passes, 28/32 = 87.5 does not.
    for (wrong, expected) in [(3, false), (4, true)] {
        let oracle = ScriptedOracle::single(Script {
            wrong_predictions: wrong,
            judge_match: true,
            ..Default::default()
        });
        let report = run_rule(&oracle, "r", &MemorySink::new()).await.unwrap();
        assert_eq!(
            report.verdict == Verdict::ClassificationFailed,
            expected,
            "wrong = {wrong}"
        );
    }
}

#[tokio::test]
async fn malformed_corpus_is_a_protocol_error_with_samples_persisted() {
    let oracle = ScriptedOracle::single(Script {
        missing_examples: 1,
        ..Default::default()
    });
    let sink = MemorySink::new();
    let err = run_rule(&oracle, "r", &sink).await.unwrap_err();
    assert_eq!(err.code(), "E_MALFORMED_CORPUS");
    assert!(err.to_string().contains("expected 96 examples, got 95"));
    assert_eq!(sink.kinds_for("r"), vec![ArtifactKind::GeneratedSamples]);
}

#[tokio::test]
async fn empty_rule_never_reaches_the_oracle() {
    let oracle = ScriptedOracle::single(Script::default());
    let err = run_rule(&oracle, "Rule:  ", &MemorySink::new()).await.unwrap_err();
    assert_eq!(err.code(), "E_INVALID_RULE");
    assert!(oracle.stages_called().is_empty());
}

#[tokio::test]
async fn batch_isolates_failing_rules_and_keeps_input_order() {
    let oracle = Arc::new(ScriptedOracle::new(vec![
        (
            "good",
            Script {
                judge_match: true,
                ..Default::default()
            },
        ),
        (
            "short",
            Script {
                missing_examples: 3,
                ..Default::default()
            },
        ),
        (
            "boom",
            Script {
                panic_in_generate: true,
                ..Default::default()
            },
        ),
        (
            "weak",
            Script {
                wrong_predictions: 10,
                ..Default::default()
            },
        ),
    ]));
    let seen = Arc::new(AtomicUsize::new(0));
    let hook: OutcomeHook = {
        let seen = seen.clone();
        Arc::new(move |_outcome, done, total| {
            assert_eq!(total, 4);
            assert!(done >= 1 && done <= 4);
            seen.fetch_add(1, Ordering::SeqCst);
        })
    };

    let rules = vec!["good", "short", "boom", "weak"]
        .into_iter()
        .map(String::from)
        .collect();
    let outcomes = run_batch(oracle, rules, 2, Arc::new(MemorySink::new()), Some(hook)).await;

    let names: Vec<&str> = outcomes.iter().map(|o| o.rule.as_str()).collect();
    assert_eq!(names, vec!["good", "short", "boom", "weak"]);
    assert_eq!(outcomes[0].verdict(), Some(Verdict::ArticulationCorrect));
    assert_eq!(outcomes[1].result.as_ref().unwrap_err().code(), "E_MALFORMED_CORPUS");
    let boom = outcomes[2].result.as_ref().unwrap_err();
    assert_eq!(boom.code(), "E_ABORTED");
    assert!(boom.to_string().contains("generator exploded"));
    assert_eq!(outcomes[3].verdict(), Some(Verdict::ClassificationFailed));
    assert_eq!(seen.load(Ordering::SeqCst), 4);

    let summary = BatchSummary::from_outcomes(&outcomes);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.errored, 2);
    assert_eq!(summary.classification_passed, 1);
    assert_eq!(summary.classification_failed, 1);
    assert!(!summary.all_completed());
}
