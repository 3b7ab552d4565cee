use super::consistency::ConsistencyRecord;
use super::score::passes_threshold;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal outcome for one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Judge says the articulation describes the true rule.
    ArticulationCorrect,
    /// Articulation is wrong and disagrees with its own training evidence.
    GenuineFailure,
    /// Articulation is wrong but fits every training example.
    SpuriousFailure,
    /// Test accuracy below threshold; articulation was never requested.
    ClassificationFailed,
}

impl Verdict {
    pub const ALL: [Verdict; 4] = [
        Verdict::ArticulationCorrect,
        Verdict::GenuineFailure,
        Verdict::SpuriousFailure,
        Verdict::ClassificationFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::ArticulationCorrect => "articulation_correct",
            Verdict::GenuineFailure => "genuine_failure",
            Verdict::SpuriousFailure => "spurious_failure",
            Verdict::ClassificationFailed => "classification_failed",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First gate: stop with `ClassificationFailed` below the accuracy threshold.
pub fn classification_gate(accuracy: f64) -> Option<Verdict> {
    (!passes_threshold(accuracy)).then_some(Verdict::ClassificationFailed)
}

/// Second gate: stop with `ArticulationCorrect` when the judge reports a match.
pub fn articulation_gate(matches: bool) -> Option<Verdict> {
    matches.then_some(Verdict::ArticulationCorrect)
}

/// Final step for a wrong articulation. Any mismatch at all counts as genuine.
pub fn consistency_verdict(record: &ConsistencyRecord) -> Verdict {
    mismatch_verdict(record.mismatch_count)
}

fn mismatch_verdict(mismatch_count: usize) -> Verdict {
    if mismatch_count == 0 {
        Verdict::SpuriousFailure
    } else {
        Verdict::GenuineFailure
    }
}

/// Total decision function over the three inputs. Later inputs are ignored
/// once an earlier gate has decided.
pub fn decide(accuracy: f64, matches: bool, mismatch_count: usize) -> Verdict {
    classification_gate(accuracy)
        .or_else(|| articulation_gate(matches))
        .unwrap_or_else(|| mismatch_verdict(mismatch_count))
}
