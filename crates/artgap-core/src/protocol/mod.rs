//! Data-split and consistency-evaluation protocol.
//!
//! Everything here is a pure function over small in-memory lists. The
//! model-facing stages feed these functions and never the other way round.

pub mod consistency;
pub mod score;
pub mod split;
pub mod verdict;

pub use consistency::{check_consistency, ConsistencyRecord};
pub use score::{passes_threshold, score_predictions, ClassificationScore, PredictionOutcome};
pub use split::{split_corpus, Split};
pub use verdict::{
    articulation_gate, classification_gate, consistency_verdict, decide, Verdict,
};

pub const CORPUS_SIZE: usize = 96;
pub const EXAMPLES_PER_LABEL: usize = 48;
pub const TRAINING_PER_LABEL: usize = 32;
pub const TEST_PER_LABEL: usize = EXAMPLES_PER_LABEL - TRAINING_PER_LABEL;
pub const TRAINING_SIZE: usize = 2 * TRAINING_PER_LABEL;
pub const TEST_SIZE: usize = 2 * TEST_PER_LABEL;

/// Minimum test accuracy (percent, inclusive) before articulation is requested.
pub const PASS_THRESHOLD_PCT: f64 = 90.0;
