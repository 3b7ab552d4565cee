use super::{CORPUS_SIZE, EXAMPLES_PER_LABEL, TRAINING_PER_LABEL};
use crate::errors::ProtocolError;
use crate::model::Example;
use serde::{Deserialize, Serialize};

/// Positional partition of a labeled corpus.
///
/// Both halves list the true-labeled group first, then the false-labeled
/// group, each in generation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub training: Vec<Example>,
    pub test: Vec<Example>,
}

/// Split a 48/48 corpus into 64 training and 32 test examples.
///
/// Examples `[0, 32)` of each label group go to training and `[32, 48)` to
/// test. The corpus may interleave labels in any way; only the relative
/// order within a label group matters.
pub fn split_corpus(corpus: &[Example]) -> Result<Split, ProtocolError> {
    if corpus.len() != CORPUS_SIZE {
        return Err(ProtocolError::malformed(format!(
            "expected {} examples, got {}",
            CORPUS_SIZE,
            corpus.len()
        )));
    }

    let (positives, negatives): (Vec<&Example>, Vec<&Example>) =
        corpus.iter().partition(|ex| ex.label());
    if positives.len() != EXAMPLES_PER_LABEL || negatives.len() != EXAMPLES_PER_LABEL {
        return Err(ProtocolError::malformed(format!(
            "expected {} true and {} false examples, got {} true and {} false",
            EXAMPLES_PER_LABEL,
            EXAMPLES_PER_LABEL,
            positives.len(),
            negatives.len()
        )));
    }

    let (train_pos, test_pos) = positives.split_at(TRAINING_PER_LABEL);
    let (train_neg, test_neg) = negatives.split_at(TRAINING_PER_LABEL);

    Ok(Split {
        training: train_pos.iter().chain(train_neg).map(|&ex| ex.clone()).collect(),
        test: test_pos.iter().chain(test_neg).map(|&ex| ex.clone()).collect(),
    })
}
