use super::TRAINING_SIZE;
use crate::errors::ProtocolError;
use crate::model::Example;
use serde::{Deserialize, Serialize};

/// Agreement between the articulated rule and the training labels the model
/// was shown. This measures self-consistency, not correctness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyRecord {
    pub total: usize,
    pub matches: usize,
    pub mismatch_count: usize,
    /// 0-based positions into the training subset.
    pub mismatch_indices: Vec<usize>,
}

impl ConsistencyRecord {
    pub fn mismatch_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.mismatch_count as f64 / self.total as f64
    }

    pub fn is_consistent(&self) -> bool {
        self.mismatch_count == 0
    }
}

/// Compare the articulated rule's per-example labels with the training labels.
pub fn check_consistency(
    training: &[Example],
    evaluations: &[bool],
) -> Result<ConsistencyRecord, ProtocolError> {
    if training.len() != TRAINING_SIZE {
        return Err(ProtocolError::malformed(format!(
            "training subset has {} examples, expected {}",
            training.len(),
            TRAINING_SIZE
        )));
    }
    if evaluations.len() != TRAINING_SIZE {
        return Err(ProtocolError::EvaluationCountMismatch {
            expected: TRAINING_SIZE,
            actual: evaluations.len(),
        });
    }

    let mismatch_indices: Vec<usize> = training
        .iter()
        .zip(evaluations)
        .enumerate()
        .filter(|(_, (ex, said))| ex.label() != **said)
        .map(|(i, _)| i)
        .collect();

    Ok(ConsistencyRecord {
        total: TRAINING_SIZE,
        matches: TRAINING_SIZE - mismatch_indices.len(),
        mismatch_count: mismatch_indices.len(),
        mismatch_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::split::split_corpus;
    use crate::protocol::split::tests::corpus;

    fn training() -> Vec<Example> {
        split_corpus(&corpus()).unwrap().training
    }

    #[test]
    fn fully_consistent() {
        let training = training();
        let evals: Vec<bool> = training.iter().map(|e| e.label()).collect();
        let record = check_consistency(&training, &evals).unwrap();
        assert!(record.is_consistent());
        assert_eq!(record.matches, 64);
        assert!(record.mismatch_indices.is_empty());
        assert_eq!(record.mismatch_rate(), 0.0);
    }

    #[test]
    fn reports_mismatch_positions() {
        let training = training();
        let mut evals: Vec<bool> = training.iter().map(|e| e.label()).collect();
        for i in [0, 5, 33, 63] {
            evals[i] = !evals[i];
        }
        let record = check_consistency(&training, &evals).unwrap();
        assert_eq!(record.mismatch_count, 4);
        assert_eq!(record.matches, 60);
        assert_eq!(record.mismatch_indices, vec![0, 5, 33, 63]);
        assert_eq!(record.mismatch_rate(), 4.0 / 64.0);
    }

    #[test]
    fn idempotent() {
        let training = training();
        let evals: Vec<bool> = (0..64).map(|i| i % 3 == 0).collect();
        let first = check_consistency(&training, &evals).unwrap();
        let second = check_consistency(&training, &evals).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_evaluation_count_mismatch() {
        let training = training();
        let err = check_consistency(&training, &[true; 65]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::EvaluationCountMismatch {
                expected: 64,
                actual: 65
            }
        );
    }
}
