use super::{PASS_THRESHOLD_PCT, TEST_SIZE};
use crate::errors::ProtocolError;
use crate::model::Example;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub input: String,
    pub true_label: bool,
    pub predicted_label: bool,
    pub correct: bool,
}

/// Held-out classification accuracy. `accuracy` is a percentage in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationScore {
    pub correct: usize,
    pub total: usize,
    pub accuracy: f64,
    pub results: Vec<PredictionOutcome>,
}

impl ClassificationScore {
    pub fn passed(&self) -> bool {
        passes_threshold(self.accuracy)
    }
}

/// Inclusive: exactly 90.0 passes.
pub fn passes_threshold(accuracy: f64) -> bool {
    accuracy >= PASS_THRESHOLD_PCT
}

/// Score predictions against the 32-example test subset, elementwise and in order.
pub fn score_predictions(
    test: &[Example],
    predictions: &[bool],
) -> Result<ClassificationScore, ProtocolError> {
    if test.len() != TEST_SIZE {
        return Err(ProtocolError::malformed(format!(
            "test subset has {} examples, expected {}",
            test.len(),
            TEST_SIZE
        )));
    }
    if predictions.len() != TEST_SIZE {
        return Err(ProtocolError::PredictionCountMismatch {
            expected: TEST_SIZE,
            actual: predictions.len(),
        });
    }

    let results: Vec<PredictionOutcome> = test
        .iter()
        .zip(predictions)
        .map(|(ex, &predicted)| PredictionOutcome {
            input: ex.text().to_string(),
            true_label: ex.label(),
            predicted_label: predicted,
            correct: predicted == ex.label(),
        })
        .collect();
    let correct = results.iter().filter(|r| r.correct).count();

    Ok(ClassificationScore {
        correct,
        total: TEST_SIZE,
        accuracy: correct as f64 * 100.0 / TEST_SIZE as f64,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::split::split_corpus;
    use crate::protocol::split::tests::corpus;

    fn test_subset() -> Vec<Example> {
        split_corpus(&corpus()).unwrap().test
    }

    #[test]
    fn all_correct_is_100() {
        let test = test_subset();
        let preds: Vec<bool> = test.iter().map(|e| e.label()).collect();
        let score = score_predictions(&test, &preds).unwrap();
        assert_eq!(score.correct, 32);
        assert_eq!(score.accuracy, 100.0);
        assert!(score.passed());
    }

    #[test]
    fn all_wrong_is_0() {
        let test = test_subset();
        let preds: Vec<bool> = test.iter().map(|e| !e.label()).collect();
        let score = score_predictions(&test, &preds).unwrap();
        assert_eq!(score.correct, 0);
        assert_eq!(score.accuracy, 0.0);
        assert!(!score.passed());
        assert!(score.results.iter().all(|r| !r.correct));
    }

    #[test]
    fn three_misses_pass_four_misses_fail() {
        let test = test_subset();
        let mut preds: Vec<bool> = test.iter().map(|e| e.label()).collect();
        for p in preds.iter_mut().take(3) {
            *p = !*p;
        }
        let score = score_predictions(&test, &preds).unwrap();
        assert_eq!(score.accuracy, 90.625);
        assert!(score.passed());

        preds[3] = !preds[3];
        let score = score_predictions(&test, &preds).unwrap();
        assert_eq!(score.accuracy, 87.5);
        assert!(!score.passed());
    }

    #[test]
    fn threshold_boundary() {
        assert!(passes_threshold(90.0));
        assert!(!passes_threshold(89.9));
        assert!(!passes_threshold(f64::NAN));
    }

    #[test]
    fn rejects_prediction_count_mismatch() {
        let test = test_subset();
        let err = score_predictions(&test, &[true; 31]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::PredictionCountMismatch {
                expected: 32,
                actual: 31
            }
        );
    }
}
