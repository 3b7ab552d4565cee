//! Error types for the articulation-gap pipeline.
//!
//! `ProtocolError` covers input-contract violations of the pure split,
//! scoring and consistency code. `RuleError` is the single terminal error a
//! rule can end in; it never crosses into other rules of a batch.

use std::fmt;

/// Contract violations detected at protocol component boundaries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Corpus size, label balance or example shape is wrong.
    #[error("malformed corpus: {reason}")]
    MalformedCorpus { reason: String },

    /// Classifier output does not line up with the test subset.
    #[error("prediction count mismatch: expected {expected}, got {actual}")]
    PredictionCountMismatch { expected: usize, actual: usize },

    /// Training evaluation does not line up with the training subset.
    #[error("evaluation count mismatch: expected {expected}, got {actual}")]
    EvaluationCountMismatch { expected: usize, actual: usize },
}

impl ProtocolError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCorpus {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code written into rule summaries.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedCorpus { .. } => "E_MALFORMED_CORPUS",
            Self::PredictionCountMismatch { .. } => "E_PREDICTION_COUNT_MISMATCH",
            Self::EvaluationCountMismatch { .. } => "E_EVALUATION_COUNT_MISMATCH",
        }
    }
}

/// Pipeline stage that talks to the external model (or persists its output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Generate,
    Classify,
    Articulate,
    Judge,
    EvaluateTraining,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Generate => "generate",
            Stage::Classify => "classify",
            Stage::Articulate => "articulate",
            Stage::Judge => "judge",
            Stage::EvaluateTraining => "evaluate_training",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a single rule.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("{stage} stage failed: {error:#}")]
    Stage { stage: Stage, error: anyhow::Error },

    #[error("rule task aborted: {0}")]
    Aborted(String),
}

impl RuleError {
    pub fn stage(stage: Stage, error: anyhow::Error) -> Self {
        Self::Stage { stage, error }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRule(_) => "E_INVALID_RULE",
            Self::Protocol(e) => e.code(),
            Self::Stage { .. } => "E_STAGE_FAILED",
            Self::Aborted(_) => "E_ABORTED",
        }
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Configuration and input-file errors. These stop a run before any rule
/// is processed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("rules file not found: {path}\nhint: create it with one rule per line")]
    RulesNotFound { path: String },

    #[error("missing API key: set {env_var} or pass --api-key")]
    MissingApiKey { env_var: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_display_includes_stage_and_cause_chain() {
        let err = RuleError::stage(
            Stage::Judge,
            anyhow::anyhow!("missing field").context("judge JSON invalid"),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("judge stage failed: judge JSON invalid"));
        assert!(msg.contains("missing field"));
        assert_eq!(err.failed_stage(), Some(Stage::Judge));
        assert_eq!(err.code(), "E_STAGE_FAILED");
    }

    #[test]
    fn protocol_errors_convert_and_keep_codes() {
        let err: RuleError = ProtocolError::PredictionCountMismatch {
            expected: 32,
            actual: 31,
        }
        .into();
        assert_eq!(err.code(), "E_PREDICTION_COUNT_MISMATCH");
        assert_eq!(
            err.to_string(),
            "prediction count mismatch: expected 32, got 31"
        );
        assert_eq!(err.failed_stage(), None);
    }
}
