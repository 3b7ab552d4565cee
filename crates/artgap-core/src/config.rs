//! Pipeline configuration (`artgap.yaml`).
//!
//! Every field has a default, so an absent file is a valid configuration.
//! Unknown keys are rejected to catch typos in stage names.

use crate::errors::ConfigError;
use crate::providers::llm::openai::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which model backend answers the stage prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Openai,
    /// Offline client with a fixed answer; no network, no API key.
    Fake,
}

impl std::str::FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::Openai),
            "fake" => Ok(Provider::Fake),
            other => Err(ConfigError::Invalid(format!(
                "unknown provider '{other}' (expected openai or fake)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub provider: Provider,
    /// OpenAI-compatible API root.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Upper bound on in-flight model requests across all rules.
    pub max_concurrent_requests: usize,
    /// Number of rules processed at the same time.
    pub rule_concurrency: usize,
    pub stages: StageModels,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_concurrent_requests: 50,
            rule_concurrency: 4,
            stages: StageModels::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageModels {
    pub generator: StageModel,
    pub classifier: StageModel,
    pub articulator: StageModel,
    pub judge: StageModel,
    pub evaluator: StageModel,
}

impl Default for StageModels {
    fn default() -> Self {
        Self {
            generator: StageModel::new("gpt-5", None, 32_000),
            classifier: StageModel::new("gpt-4.1-2025-04-14", Some(0.0), 10),
            articulator: StageModel::new("gpt-4.1-2025-04-14", Some(0.0), 16_000),
            judge: StageModel::new("gpt-5", None, 2_000),
            evaluator: StageModel::new("gpt-5", None, 16_000),
        }
    }
}

impl StageModels {
    fn iter(&self) -> impl Iterator<Item = (&'static str, &StageModel)> {
        [
            ("generator", &self.generator),
            ("classifier", &self.classifier),
            ("articulator", &self.articulator),
            ("judge", &self.judge),
            ("evaluator", &self.evaluator),
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageModel {
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    pub max_tokens: u32,
}

impl StageModel {
    pub fn new(model: &str, temperature: Option<f32>, max_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            temperature,
            max_tokens,
        }
    }
}

impl PipelineConfig {
    /// Load from `path`, or defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let display = path.display().to_string();
        if !path.exists() {
            return Err(ConfigError::NotFound { path: display });
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let cfg = Self::from_yaml_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.rule_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "rule_concurrency must be at least 1".to_string(),
            ));
        }
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        for (stage, model) in self.stages.iter() {
            if model.model.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "stages.{stage}.model must not be empty"
                )));
            }
            if model.max_tokens == 0 {
                return Err(ConfigError::Invalid(format!(
                    "stages.{stage}.max_tokens must be at least 1"
                )));
            }
        }
        Ok(())
    }

    /// Resolve the API key: explicit value first, then `api_key_env`.
    pub fn resolve_api_key(&self, explicit: Option<&str>) -> Result<String, ConfigError> {
        explicit
            .map(str::to_string)
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey {
                env_var: self.api_key_env.clone(),
            })
    }
}
