//! Model-facing pipeline stages.
//!
//! [`RuleOracle`] is the only seam between the pure protocol and the
//! external model. [`LlmOracle`] implements it on top of [`LlmClient`]s,
//! one per stage, so each stage can use its own model.

mod offline;
mod parse;
mod prompt;

use crate::config::{PipelineConfig, Provider, StageModel};
use crate::errors::ConfigError;
use crate::model::{Example, RawExample};
use crate::protocol::EXAMPLES_PER_LABEL;
use crate::providers::llm::fake::FakeClient;
use crate::providers::llm::openai::OpenAIClient;
use crate::providers::llm::tracing::TracingLlmClient;
use crate::providers::llm::LlmClient;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Articulator output. `final_rule` is the extracted one-line answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Articulation {
    pub model_articulation: String,
    pub final_rule: Option<String>,
}

impl Articulation {
    /// The text handed to the judge and the training evaluator.
    pub fn rule_text(&self) -> &str {
        self.final_rule
            .as_deref()
            .unwrap_or(&self.model_articulation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchJudgment {
    #[serde(rename = "match")]
    pub matches: bool,
    #[serde(default)]
    pub explanation: String,
}

/// What the articulated rule says about one training example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateEvaluation {
    pub label: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Model text that could not be turned into the expected shape. Kept so
/// callers can persist the raw response next to the failure.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct UnparsedOutput {
    pub raw: String,
    message: String,
}

impl UnparsedOutput {
    fn new(raw: String, err: &anyhow::Error) -> Self {
        Self {
            raw,
            message: format!("{err:#}"),
        }
    }
}

/// External model capability required by the pipeline.
#[async_trait]
pub trait RuleOracle: Send + Sync {
    /// Produce the labeled corpus for `rule` (unvalidated).
    async fn generate_corpus(&self, rule: &str) -> anyhow::Result<Vec<RawExample>>;

    /// Label every test example with the training subset as few-shot context.
    /// Output is aligned with `test`.
    async fn classify(&self, training: &[Example], test: &[Example]) -> anyhow::Result<Vec<bool>>;

    async fn articulate(&self, training: &[Example]) -> anyhow::Result<Articulation>;

    async fn judge_match(&self, rule: &str, articulated_rule: &str)
        -> anyhow::Result<MatchJudgment>;

    /// Apply the articulated rule to each training example, in order.
    async fn evaluate_training(
        &self,
        articulated_rule: &str,
        training: &[Example],
    ) -> anyhow::Result<Vec<PredicateEvaluation>>;
}

#[derive(Clone)]
pub struct StageClients {
    pub generator: Arc<dyn LlmClient>,
    pub classifier: Arc<dyn LlmClient>,
    pub articulator: Arc<dyn LlmClient>,
    pub judge: Arc<dyn LlmClient>,
    pub evaluator: Arc<dyn LlmClient>,
}

impl StageClients {
    /// Same client for every stage.
    pub fn uniform(client: Arc<dyn LlmClient>) -> Self {
        Self {
            generator: client.clone(),
            classifier: client.clone(),
            articulator: client.clone(),
            judge: client.clone(),
            evaluator: client,
        }
    }

    /// Deterministic offline model; every stage answers without network access.
    pub fn offline() -> Self {
        fn build(stage: &'static str, handler: fn(&str) -> anyhow::Result<String>) -> Arc<dyn LlmClient> {
            let client = FakeClient::new("offline").with_handler(handler);
            Arc::new(TracingLlmClient::new(Arc::new(client), stage))
        }
        Self {
            generator: build("generate", offline::generate),
            classifier: build("classify", offline::classify),
            articulator: build("articulate", offline::articulate),
            judge: build("judge", offline::judge),
            evaluator: build("evaluate_training", offline::evaluate),
        }
    }

    /// One traced OpenAI-compatible client per stage, sharing a connection pool.
    pub fn openai(config: &PipelineConfig, api_key: &str) -> Self {
        let http = reqwest::Client::new();
        let build = |stage: &'static str, m: &StageModel| -> Arc<dyn LlmClient> {
            let client = OpenAIClient::new(
                m.model.clone(),
                api_key.to_string(),
                m.temperature,
                m.max_tokens,
            )
            .with_base_url(config.base_url.as_str())
            .with_http_client(http.clone());
            Arc::new(TracingLlmClient::new(Arc::new(client), stage))
        };
        let s = &config.stages;
        Self {
            generator: build("generate", &s.generator),
            classifier: build("classify", &s.classifier),
            articulator: build("articulate", &s.articulator),
            judge: build("judge", &s.judge),
            evaluator: build("evaluate_training", &s.evaluator),
        }
    }
}

pub struct LlmOracle {
    clients: StageClients,
    /// Shared across rules so a batch never exceeds the request budget.
    limiter: Arc<Semaphore>,
}

impl LlmOracle {
    pub fn new(clients: StageClients, max_concurrent_requests: usize) -> Self {
        Self {
            clients,
            limiter: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
        }
    }

    /// Build the oracle for `config.provider`. Only `openai` needs an API key.
    pub fn from_config(
        config: &PipelineConfig,
        explicit_api_key: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let clients = match config.provider {
            Provider::Openai => {
                let api_key = config.resolve_api_key(explicit_api_key)?;
                StageClients::openai(config, &api_key)
            }
            Provider::Fake => StageClients::offline(),
        };
        Ok(Self::new(clients, config.max_concurrent_requests))
    }

    async fn call(
        &self,
        client: &Arc<dyn LlmClient>,
        prompt: &str,
        system: Option<&str>,
    ) -> anyhow::Result<String> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .context("request limiter closed")?;
        let context = system.map(|s| vec![s.to_string()]);
        let resp = client.complete(prompt, context.as_deref()).await?;
        if resp.text.trim().is_empty() {
            anyhow::bail!("empty response from {}", client.model_name());
        }
        Ok(resp.text)
    }
}

#[derive(Deserialize)]
struct EvaluationEntry {
    index: usize,
    label: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct EvaluationEnvelope {
    evaluations: Vec<EvaluationEntry>,
}

#[async_trait]
impl RuleOracle for LlmOracle {
    async fn generate_corpus(&self, rule: &str) -> anyhow::Result<Vec<RawExample>> {
        let request = prompt::generator_prompt(rule, EXAMPLES_PER_LABEL);
        let text = self.call(&self.clients.generator, &request, None).await?;
        let parsed = parse::extract_json(&text).and_then(|value| {
            serde_json::from_value::<Vec<RawExample>>(value)
                .context("generator output is not a list of {text, label}")
        });
        let examples = match parsed {
            Ok(examples) => examples,
            Err(e) => return Err(UnparsedOutput::new(text, &e).into()),
        };

        let positives = examples.iter().filter(|e| e.label).count();
        debug!(
            total = examples.len(),
            positives,
            negatives = examples.len() - positives,
            "corpus generated"
        );
        Ok(examples)
    }

    async fn classify(&self, training: &[Example], test: &[Example]) -> anyhow::Result<Vec<bool>> {
        let few_shot = prompt::few_shot_block(training);
        let calls = test.iter().map(|ex| {
            let request = prompt::classification_prompt(&few_shot, &ex.text());
            async move {
                let text = self.call(&self.clients.classifier, &request, None).await?;
                parse::parse_label(&text).ok_or_else(|| {
                    anyhow::anyhow!("unexpected prediction for '{}': {:?}", ex.text(), text)
                })
            }
        });
        futures::future::try_join_all(calls).await
    }

    async fn articulate(&self, training: &[Example]) -> anyhow::Result<Articulation> {
        let request = prompt::articulation_prompt(&prompt::few_shot_block(training));
        let text = self.call(&self.clients.articulator, &request, None).await?;
        let final_rule = parse::extract_final_rule(&text);
        if final_rule.is_none() {
            warn!("articulation has no FINAL RULE marker; using full response");
        }
        Ok(Articulation {
            model_articulation: text,
            final_rule,
        })
    }

    async fn judge_match(
        &self,
        rule: &str,
        articulated_rule: &str,
    ) -> anyhow::Result<MatchJudgment> {
        let request = prompt::judge_prompt(rule, articulated_rule);
        let text = self
            .call(&self.clients.judge, &request, Some(prompt::JUDGE_SYSTEM_PROMPT))
            .await?;
        let value = parse::extract_json(&text)?;
        let matches = value
            .get("match")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| anyhow::anyhow!("judge JSON missing boolean 'match' field"))?;
        let explanation = value
            .get("explanation")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        Ok(MatchJudgment {
            matches,
            explanation,
        })
    }

    async fn evaluate_training(
        &self,
        articulated_rule: &str,
        training: &[Example],
    ) -> anyhow::Result<Vec<PredicateEvaluation>> {
        let request = prompt::evaluation_prompt(articulated_rule, training);
        let text = self
            .call(
                &self.clients.evaluator,
                &request,
                Some(prompt::EVALUATOR_SYSTEM_PROMPT),
            )
            .await?;
        let value = parse::extract_json(&text)?;
        let envelope: EvaluationEnvelope =
            serde_json::from_value(value).context("evaluator output missing 'evaluations' list")?;
        order_evaluations(envelope.evaluations)
    }
}

/// Sort by the model-reported 1-based index and require `1..=n` exactly, so
/// a skipped or duplicated example cannot silently shift alignment.
fn order_evaluations(mut entries: Vec<EvaluationEntry>) -> anyhow::Result<Vec<PredicateEvaluation>> {
    entries.sort_by_key(|e| e.index);
    for (pos, entry) in entries.iter().enumerate() {
        if entry.index != pos + 1 {
            anyhow::bail!(
                "evaluation indices must run 1..={} without gaps or duplicates (found {} at position {})",
                entries.len(),
                entry.index,
                pos + 1
            );
        }
    }
    Ok(entries
        .into_iter()
        .map(|e| PredicateEvaluation {
            label: e.label,
            reason: e.reason,
        })
        .collect())
}
