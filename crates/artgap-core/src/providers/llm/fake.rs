use super::LlmClient;
use crate::model::LlmResponse;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

type Handler = Arc<dyn Fn(&str) -> anyhow::Result<String> + Send + Sync>;

/// Deterministic offline client.
///
/// Answers, in order of precedence: the next scripted response, the handler
/// applied to the prompt, or the fixed response (default `"True"`).
/// Every prompt is recorded for later inspection.
#[derive(Clone)]
pub struct FakeClient {
    model: String,
    fixed_response: Option<String>,
    scripted: Arc<Mutex<VecDeque<String>>>,
    handler: Option<Handler>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl FakeClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            fixed_response: None,
            scripted: Arc::new(Mutex::new(VecDeque::new())),
            handler: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.fixed_response = Some(response.into());
        self
    }

    pub fn with_script<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripted
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend(responses.into_iter().map(Into::into));
        self
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait]
impl LlmClient for FakeClient {
    async fn complete(
        &self,
        prompt: &str,
        _context: Option<&[String]>,
    ) -> anyhow::Result<LlmResponse> {
        self.prompts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(prompt.to_string());

        let scripted = self
            .scripted
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        let text = match (scripted, &self.handler) {
            (Some(text), _) => text,
            (None, Some(handler)) => handler(prompt)?,
            (None, None) => self
                .fixed_response
                .clone()
                .unwrap_or_else(|| "True".to_string()),
        };

        Ok(LlmResponse {
            text,
            provider: "fake".to_string(),
            model: self.model.clone(),
            meta: serde_json::json!({}),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
