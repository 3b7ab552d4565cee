use crate::model::LlmResponse;
use crate::providers::llm::LlmClient;
use ::tracing::{debug, info_span, Instrument};
use async_trait::async_trait;
use std::sync::Arc;

/// Wraps a client so every call runs inside an `llm.request` span tagged
/// with the pipeline stage that issued it.
pub struct TracingLlmClient {
    inner: Arc<dyn LlmClient>,
    stage: &'static str,
}

impl TracingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, stage: &'static str) -> Self {
        Self { inner, stage }
    }
}

#[async_trait]
impl LlmClient for TracingLlmClient {
    async fn complete(
        &self,
        prompt: &str,
        context: Option<&[String]>,
    ) -> anyhow::Result<LlmResponse> {
        let span = info_span!(
            "llm.request",
            "artgap.stage" = self.stage,
            "artgap.provider" = self.inner.provider_name(),
            "llm.request.model" = self.inner.model_name(),
            "llm.prompt.chars" = prompt.len(),
            "llm.response.model" = ::tracing::field::Empty,
            "llm.usage.input_tokens" = ::tracing::field::Empty,
            "llm.usage.output_tokens" = ::tracing::field::Empty,
            "llm.duration_ms" = ::tracing::field::Empty,
            "error" = ::tracing::field::Empty,
            "error.message" = ::tracing::field::Empty
        );

        async move {
            let start = std::time::Instant::now();
            let result = self.inner.complete(prompt, context).await;
            let span = ::tracing::Span::current();
            span.record("llm.duration_ms", start.elapsed().as_millis() as u64);

            match &result {
                Ok(resp) => {
                    span.record("llm.response.model", resp.model.as_str());
                    if let Some(usage) = resp.meta.get("usage") {
                        if let Some(i) = usage.get("input_tokens").and_then(|v| v.as_u64()) {
                            span.record("llm.usage.input_tokens", i);
                        }
                        if let Some(o) = usage.get("output_tokens").and_then(|v| v.as_u64()) {
                            span.record("llm.usage.output_tokens", o);
                        }
                    }
                    debug!(chars = resp.text.len(), "llm response received");
                }
                Err(e) => {
                    span.record("error", true);
                    span.record("error.message", e.to_string().as_str());
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::fake::FakeClient;

    #[tokio::test]
    async fn passes_through_response_and_identity() {
        let inner = Arc::new(FakeClient::new("gpt-4.1").with_response("False"));
        let client = TracingLlmClient::new(inner.clone(), "classify");

        let resp = client.complete("Input: a b c d e", None).await.unwrap();
        assert_eq!(resp.text, "False");
        assert_eq!(client.provider_name(), "fake");
        assert_eq!(client.model_name(), "gpt-4.1");
        assert_eq!(inner.call_count(), 1);
    }

    #[tokio::test]
    async fn passes_through_errors() {
        let inner = Arc::new(FakeClient::new("m").with_handler(|_| anyhow::bail!("boom")));
        let client = TracingLlmClient::new(inner, "judge");
        let err = client.complete("x", None).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
