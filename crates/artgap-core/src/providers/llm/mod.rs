pub mod fake;
pub mod openai;
pub mod tracing;

use crate::model::LlmResponse;
use async_trait::async_trait;

/// Minimal chat-completion seam. `context` entries are sent as system
/// messages ahead of the prompt.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        context: Option<&[String]>,
    ) -> anyhow::Result<LlmResponse>;

    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;
}
