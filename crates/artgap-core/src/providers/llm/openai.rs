use super::LlmClient;
use crate::model::LlmResponse;
use async_trait::async_trait;
use serde_json::json;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions client for OpenAI and compatible endpoints.
pub struct OpenAIClient {
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    /// `None` omits the field; reasoning models reject anything but the default.
    pub temperature: Option<f32>,
    pub max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(model: String, api_key: String, temperature: Option<f32>, max_tokens: u32) -> Self {
        Self {
            model,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature,
            max_tokens,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Share one connection pool across stage clients.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn request_body(&self, prompt: &str, context: Option<&[String]>) -> serde_json::Value {
        let mut messages: Vec<serde_json::Value> = context
            .unwrap_or_default()
            .iter()
            .map(|sys| json!({ "role": "system", "content": sys }))
            .collect();
        messages.push(json!({ "role": "user", "content": prompt }));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_completion_tokens": self.max_tokens,
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        body
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(
        &self,
        prompt: &str,
        context: Option<&[String]>,
    ) -> anyhow::Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        crate::providers::network::check_outbound(&url)?;

        let body = self.request_body(prompt, context);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "OpenAI chat API error (status {}): {}",
                status.as_u16(),
                error_text
            );
        }

        let json: serde_json::Value = resp.json().await?;
        parse_completion(&json, &self.model)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn parse_completion(json: &serde_json::Value, requested_model: &str) -> anyhow::Result<LlmResponse> {
    let text = json
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("OpenAI API response missing content"))?
        .trim()
        .to_string();

    let model = json
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or(requested_model)
        .to_string();

    let mut meta = json!({});
    if let Some(usage) = json.get("usage") {
        meta["usage"] = json!({
            "input_tokens": usage.get("prompt_tokens"),
            "output_tokens": usage.get("completion_tokens"),
        });
    }

    Ok(LlmResponse {
        text,
        provider: "openai".to_string(),
        model,
        meta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::network::{NetworkPolicyGuard, NETWORK_POLICY_ENV};
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn respects_network_deny_policy() {
        std::env::remove_var(NETWORK_POLICY_ENV);
        let _guard = NetworkPolicyGuard::deny("unit test");
        let client = OpenAIClient::new("gpt-4.1".to_string(), "test-key".to_string(), None, 8);
        let err = client
            .complete("hello", None)
            .await
            .expect_err("network deny policy should block outbound call");
        let msg = err.to_string();
        assert!(msg.contains("outbound network blocked by policy"));
        assert!(msg.contains("api.openai.com"));
    }

    #[test]
    fn body_puts_context_first_and_omits_unset_temperature() {
        let client = OpenAIClient::new("gpt-5".to_string(), "k".to_string(), None, 2000);
        let body = client.request_body("judge this", Some(&["be strict".to_string()]));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be strict");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["max_completion_tokens"], 2000);
        assert!(body.get("temperature").is_none());

        let client = OpenAIClient::new("gpt-4.1".to_string(), "k".to_string(), Some(0.0), 10);
        assert_eq!(client.request_body("x", None)["temperature"], 0.0);
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = OpenAIClient::new("m".to_string(), "k".to_string(), None, 1)
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn parses_content_model_and_usage() {
        let raw = json!({
            "model": "gpt-4.1-2025-04-14",
            "choices": [{ "message": { "role": "assistant", "content": "  True \n" } }],
            "usage": { "prompt_tokens": 812, "completion_tokens": 1 }
        });
        let resp = parse_completion(&raw, "gpt-4.1").unwrap();
        assert_eq!(resp.text, "True");
        assert_eq!(resp.model, "gpt-4.1-2025-04-14");
        assert_eq!(resp.meta["usage"]["input_tokens"], 812);
        assert_eq!(resp.meta["usage"]["output_tokens"], 1);
    }

    #[test]
    fn missing_content_is_an_error() {
        let err = parse_completion(&json!({ "choices": [] }), "m").unwrap_err();
        assert!(err.to_string().contains("missing content"));
    }
}
