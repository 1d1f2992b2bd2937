use std::time::Duration;

use async_trait::async_trait;
use medhist_common::MedHistError;
use medhist_common::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{LlmClient, LlmRequest, LlmResponse, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OpenAiMessage {
    role: String,
    // Assistant messages carrying tool calls come back with `null` content.
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    model: String,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Client for any OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    default_temperature: Option<f32>,
    default_max_tokens: Option<u32>,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(base_url: Option<String>, model: String, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model,
            api_key,
            default_temperature: None,
            default_max_tokens: None,
            http_client: reqwest::Client::new(),
        }
    }

    /// Sampling settings used when a request leaves them unset.
    pub fn with_defaults(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.default_temperature = temperature;
        self.default_max_tokens = max_tokens;
        self
    }

    /// Rebuild the HTTP client with a whole-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MedHistError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(self)
    }

    fn build_messages(request: &LlmRequest) -> Vec<OpenAiMessage> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(ref system) = request.system_prompt {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }
        for msg in &request.messages {
            messages.push(OpenAiMessage {
                role: msg.role.as_str().to_string(),
                content: Some(msg.content.clone()),
            });
        }
        messages
    }

    fn build_request_body(&self, request: &LlmRequest) -> OpenAiRequest {
        OpenAiRequest {
            model: self.model.clone(),
            messages: Self::build_messages(request),
            temperature: request.temperature.or(self.default_temperature),
            max_tokens: request.max_tokens.or(self.default_max_tokens),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        debug!(model = %self.model, messages = body.messages.len(), "Sending chat completion");

        let mut http_req = self.http_client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| MedHistError::Completion(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(MedHistError::Completion(format!(
                "OpenAI API error {status}: {body_text}"
            )));
        }

        let oai_response: OpenAiResponse = response.json().await.map_err(|e| {
            MedHistError::Completion(format!("Failed to parse OpenAI response: {e}"))
        })?;

        let choice = oai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| MedHistError::Completion("No choices in OpenAI response".to_string()))?;

        let content = choice.message.content.ok_or_else(|| {
            MedHistError::Completion("OpenAI response contained no message content".to_string())
        })?;

        Ok(LlmResponse {
            content,
            model: oai_response.model,
            usage: oai_response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChatMessage, Role};

    #[test]
    fn request_body_matches_openai_format() {
        let client = OpenAiClient::new(None, "gpt-4o-mini".to_string(), Some("sk-test".to_string()));
        let request = LlmRequest {
            system_prompt: Some("You are a medical history assistant.".to_string()),
            messages: vec![ChatMessage {
                role: Role::User,
                content: "Relevant past medical history:\n".to_string(),
            }],
            temperature: Some(0.5),
            max_tokens: Some(512),
        };

        let json = serde_json::to_value(client.build_request_body(&request)).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["temperature"], 0.5);
        assert_eq!(json["max_tokens"], 512);

        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "You are a medical history assistant.");
        assert_eq!(messages[1]["role"], "user");
    }

    #[test]
    fn request_body_omits_unset_sampling_fields() {
        let client = OpenAiClient::new(None, "gpt-4o-mini".to_string(), None);
        let request = LlmRequest {
            system_prompt: None,
            messages: vec![ChatMessage::user("Hello")],
            temperature: None,
            max_tokens: None,
        };

        let json = serde_json::to_value(client.build_request_body(&request)).unwrap();

        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn configured_defaults_fill_unset_fields() {
        let client = OpenAiClient::new(None, "gpt-4o-mini".to_string(), None)
            .with_defaults(Some(0.2), Some(256));
        let mut request = LlmRequest::single("sys", "hi");

        let json = serde_json::to_value(client.build_request_body(&request)).unwrap();
        assert_eq!(json["max_tokens"], 256);

        request.max_tokens = Some(64);
        let json = serde_json::to_value(client.build_request_body(&request)).unwrap();
        assert_eq!(json["max_tokens"], 64);
        assert!(json["temperature"].is_number());
    }

    #[test]
    fn default_base_url_is_openai() {
        let client = OpenAiClient::new(None, "gpt-4o-mini".to_string(), None);
        assert_eq!(client.base_url, "https://api.openai.com");
    }

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let client = OpenAiClient::new(
            Some("http://localhost:11434/".to_string()),
            "llama3".to_string(),
            None,
        );
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn response_with_null_content_parses() {
        let json = r#"{
            "model": "gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": null}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 0}
        }"#;
        let parsed: OpenAiResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
