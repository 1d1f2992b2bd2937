use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use medhist_common::{MedHistError, Result};
use serde::{Deserialize, Serialize};

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::openai::OpenAiClient;
use crate::retry::{RetryConfig, RetryingClient};

/// Environment variable consulted when no key is set in the config file.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Whole-request timeout. Unset means wait for the provider indefinitely.
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_max_concurrent() -> usize {
    2
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_url: None,
            temperature: None,
            max_tokens: None,
            timeout_ms: None,
            max_concurrent_requests: default_max_concurrent(),
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Resolve the API key: explicit config first, then `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }

        std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
    }
}

pub struct SemaphoredClient {
    inner: Arc<dyn LlmClient>,
    semaphore: Arc<tokio::sync::Semaphore>,
}

impl SemaphoredClient {
    pub fn new(inner: Arc<dyn LlmClient>, max_concurrent: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent.max(1))),
        }
    }
}

#[async_trait]
impl LlmClient for SemaphoredClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| MedHistError::Completion(format!("Semaphore acquire failed: {e}")))?;
        self.inner.complete(request).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Build the completion stack: provider, then retries, then a concurrency cap.
///
/// `api_key` is passed in already resolved so callers decide how a missing
/// credential is handled.
pub fn build_llm_client(config: &LlmConfig, api_key: Option<String>) -> Result<Arc<dyn LlmClient>> {
    let base_client: Box<dyn LlmClient> = match config.provider.as_str() {
        "openai" => {
            let client = OpenAiClient::new(config.api_url.clone(), config.model.clone(), api_key)
                .with_defaults(config.temperature, config.max_tokens);
            match config.timeout_ms {
                Some(ms) => Box::new(client.with_timeout(Duration::from_millis(ms))?),
                None => Box::new(client),
            }
        }
        other => {
            return Err(MedHistError::Config(format!(
                "Unknown LLM provider: {other}"
            )));
        }
    };

    let retrying: Box<dyn LlmClient> =
        Box::new(RetryingClient::new(base_client, config.retry.clone()));

    let semaphored = SemaphoredClient::new(Arc::from(retrying), config.max_concurrent_requests);

    Ok(Arc::new(semaphored))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_CONFIG: &str = r#"
provider = "openai"
model = "llama3"
api_url = "http://localhost:11434"
timeout_ms = 45000
max_concurrent_requests = 4

[retry]
max_retries = 5
initial_delay_ms = 1000
max_delay_ms = 60000
backoff_multiplier = 3.0
"#;

    #[test]
    fn deserialize_config_from_toml() {
        let config: LlmConfig = toml::from_str(TOML_CONFIG).unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.api_url.as_deref(), Some("http://localhost:11434"));
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout_ms, Some(45000));
        assert_eq!(config.max_concurrent_requests, 4);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 1000);
    }

    #[test]
    fn empty_table_uses_defaults() {
        let config: LlmConfig = toml::from_str("").unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_concurrent_requests, 2);
        assert_eq!(config.retry.max_retries, 0);
        assert!(config.timeout_ms.is_none());
    }

    #[test]
    fn explicit_key_wins_over_environment() {
        let config = LlmConfig {
            api_key: Some("sk-from-config".into()),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-from-config"));
    }

    #[test]
    fn build_openai_client() {
        let config = LlmConfig {
            timeout_ms: Some(1_000),
            ..Default::default()
        };
        let client = build_llm_client(&config, Some("sk-test".into())).unwrap();
        assert_eq!(client.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn build_unknown_provider_fails() {
        let config = LlmConfig {
            provider: "gemini".to_string(),
            model: "gemini-pro".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            build_llm_client(&config, None),
            Err(MedHistError::Config(_))
        ));
    }

    #[tokio::test]
    async fn semaphored_client_limits_concurrency() {
        use std::sync::atomic::{AtomicU32, Ordering};

        struct CountingClient {
            concurrent: Arc<AtomicU32>,
            max_seen: Arc<AtomicU32>,
        }

        #[async_trait]
        impl LlmClient for CountingClient {
            async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
                let current = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                self.concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(LlmResponse {
                    content: "ok".to_string(),
                    model: "test".to_string(),
                    usage: None,
                    finish_reason: None,
                })
            }
            fn model_name(&self) -> &str {
                "test"
            }
        }

        let concurrent = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));

        let inner = Arc::new(CountingClient {
            concurrent: concurrent.clone(),
            max_seen: max_seen.clone(),
        });

        let semaphored = Arc::new(SemaphoredClient::new(inner, 2));

        let mut handles = vec![];
        for _ in 0..6 {
            let client = semaphored.clone();
            handles.push(tokio::spawn(async move {
                client.complete(LlmRequest::default()).await.unwrap();
            }));
        }

        for h in handles {
            h.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }
}
