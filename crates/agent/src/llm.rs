use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tracing::warn;

use orderdesk_core::config::{OracleConfig, OracleProvider};

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// HTTP adapter over an openai-compatible, anthropic, or ollama endpoint.
/// Timeout and retry budget come from the oracle configuration; retries are
/// plain re-sends since every call here is a read.
pub struct HttpLlmClient {
    http: reqwest::Client,
    config: OracleConfig,
}

impl HttpLlmClient {
    pub fn new(config: OracleConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("building the oracle http client")?;
        Ok(Self { http, config })
    }

    fn base_url(&self) -> &str {
        match (&self.config.base_url, self.config.provider) {
            (Some(base_url), _) => base_url.trim_end_matches('/'),
            (None, OracleProvider::OpenAi) => "https://api.openai.com",
            (None, OracleProvider::Anthropic) => "https://api.anthropic.com",
            (None, OracleProvider::Ollama) => "http://localhost:11434",
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .ok_or_else(|| anyhow!("oracle api key is not configured"))
    }

    async fn complete_once(&self, prompt: &str) -> Result<String> {
        match self.config.provider {
            OracleProvider::Ollama => {
                let response: Value = self
                    .http
                    .post(format!("{}/api/generate", self.base_url()))
                    .json(&json!({
                        "model": self.config.model,
                        "prompt": prompt,
                        "stream": false,
                    }))
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                response["response"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("ollama response is missing the `response` field"))
            }
            OracleProvider::OpenAi => {
                let response: Value = self
                    .http
                    .post(format!("{}/v1/chat/completions", self.base_url()))
                    .bearer_auth(self.api_key()?)
                    .json(&json!({
                        "model": self.config.model,
                        "messages": [{ "role": "user", "content": prompt }],
                    }))
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                response["choices"][0]["message"]["content"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("chat completion has no message content"))
            }
            OracleProvider::Anthropic => {
                let response: Value = self
                    .http
                    .post(format!("{}/v1/messages", self.base_url()))
                    .header("x-api-key", self.api_key()?)
                    .header("anthropic-version", "2023-06-01")
                    .json(&json!({
                        "model": self.config.model,
                        "max_tokens": 4096,
                        "messages": [{ "role": "user", "content": prompt }],
                    }))
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                response["content"][0]["text"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("message response has no text content"))
            }
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            match self.complete_once(prompt).await {
                Ok(text) => return Ok(text),
                Err(error) => {
                    warn!(
                        event_name = "oracle.llm_attempt_failed",
                        attempt,
                        error = %error,
                        "llm call failed"
                    );
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("llm call failed with no attempts made")))
    }
}
