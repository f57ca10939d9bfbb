//! Blocking HTTP chat client.

use super::{ChatClient, ChatCompletionRequest, ChatCompletionResponse, ChatParams};
use crate::models::Message;
use crate::{CancellationToken, Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// HTTP client timeouts for LLM requests.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Upper bound on any single request, applied at the client level.
    pub timeout_ms: u64,
    /// Connect timeout.
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            connect_timeout_ms: 5_000,
        }
    }
}

/// Builds the shared blocking HTTP client.
fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .build()
        .unwrap_or_default()
}

/// Chat client for OpenAI-compatible `/v1/chat/completions` endpoints.
///
/// One instance is created at construction and shared by the rewrite and
/// extraction paths; `reqwest` pools connections underneath. API keys, when
/// present, are held in a [`SecretString`] that zeroizes on drop.
pub struct HttpChatClient {
    endpoint: String,
    api_key: Option<SecretString>,
    client: reqwest::blocking::Client,
}

impl HttpChatClient {
    /// Creates a client for the given endpoint base URL.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            client: build_http_client(LlmHttpConfig::default()),
        }
    }

    /// Sets a bearer API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Replaces the HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: LlmHttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.endpoint.trim_end_matches('/')
        )
    }
}

impl ChatClient for HttpChatClient {
    fn chat(
        &self,
        messages: &[Message],
        params: &ChatParams,
        cancel: &CancellationToken,
    ) -> Result<String> {
        cancel.check()?;

        let request = ChatCompletionRequest {
            model: params.model.clone(),
            messages: messages.to_vec(),
            max_tokens: Some(params.max_tokens),
            temperature: Some(params.temperature),
            stream: false,
        };

        tracing::debug!(
            model = %params.model,
            message_count = messages.len(),
            timeout_ms = params.timeout.as_millis() as u64,
            "Sending LLM request"
        );

        let mut builder = self
            .client
            .post(self.completions_url())
            .timeout(params.timeout)
            .header("Content-Type", "application/json")
            .json(&request);

        if let Some(key) = &self.api_key {
            builder = builder.header(
                "Authorization",
                format!("Bearer {}", key.expose_secret()),
            );
        }

        let response = builder.send().map_err(|e| {
            let error_kind = if e.is_timeout() {
                "timeout"
            } else if e.is_connect() {
                "connect"
            } else {
                "request"
            };
            tracing::warn!(
                model = %params.model,
                error = %e,
                error_kind = error_kind,
                "LLM request failed"
            );
            Error::operation("llm_request", format!("{error_kind} error: {e}"))
        })?;

        cancel.check()?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(
                model = %params.model,
                status = %status,
                "LLM endpoint returned error status"
            );
            return Err(Error::operation(
                "llm_request",
                format!("endpoint returned status {status}"),
            ));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|e| Error::operation("llm_response", e))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::operation("llm_response", "no choices in response"))
    }
}
