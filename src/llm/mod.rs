//! Shared LLM chat-completion client.
//!
//! Both the query rewriter and the fact extractor talk to an
//! OpenAI-compatible `/v1/chat/completions` endpoint through the
//! [`ChatClient`] trait. The production implementation is [`HttpChatClient`],
//! which reuses one connection-pooling HTTP client for the whole process and
//! imposes per-call deadlines per request rather than by mutating the client.

mod http;

pub use http::{HttpChatClient, LlmHttpConfig};

use crate::models::Message;
use crate::{CancellationToken, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-call chat parameters.
#[derive(Debug, Clone)]
pub struct ChatParams {
    /// Model name passed through to the endpoint.
    pub model: String,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Per-call deadline.
    pub timeout: Duration,
}

/// Trait for chat-completion providers.
///
/// Implementations must be safe to share across request-handling threads.
pub trait ChatClient: Send + Sync {
    /// Sends a chat completion and returns the first choice's content.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures, non-200 statuses, empty
    /// choice lists or cancellation.
    fn chat(
        &self,
        messages: &[Message],
        params: &ChatParams,
        cancel: &CancellationToken,
    ) -> Result<String>;
}

/// An OpenAI-compatible chat-completion request body.
#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub stream: bool,
}

/// An OpenAI-compatible chat-completion response body.
///
/// Only the fields the memory core reads; everything else is ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoiceMessage {
    #[serde(default)]
    pub content: String,
}
