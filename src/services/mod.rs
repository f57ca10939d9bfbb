//! Request/response wiring for the memory core.
//!
//! [`MemoryService`] ties the five components together around a gateway's
//! request cycle: on the request path it gates retrieval through the
//! decision filter, rewrites the query, searches the store and injects the
//! formatted context; on the response path it feeds conversation history to
//! the turn-batched extractor and optionally auto-stores the finished turn
//! as an episodic memory.
//!
//! Memory failure never aborts the enclosing request: every path here
//! degrades to "no memories" or "no facts" with a warning log.

use crate::config::{MemoryConfig, StoreBackend};
use crate::embedding::{Embedder, HashEmbedder, HttpEmbedder};
use crate::extraction::MemoryExtractor;
use crate::filter::{RequestSignals, should_search_memory};
use crate::inject::{format_memories_as_context, inject_system_message};
use crate::llm::{ChatClient, HttpChatClient};
use crate::models::{Memory, MemoryType, Message, RetrieveOptions, last_user_message};
use crate::rewrite::QueryRewriter;
use crate::session::derive_session_id;
use crate::storage::{HttpVectorClient, InMemoryStore, MemoryStore, VectorMemoryStore};
use crate::{CancellationToken, Result};
use serde_json::Value;
use std::sync::Arc;

/// Auto-stored assistant replies are truncated to this many bytes.
const AUTO_STORE_REPLY_LIMIT: usize = 1000;

/// The assembled memory core.
pub struct MemoryService {
    config: MemoryConfig,
    store: Arc<dyn MemoryStore>,
    rewriter: QueryRewriter,
    extractor: MemoryExtractor,
}

impl MemoryService {
    /// Builds the service from configuration alone.
    ///
    /// Selects the store backend, the embedder and HTTP chat clients for
    /// the rewrite and extraction endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error when the vector backend cannot be bootstrapped.
    pub fn from_config(config: MemoryConfig) -> Result<Self> {
        let store: Arc<dyn MemoryStore> = match config.store_backend {
            StoreBackend::InMemory => Arc::new(InMemoryStore::new()),
            StoreBackend::Vector => {
                let embedder: Arc<dyn Embedder> = if config.embedding.endpoint.is_empty() {
                    Arc::new(HashEmbedder::new())
                } else {
                    Arc::new(HttpEmbedder::new(
                        config.embedding.endpoint.clone(),
                        config.embedding.model.clone(),
                    ))
                };
                let client = Arc::new(HttpVectorClient::new(
                    config.vector.address.clone(),
                    config.vector.database.clone(),
                ));
                Arc::new(VectorMemoryStore::new(
                    client,
                    embedder,
                    config.vector.clone(),
                )?)
            },
        };

        let rewrite_client: Arc<dyn ChatClient> =
            Arc::new(HttpChatClient::new(config.query_rewrite.endpoint.clone()));
        let extract_client: Arc<dyn ChatClient> =
            Arc::new(HttpChatClient::new(config.extraction.endpoint.clone()));

        Ok(Self::new(config, store, rewrite_client, extract_client))
    }

    /// Builds the service from explicit components.
    #[must_use]
    pub fn new(
        config: MemoryConfig,
        store: Arc<dyn MemoryStore>,
        rewrite_client: Arc<dyn ChatClient>,
        extract_client: Arc<dyn ChatClient>,
    ) -> Self {
        let rewriter = QueryRewriter::new(config.query_rewrite.clone(), rewrite_client);
        let extractor = MemoryExtractor::with_store(
            config.extraction.clone(),
            extract_client,
            Arc::clone(&store),
        )
        .with_dedup_settings(config.deduplication.clone());

        Self {
            config,
            store,
            rewriter,
            extractor,
        }
    }

    /// The underlying store, for explicit writes by external collaborators.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    /// Returns whether the memory core is active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.store.is_enabled()
    }

    /// Request-path hook: retrieves relevant memories and injects them into
    /// the outbound request body.
    ///
    /// Returns the body unchanged whenever memory is disabled, the decision
    /// filter says skip, the user id is missing, retrieval fails, or
    /// nothing clears the similarity threshold.
    #[must_use]
    pub fn handle_request(
        &self,
        signals: RequestSignals,
        user_id: &str,
        history: &[Message],
        request_body: &[u8],
        cancel: &CancellationToken,
    ) -> Vec<u8> {
        if !self.is_enabled() {
            tracing::debug!("Memory disabled, skipping retrieval");
            return request_body.to_vec();
        }

        let Some(query) = last_user_message(history) else {
            return request_body.to_vec();
        };

        if !should_search_memory(signals, query) {
            return request_body.to_vec();
        }

        if user_id.is_empty() {
            tracing::debug!("No user id on request, skipping memory search");
            return request_body.to_vec();
        }

        let search_query = self.rewriter.rewrite(history, query, cancel);

        let opts = RetrieveOptions::new(search_query, user_id)
            .with_limit(self.config.effective_retrieval_limit())
            .with_threshold(self.config.effective_similarity_threshold());

        let memories = match self.store.retrieve(&opts, cancel) {
            Ok(memories) => memories,
            Err(err) => {
                // Degrade to "no memories"; the request continues without
                // context
                tracing::warn!(user_id = user_id, error = %err, "Memory retrieval failed");
                return request_body.to_vec();
            },
        };

        if memories.is_empty() {
            tracing::debug!(user_id = user_id, "No memories above threshold");
            return request_body.to_vec();
        }

        tracing::info!(
            user_id = user_id,
            memory_count = memories.len(),
            "Injecting memories into request"
        );
        let context = format_memories_as_context(&memories);
        inject_system_message(request_body, &context)
    }

    /// Response-path hook: counts the turn and, on batch boundaries, runs
    /// fact extraction over recent history.
    ///
    /// `session_id` may be empty for stateless chat completions, in which
    /// case a stable id is derived from the user and the conversation
    /// opening.
    ///
    /// # Errors
    ///
    /// Returns an error only for caller bugs: a missing user id.
    pub fn process_response(
        &self,
        session_id: &str,
        user_id: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let derived;
        let session_id = if session_id.is_empty() {
            derived = derive_session_id(user_id, history);
            derived.as_str()
        } else {
            session_id
        };

        self.extractor
            .process_response(session_id, user_id, history, cancel)
    }

    /// Records a finished conversation turn as an episodic memory.
    ///
    /// The assistant reply is pulled from the chat-completion response
    /// body; unparseable bodies and empty replies are skipped silently.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidUserId`] for an empty user id; store
    /// failures are surfaced for the caller to log.
    pub fn store_turn(
        &self,
        user_id: &str,
        project_id: Option<&str>,
        user_query: &str,
        response_body: &[u8],
    ) -> Result<Option<Memory>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let Some(reply) = extract_assistant_text(response_body) else {
            return Ok(None);
        };

        let content = format!(
            "User asked: {user_query}\n\nAssistant replied: {}",
            truncate(&reply, AUTO_STORE_REPLY_LIMIT)
        );
        let mut memory = Memory::new(MemoryType::Episodic, content, user_id).with_metadata(
            "source",
            Value::String("auto_store".to_string()),
        );
        if let Some(project_id) = project_id {
            memory = memory.with_project_id(project_id);
        }

        self.store.store(&mut memory)?;
        tracing::info!(
            memory_id = %memory.id,
            user_id = user_id,
            "Auto-stored conversation turn as episodic memory"
        );
        Ok(Some(memory))
    }

    /// Releases store resources.
    ///
    /// # Errors
    ///
    /// Returns backend shutdown errors.
    pub fn close(&self) -> Result<()> {
        self.store.close()
    }
}

/// Extracts the assistant's reply text from a chat-completion response
/// body, falling back from `message.content` to `delta.content` for
/// streaming shapes.
#[must_use]
pub fn extract_assistant_text(response_body: &[u8]) -> Option<String> {
    if response_body.is_empty() {
        return None;
    }

    let response: Value = serde_json::from_slice(response_body).ok()?;
    let choice = response.get("choices")?.as_array()?.first()?;

    let content = choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty())
        .or_else(|| {
            choice
                .pointer("/delta/content")
                .and_then(Value::as_str)
                .filter(|content| !content.is_empty())
        })?;

    Some(content.to_string())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
