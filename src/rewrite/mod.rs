//! LLM-backed query rewriting.
//!
//! Follow-up queries like "how much was it again?" are useless as search
//! strings. The rewriter folds recent conversation context into the current
//! query to produce a self-contained search string, and degrades to the
//! original query on any failure — a degraded search beats a failed request.

use crate::config::QueryRewriteConfig;
use crate::llm::{ChatClient, ChatParams};
use crate::models::Message;
use crate::{CancellationToken, Result};
use std::sync::Arc;

/// Number of trailing history messages supplied as rewrite context.
const CONTEXT_MESSAGES: usize = 5;

const REWRITE_SYSTEM_PROMPT: &str = "You are a search query rewriter. Rewrite the user's \
latest query into a single self-contained search query. Resolve pronouns and references \
(it, that, there, the one) to the entities they refer to in the conversation. Preserve the \
user's intent exactly. Keep the result concise, at most 50 words. Return ONLY the rewritten \
query with no explanations or quotes.";

/// Rewrites vague queries into self-contained search strings.
pub struct QueryRewriter {
    config: QueryRewriteConfig,
    client: Arc<dyn ChatClient>,
}

impl QueryRewriter {
    /// Creates a rewriter over a shared chat client.
    #[must_use]
    pub fn new(config: QueryRewriteConfig, client: Arc<dyn ChatClient>) -> Self {
        Self { config, client }
    }

    /// Produces a self-contained search string for the current query.
    ///
    /// Returns the original query unchanged when rewriting is disabled, the
    /// history is empty, or the LLM call fails for any reason.
    #[must_use]
    pub fn rewrite(
        &self,
        history: &[Message],
        query: &str,
        cancel: &CancellationToken,
    ) -> String {
        if !self.config.is_configured() {
            tracing::debug!("Query rewrite disabled or not configured");
            return query.to_string();
        }
        if history.is_empty() {
            return query.to_string();
        }

        match self.call_llm(history, query, cancel) {
            Ok(rewritten) if !rewritten.is_empty() => {
                tracing::debug!(
                    original_length = query.len(),
                    rewritten_length = rewritten.len(),
                    "Rewrote search query"
                );
                rewritten
            },
            Ok(_) => query.to_string(),
            Err(err) => {
                tracing::warn!(error = %err, "Query rewriting failed, using original query");
                query.to_string()
            },
        }
    }

    fn call_llm(
        &self,
        history: &[Message],
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let context_start = history.len().saturating_sub(CONTEXT_MESSAGES);
        let context = history[context_start..]
            .iter()
            .map(|message| format!("[{}]: {}", message.role, message.content))
            .collect::<Vec<_>>()
            .join("\n");

        let user_prompt = format!(
            "Conversation so far:\n\n{context}\n\nCurrent query: {query}\n\nRewritten query:"
        );

        let params = ChatParams {
            model: self.config.model.clone(),
            max_tokens: self.config.effective_max_tokens(),
            temperature: self.config.effective_temperature(),
            timeout: self.config.effective_timeout(),
        };

        let reply = self.client.chat(
            &[
                Message::system(REWRITE_SYSTEM_PROMPT),
                Message::user(user_prompt),
            ],
            &params,
            cancel,
        )?;

        Ok(strip_quotes(reply.trim()).to_string())
    }
}

/// Strips one layer of surrounding single or double quotes.
fn strip_quotes(s: &str) -> &str {
    let trimmed = s.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return trimmed[1..trimmed.len() - 1].trim();
        }
    }
    trimmed
}
