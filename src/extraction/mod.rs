//! Turn-batched LLM fact extraction.
//!
//! Every N conversation turns per session, the extractor asks an LLM to
//! distil user-centric facts from recent history, then persists each fact
//! through the deduplicator: a new memory, or an update of a
//! semantically-equivalent existing one.
//!
//! All LLM and parse failures degrade to "no facts extracted" and are
//! logged; they never fail the surrounding response.

// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

mod dedup;

pub use dedup::{DedupAction, DeduplicationResult, check_deduplication};

use crate::config::{DeduplicationSettings, ExtractionConfig};
use crate::llm::{ChatClient, ChatParams};
use crate::models::{ExtractedFact, Memory, MemoryType, Message};
use crate::storage::MemoryStore;
use crate::{CancellationToken, Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

/// System prompt for fact extraction.
const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a memory extraction system. Extract important USER information from conversations.

CRITICAL RULES:
1. Extract ONLY facts stated by or about the USER
2. DO NOT extract assistant suggestions, recommendations, or general knowledge
3. ALWAYS include context - never extract isolated values
4. Use self-contained phrases that make sense without the conversation
5. Return ONLY valid JSON - no explanations or markdown
6. ALWAYS phrase facts as STATEMENTS, never as questions
7. Include CONSTRAINTS and LIMITATIONS explicitly (cannot, must not, excluded, etc.)

MEMORY TYPES:

"semantic" - User's facts, preferences, constraints, knowledge:
  - Personal info: "User's name is Alex", "User works at Acme Corp"
  - Preferences: "User prefers window seats", "User likes spicy food"
  - Constraints: "User is allergic to shellfish", "User's budget is $5000"
  - Limitations: "User cannot use AWS", "User must deploy on Azure only"

"procedural" - User's personal workflows or processes they EXPLICITLY describe:
  - "User's morning routine: check Slack, review PRs, then standup at 9am"
  - "User deploys code by: running tests, then pushing to staging, then production"
  NOTE: This is for USER's own processes, NOT assistant recommendations!

"episodic" - Dated events involving the user:
  - "On March 15, user discussed a vacation to Hawaii"

WHAT NOT TO EXTRACT:
- Assistant suggestions ("You should try the seafood restaurant")
- General knowledge ("Python is a programming language")
- Hypotheticals ("If I had more time, I would...")
- Questions (never phrase as "What is user's budget?" - use statements!)

EXAMPLES:
GOOD: [{"type": "semantic", "content": "User is lactose intolerant"}]
GOOD: [{"type": "semantic", "content": "User cannot use AWS due to company policy"}]
GOOD: [{"type": "procedural", "content": "User's code review process: check tests, review logic, then check style"}]
BAD:  [{"type": "semantic", "content": "What is the user's budget?"}] (question form - use statement!)
BAD:  [{"type": "procedural", "content": "To improve code: add more tests"}] (assistant advice, not user's process)

Return JSON array. Empty array [] if nothing worth remembering about the USER."#;

/// Matches a markdown code fence (```json ... ``` or ``` ... ```) and
/// captures its body.
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.+?)\s*```").expect("static regex: code fence")
});

/// Context overlap added to each extraction batch, in messages.
const BATCH_CONTEXT_OVERLAP: usize = 5;

/// A fact as emitted by the LLM, before validation.
#[derive(Debug, Deserialize)]
struct RawFact {
    #[serde(rename = "type", default)]
    fact_type: String,
    #[serde(default)]
    content: String,
}

/// Extracts facts from conversation history and persists them with
/// deduplication.
///
/// Safe for concurrent calls across sessions; the per-session turn-count
/// map behind a single mutex is the only shared state. Within a session,
/// concurrent calls are serialised only around the counter increment, not
/// around the LLM call.
pub struct MemoryExtractor {
    config: ExtractionConfig,
    dedup_settings: DeduplicationSettings,
    client: Arc<dyn ChatClient>,
    store: Option<Arc<dyn MemoryStore>>,
    turn_counts: Mutex<HashMap<String, u64>>,
}

impl MemoryExtractor {
    /// Creates an extraction-only instance; [`Self::process_response`] will
    /// skip storage.
    #[must_use]
    pub fn new(config: ExtractionConfig, client: Arc<dyn ChatClient>) -> Self {
        Self {
            config,
            dedup_settings: DeduplicationSettings::default(),
            client,
            store: None,
            turn_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Creates an extractor that persists facts through the given store.
    ///
    /// The extractor holds the store purely through the [`MemoryStore`]
    /// contract, never a concrete backend handle.
    #[must_use]
    pub fn with_store(
        config: ExtractionConfig,
        client: Arc<dyn ChatClient>,
        store: Arc<dyn MemoryStore>,
    ) -> Self {
        Self {
            config,
            dedup_settings: DeduplicationSettings::default(),
            client,
            store: Some(store),
            turn_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the deduplication thresholds.
    #[must_use]
    pub fn with_dedup_settings(mut self, settings: DeduplicationSettings) -> Self {
        self.dedup_settings = settings;
        self
    }

    /// Extracts memorable facts from a conversation.
    ///
    /// Pure extraction; nothing is stored. Returns an empty list when
    /// extraction is disabled, the history is empty, or the LLM call or
    /// response parsing fails (including cancellation).
    #[must_use]
    pub fn extract_facts(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Vec<ExtractedFact> {
        if !self.config.is_configured() {
            tracing::debug!("Fact extraction disabled or not configured");
            return Vec::new();
        }
        if messages.is_empty() {
            return Vec::new();
        }

        let conversation = messages
            .iter()
            .map(|message| format!("[{}]: {}", message.role, message.content))
            .collect::<Vec<_>>()
            .join("\n");
        let user_prompt = format!(
            "Extract important information from this conversation:\n\n{conversation}\n\nReturn JSON array:"
        );

        let params = ChatParams {
            model: self.config.model.clone(),
            max_tokens: self.config.effective_max_tokens(),
            temperature: self.config.effective_temperature(),
            timeout: self.config.effective_timeout(),
        };

        let reply = match self.client.chat(
            &[
                Message::system(EXTRACTION_SYSTEM_PROMPT),
                Message::user(user_prompt),
            ],
            &params,
            cancel,
        ) {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(error = %err, "Fact extraction failed");
                return Vec::new();
            },
        };

        match parse_extracted_facts(&reply) {
            Ok(facts) => {
                tracing::debug!(fact_count = facts.len(), "Extracted facts");
                facts
            },
            Err(err) => {
                tracing::warn!(error = %err, "Failed to parse extracted facts");
                Vec::new()
            },
        }
    }

    /// Extracts and stores memories from conversation history.
    ///
    /// Extraction fires once every `batch_size` turns per session; the
    /// batch is the trailing `batch_size + 5` messages so the last full
    /// window keeps its context. Extraction and storage failures are logged
    /// and swallowed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty session id and
    /// [`Error::InvalidUserId`] for an empty user id; both indicate a bug
    /// in the caller.
    pub fn process_response(
        &self,
        session_id: &str,
        user_id: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<()> {
        if session_id.is_empty() {
            return Err(Error::InvalidInput(
                "session id is required for memory extraction".to_string(),
            ));
        }
        if user_id.is_empty() {
            return Err(Error::InvalidUserId);
        }

        let Some(store) = &self.store else {
            tracing::debug!("Extraction skipped: no store attached");
            return Ok(());
        };
        if !store.is_enabled() {
            tracing::debug!("Extraction skipped: store disabled");
            return Ok(());
        }
        if !self.config.is_configured() {
            tracing::debug!("Extraction skipped: not configured");
            return Ok(());
        }

        let turn_count = {
            let mut counts = self
                .turn_counts
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let entry = counts.entry(session_id.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        let batch_size = self.config.effective_batch_size();
        if turn_count % batch_size != 0 {
            tracing::debug!(
                session_id = session_id,
                turn_count = turn_count,
                batch_size = batch_size,
                "Extraction skipped: not a batch turn"
            );
            return Ok(());
        }

        let batch_len = batch_size as usize + BATCH_CONTEXT_OVERLAP;
        let batch_start = history.len().saturating_sub(batch_len);
        let batch = &history[batch_start..];

        tracing::info!(
            session_id = session_id,
            user_id = user_id,
            turn_count = turn_count,
            batch_messages = batch.len(),
            "Running fact extraction"
        );

        let facts = self.extract_facts(batch, cancel);
        if facts.is_empty() {
            tracing::debug!(session_id = session_id, "No facts extracted from batch");
            return Ok(());
        }

        for fact in facts {
            if let Err(err) = self.store_with_deduplication(store, user_id, &fact, cancel) {
                tracing::warn!(
                    user_id = user_id,
                    error = %err,
                    "Failed to store extracted memory"
                );
                // Continue with the remaining facts
            }
        }

        Ok(())
    }

    fn store_with_deduplication(
        &self,
        store: &Arc<dyn MemoryStore>,
        user_id: &str,
        fact: &ExtractedFact,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let result = check_deduplication(
            store.as_ref(),
            user_id,
            &fact.content,
            fact.fact_type,
            &self.dedup_settings,
            cancel,
        );
        self.apply_dedup_result(store, user_id, fact, result)
    }

    fn apply_dedup_result(
        &self,
        store: &Arc<dyn MemoryStore>,
        user_id: &str,
        fact: &ExtractedFact,
        result: DeduplicationResult,
    ) -> Result<()> {
        match result.action {
            DedupAction::Update => {
                let Some(mut existing) = result.existing_memory else {
                    tracing::warn!(
                        user_id = user_id,
                        "Dedup requested update without an existing memory, creating instead"
                    );
                    return Self::create_new_memory(store, user_id, fact);
                };

                existing.content = fact.content.clone();
                existing.updated_at = chrono::Utc::now();
                let id = existing.id.clone();
                store.update(&id, &mut existing)?;

                tracing::info!(
                    memory_id = %id,
                    similarity = result.similarity,
                    "Updated existing memory from extracted fact"
                );
                Ok(())
            },
            DedupAction::Create => Self::create_new_memory(store, user_id, fact),
        }
    }

    fn create_new_memory(
        store: &Arc<dyn MemoryStore>,
        user_id: &str,
        fact: &ExtractedFact,
    ) -> Result<()> {
        let mut memory = Memory::new(fact.fact_type, fact.content.clone(), user_id)
            .with_source("conversation");
        store.store(&mut memory)?;

        tracing::info!(
            memory_id = %memory.id,
            memory_type = %memory.memory_type,
            "Created new memory from extracted fact"
        );
        Ok(())
    }
}

/// Parses an LLM extraction reply into validated facts.
///
/// The reply is stripped of a markdown code fence when present, then parsed
/// as a JSON array of `{type, content}` objects. Facts with blank content
/// or a type that does not normalise to semantic, procedural or episodic
/// are dropped.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when the cleaned reply is not a JSON
/// array. Callers on the response path treat this as "no facts".
pub fn parse_extracted_facts(content: &str) -> Result<Vec<ExtractedFact>> {
    let cleaned = clean_json_response(content);
    if cleaned.is_empty() || cleaned == "[]" {
        return Ok(Vec::new());
    }

    let raw_facts: Vec<RawFact> = serde_json::from_str(cleaned).map_err(|e| {
        Error::InvalidInput(format!(
            "failed to parse facts JSON: {e} (content: {})",
            truncate(cleaned, 100)
        ))
    })?;

    let mut facts = Vec::with_capacity(raw_facts.len());
    for raw in raw_facts {
        let content = raw.content.trim();
        if content.is_empty() {
            continue;
        }
        let Some(fact_type) = MemoryType::from_extraction(&raw.fact_type) else {
            tracing::warn!(fact_type = %raw.fact_type, "Skipping fact with invalid type");
            continue;
        };
        facts.push(ExtractedFact::new(fact_type, content));
    }

    Ok(facts)
}

/// Strips a markdown code fence wrapper from an LLM reply.
fn clean_json_response(content: &str) -> &str {
    let trimmed = content.trim();
    CODE_FENCE
        .captures(trimmed)
        .and_then(|captures| captures.get(1))
        .map_or(trimmed, |body| body.as_str().trim())
}

fn truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        let mut end = max_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Chat client stub with a scripted reply and call counter.
    struct StubChatClient {
        reply: String,
        calls: AtomicU32,
    }

    impl StubChatClient {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: AtomicU32::new(0),
            })
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ChatClient for StubChatClient {
        fn chat(
            &self,
            _messages: &[Message],
            _params: &ChatParams,
            cancel: &CancellationToken,
        ) -> Result<String> {
            cancel.check()?;
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn configured(batch_size: i64) -> ExtractionConfig {
        ExtractionConfig {
            enabled: true,
            endpoint: "http://llm:8000".to_string(),
            model: "extractor".to_string(),
            batch_size,
            ..ExtractionConfig::default()
        }
    }

    fn single_fact_reply() -> &'static str {
        r#"[{"type":"semantic","content":"User likes coffee"}]"#
    }

    // ------------------------------------------------------------------
    // Response parsing
    // ------------------------------------------------------------------

    #[test]
    fn test_parse_plain_json() {
        let facts = parse_extracted_facts(single_fact_reply()).unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].fact_type, MemoryType::Semantic);
        assert_eq!(facts[0].content, "User likes coffee");
    }

    #[test]
    fn test_parse_json_code_fence_matches_unwrapped() {
        let wrapped = format!("```json\n{}\n```", single_fact_reply());
        assert_eq!(
            parse_extracted_facts(&wrapped).unwrap(),
            parse_extracted_facts(single_fact_reply()).unwrap()
        );
    }

    #[test]
    fn test_parse_bare_code_fence_matches_unwrapped() {
        let wrapped = format!("```\n{}\n```", single_fact_reply());
        assert_eq!(
            parse_extracted_facts(&wrapped).unwrap(),
            parse_extracted_facts(single_fact_reply()).unwrap()
        );
    }

    #[test]
    fn test_parse_filters_invalid_entries() {
        let reply = "```json\n[{\"type\":\"semantic\",\"content\":\"U likes coffee\"},{\"type\":\"invalid\",\"content\":\"x\"},{\"type\":\"semantic\",\"content\":\"   \"}]\n```";
        let facts = parse_extracted_facts(reply).unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].content, "U likes coffee");
    }

    #[test]
    fn test_parse_normalises_type_case() {
        let reply = r#"[{"type":"  SEMANTIC ","content":"User likes tea"}]"#;
        let facts = parse_extracted_facts(reply).unwrap();
        assert_eq!(facts[0].fact_type, MemoryType::Semantic);
    }

    #[test]
    fn test_parse_empty_inputs() {
        assert!(parse_extracted_facts("").unwrap().is_empty());
        assert!(parse_extracted_facts("  ").unwrap().is_empty());
        assert!(parse_extracted_facts("[]").unwrap().is_empty());
        assert!(parse_extracted_facts("```json\n[]\n```").unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_json_errors() {
        assert!(parse_extracted_facts("not json at all").is_err());
        assert!(parse_extracted_facts("{\"type\":\"semantic\"}").is_err());
    }

    // ------------------------------------------------------------------
    // extract_facts
    // ------------------------------------------------------------------

    #[test]
    fn test_extract_facts_happy_path() {
        let client = StubChatClient::replying(single_fact_reply());
        let extractor = MemoryExtractor::new(configured(10), client);
        let facts = extractor.extract_facts(
            &[Message::user("I really like coffee")],
            &CancellationToken::new(),
        );
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn test_extract_facts_disabled_returns_empty() {
        let client = StubChatClient::replying(single_fact_reply());
        let extractor = MemoryExtractor::new(ExtractionConfig::default(), Arc::clone(&client) as Arc<dyn ChatClient>);
        let facts = extractor.extract_facts(
            &[Message::user("I really like coffee")],
            &CancellationToken::new(),
        );
        assert!(facts.is_empty());
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn test_extract_facts_empty_history_returns_empty() {
        let client = StubChatClient::replying(single_fact_reply());
        let extractor = MemoryExtractor::new(configured(10), Arc::clone(&client) as Arc<dyn ChatClient>);
        assert!(extractor.extract_facts(&[], &CancellationToken::new()).is_empty());
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn test_extract_facts_invalid_reply_returns_empty() {
        let client = StubChatClient::replying("sorry, I cannot help with that");
        let extractor = MemoryExtractor::new(configured(10), client);
        let facts = extractor.extract_facts(
            &[Message::user("I like coffee")],
            &CancellationToken::new(),
        );
        assert!(facts.is_empty());
    }

    #[test]
    fn test_extract_facts_cancellation_returns_empty() {
        let client = StubChatClient::replying(single_fact_reply());
        let extractor = MemoryExtractor::new(configured(10), client);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let facts = extractor.extract_facts(&[Message::user("I like coffee")], &cancel);
        assert!(facts.is_empty());
    }

    // ------------------------------------------------------------------
    // Turn batching
    // ------------------------------------------------------------------

    fn extractor_with_store(
        batch_size: i64,
        reply: &str,
    ) -> (Arc<StubChatClient>, Arc<InMemoryStore>, MemoryExtractor) {
        let client = StubChatClient::replying(reply);
        let store = Arc::new(InMemoryStore::new());
        let extractor = MemoryExtractor::with_store(
            configured(batch_size),
            Arc::clone(&client) as Arc<dyn ChatClient>,
            Arc::clone(&store) as Arc<dyn MemoryStore>,
        );
        (client, store, extractor)
    }

    #[test]
    fn test_extraction_fires_only_on_batch_multiples() {
        let (client, _store, extractor) = extractor_with_store(3, single_fact_reply());
        let history = vec![Message::user("I like coffee")];

        for turn in 1..=9 {
            extractor
                .process_response("session", "u1", &history, &CancellationToken::new())
                .unwrap();
            let expected = u32::try_from(turn / 3).unwrap();
            assert_eq!(client.call_count(), expected, "after turn {turn}");
        }
    }

    #[test]
    fn test_zero_batch_size_behaves_as_ten() {
        let (client, store, extractor) = extractor_with_store(0, single_fact_reply());
        let history = vec![Message::user("I like coffee")];

        for _ in 0..9 {
            extractor
                .process_response("session", "u1", &history, &CancellationToken::new())
                .unwrap();
        }
        assert_eq!(client.call_count(), 0);
        assert_eq!(store.count(), 0);

        extractor
            .process_response("session", "u1", &history, &CancellationToken::new())
            .unwrap();
        assert_eq!(client.call_count(), 1);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_sessions_have_independent_counters() {
        let (client, _store, extractor) = extractor_with_store(2, single_fact_reply());
        let history = vec![Message::user("I like coffee")];

        extractor
            .process_response("session_a", "u1", &history, &CancellationToken::new())
            .unwrap();
        extractor
            .process_response("session_b", "u1", &history, &CancellationToken::new())
            .unwrap();
        assert_eq!(client.call_count(), 0);

        extractor
            .process_response("session_a", "u1", &history, &CancellationToken::new())
            .unwrap();
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn test_batch_takes_trailing_window_with_overlap() {
        struct RecordingClient {
            seen_user_prompt: Mutex<String>,
        }

        impl ChatClient for RecordingClient {
            fn chat(
                &self,
                messages: &[Message],
                _params: &ChatParams,
                _cancel: &CancellationToken,
            ) -> Result<String> {
                *self.seen_user_prompt.lock().unwrap() = messages[1].content.clone();
                Ok("[]".to_string())
            }
        }

        let client = Arc::new(RecordingClient {
            seen_user_prompt: Mutex::new(String::new()),
        });
        let store = Arc::new(InMemoryStore::new());
        let extractor = MemoryExtractor::with_store(
            configured(2),
            Arc::clone(&client) as Arc<dyn ChatClient>,
            store as Arc<dyn MemoryStore>,
        );

        let history: Vec<Message> = (0..12)
            .map(|i| Message::user(format!("turn number {i}")))
            .collect();

        extractor
            .process_response("session", "u1", &history, &CancellationToken::new())
            .unwrap();
        extractor
            .process_response("session", "u1", &history, &CancellationToken::new())
            .unwrap();

        // batch_size (2) + overlap (5) trailing messages: turns 5..=11
        let prompt = client.seen_user_prompt.lock().unwrap();
        assert!(!prompt.contains("turn number 4"));
        assert!(prompt.contains("turn number 5"));
        assert!(prompt.contains("turn number 11"));
    }

    // ------------------------------------------------------------------
    // Storage with deduplication
    // ------------------------------------------------------------------

    #[test]
    fn test_extracted_fact_stored_with_source() {
        let (_client, store, extractor) = extractor_with_store(1, single_fact_reply());
        extractor
            .process_response(
                "session",
                "u1",
                &[Message::user("I like coffee")],
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(store.count(), 1);
        let results = store
            .retrieve(
                &crate::models::RetrieveOptions::new("coffee", "u1"),
                &CancellationToken::new(),
            )
            .unwrap();
        let memory = &results[0].memory;
        assert_eq!(memory.source.as_deref(), Some("conversation"));
        assert!((memory.importance - 0.5).abs() < f64::EPSILON);
        assert_eq!(memory.memory_type, MemoryType::Semantic);
    }

    #[test]
    fn test_repeated_fact_updates_instead_of_duplicating() {
        let (_client, store, extractor) = extractor_with_store(1, single_fact_reply());
        let history = vec![Message::user("I like coffee")];

        extractor
            .process_response("session", "u1", &history, &CancellationToken::new())
            .unwrap();
        extractor
            .process_response("session", "u1", &history, &CancellationToken::new())
            .unwrap();

        // The second extraction deduplicates into an update
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_update_without_existing_memory_falls_back_to_create() {
        let (_client, store, extractor) = extractor_with_store(1, single_fact_reply());
        let fact = ExtractedFact::new(MemoryType::Semantic, "User likes coffee");

        // A logic error upstream: update requested with no match attached
        let bogus = DeduplicationResult {
            action: DedupAction::Update,
            similarity: 0.99,
            existing_memory: None,
        };
        let store_dyn: Arc<dyn MemoryStore> = Arc::clone(&store) as Arc<dyn MemoryStore>;
        extractor
            .apply_dedup_result(&store_dyn, "u1", &fact, bogus)
            .unwrap();

        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_process_response_requires_session_and_user() {
        let (_client, _store, extractor) = extractor_with_store(1, single_fact_reply());
        assert!(matches!(
            extractor.process_response("", "u1", &[], &CancellationToken::new()),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            extractor.process_response("session", "", &[], &CancellationToken::new()),
            Err(Error::InvalidUserId)
        ));
    }

    #[test]
    fn test_process_response_without_store_is_noop() {
        let client = StubChatClient::replying(single_fact_reply());
        let extractor = MemoryExtractor::new(configured(1), Arc::clone(&client) as Arc<dyn ChatClient>);
        extractor
            .process_response(
                "session",
                "u1",
                &[Message::user("I like coffee")],
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn test_concurrent_sessions_extract_in_parallel() {
        let (client, store, extractor) = extractor_with_store(1, single_fact_reply());
        let extractor = Arc::new(extractor);

        let mut handles = Vec::new();
        for session in 0..4 {
            let extractor = Arc::clone(&extractor);
            handles.push(std::thread::spawn(move || {
                for _ in 0..5 {
                    extractor
                        .process_response(
                            &format!("session_{session}"),
                            &format!("user_{session}"),
                            &[Message::user("I like coffee")],
                            &CancellationToken::new(),
                        )
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(client.call_count(), 20);
        // Each user deduplicates into a single memory
        assert_eq!(store.count(), 4);
    }
}
