//! Memory decision filter.
//!
//! Decides whether a user query should trigger memory retrieval at all,
//! given classification signals produced earlier in the request pipeline.
//!
//! The fact-check classifier upstream was trained on general knowledge
//! questions ("capital of France"); personal-fact questions ("what is my
//! budget?") share their surface form but require memory. The
//! personal-pronoun override corrects this.

// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use regex::Regex;
use std::sync::LazyLock;

/// Classification signals consumed from the request pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSignals {
    /// The classifier flagged the query as a general fact-check question.
    pub fact_check_needed: bool,
    /// Tools are available that will answer the fact-check directly.
    pub has_tools_for_fact_check: bool,
}

/// Personal-pronoun indicators, matched by word rather than substring so
/// "Myanmar", "mythology" and "AI" do not trigger.
static PERSONAL_PRONOUNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(my|i|me|mine|i'm|i've|i'll|i'd|myself)\b")
        .expect("static regex: personal pronouns")
});

/// Standalone greeting patterns. Each allows trailing whitespace or
/// punctuation but no further content.
static GREETING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Lone salutations
        r"(?i)^(hi|hello|hey|howdy)(\s+there)?[\s!.,?]*$",
        // Time-of-day greetings, with or without the leading "good"
        r"(?i)^(good\s+)?(morning|afternoon|evening|night)[\s!.,?]*$",
        // Thanks
        r"(?i)^(thanks|thank\s+you|thx)[\s!.,?]*$",
        // Partings
        r"(?i)^(bye|goodbye|see\s+you|later)[\s!.,?]*$",
        // Short affirmations
        r"(?i)^(ok|okay|sure|yes|no|yep|nope)[\s!.,?]*$",
        // Informal hails
        r"(?i)^(what's\s+up|sup|yo)[\s!.,?]*$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static regex: greeting"))
    .collect()
});

/// Maximum trimmed length for a query to count as a standalone greeting.
const GREETING_MAX_LEN: usize = 25;

/// Returns whether the query contains a first-person pronoun as a word.
#[must_use]
pub fn contains_personal_pronoun(query: &str) -> bool {
    PERSONAL_PRONOUNS.is_match(query)
}

/// Returns whether the trimmed query is a standalone greeting.
///
/// True only for short queries (at most 25 characters) that consist
/// entirely of a salutation, time-of-day greeting, thanks, parting, short
/// affirmation or informal hail, with optional trailing punctuation.
#[must_use]
pub fn is_standalone_greeting(query: &str) -> bool {
    let trimmed = query.trim();
    if trimmed.is_empty() || trimmed.chars().count() > GREETING_MAX_LEN {
        return false;
    }
    GREETING_PATTERNS
        .iter()
        .any(|pattern| pattern.is_match(trimmed))
}

/// Decides whether the query should trigger a memory search.
///
/// Rules, first match wins:
///
/// 1. General fact-check with no personal pronoun → skip; the answer lives
///    in world knowledge, not user memory.
/// 2. A tool call will produce the answer → skip.
/// 3. Standalone greeting → skip.
/// 4. Otherwise → search.
#[must_use]
pub fn should_search_memory(signals: RequestSignals, query: &str) -> bool {
    if signals.fact_check_needed && !contains_personal_pronoun(query) {
        tracing::debug!("Memory decision: skip (general fact-check without personal pronoun)");
        return false;
    }
    if signals.has_tools_for_fact_check {
        tracing::debug!("Memory decision: skip (tool call will answer)");
        return false;
    }
    if is_standalone_greeting(query) {
        tracing::debug!("Memory decision: skip (standalone greeting)");
        return false;
    }
    true
}
