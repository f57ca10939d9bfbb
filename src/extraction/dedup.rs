//! Semantic deduplication of extracted facts.
//!
//! Before a fact is persisted, the store is consulted for a
//! semantically-equivalent existing memory in the same user and type scope.
//! A strong match updates the existing memory in place instead of creating
//! a near-duplicate.

use crate::config::DeduplicationSettings;
use crate::models::{Memory, MemoryType, RetrieveOptions};
use crate::storage::MemoryStore;
use crate::CancellationToken;
use std::time::Instant;

/// How a fact should be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupAction {
    /// Persist as a new memory.
    Create,
    /// Overwrite the matched existing memory.
    Update,
}

impl std::fmt::Display for DedupAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// Outcome of a deduplication check.
#[derive(Debug, Clone)]
pub struct DeduplicationResult {
    /// The chosen action.
    pub action: DedupAction,
    /// Best-match similarity, 0.0 when nothing matched.
    pub similarity: f32,
    /// The best existing match, populated for [`DedupAction::Update`].
    pub existing_memory: Option<Memory>,
}

impl DeduplicationResult {
    /// A create decision with no match.
    #[must_use]
    pub const fn create() -> Self {
        Self {
            action: DedupAction::Create,
            similarity: 0.0,
            existing_memory: None,
        }
    }
}

/// Candidate pool requested from the store; only the best match matters.
const DEDUP_CANDIDATES: usize = 3;

/// Checks whether a fact duplicates an existing memory.
///
/// The store is queried with the fact's content, scoped strictly to the
/// caller's user and the fact's type: a fact of one type for one user is
/// never matched against memories of another type or user.
///
/// Policy: best similarity at or above `high_similarity` updates the
/// existing memory; the gray zone between `gray_similarity` and
/// `high_similarity` currently resolves to create, kept as its own branch
/// so tuning can move it later. Store errors degrade to create.
#[must_use]
pub fn check_deduplication(
    store: &dyn MemoryStore,
    user_id: &str,
    content: &str,
    fact_type: MemoryType,
    settings: &DeduplicationSettings,
    cancel: &CancellationToken,
) -> DeduplicationResult {
    let start = Instant::now();
    let high = settings.effective_high_similarity();
    let gray = settings.effective_gray_similarity();

    let opts = RetrieveOptions::new(content, user_id)
        .with_types([fact_type])
        .with_limit(DEDUP_CANDIDATES)
        .with_threshold(gray);

    let results = match store.retrieve(&opts, cancel) {
        Ok(results) => results,
        Err(err) => {
            tracing::warn!(
                user_id = user_id,
                error = %err,
                "Deduplication lookup failed, defaulting to create"
            );
            return DeduplicationResult::create();
        },
    };

    let duration_ms = start.elapsed().as_millis() as f64;
    let result = match results.into_iter().next() {
        Some(best) if best.similarity >= high => DeduplicationResult {
            action: DedupAction::Update,
            similarity: best.similarity,
            existing_memory: Some(best.memory),
        },
        Some(best) if best.similarity >= gray => {
            // Gray zone: related but not equivalent. Resolved as create for
            // now; this branch is the tuning point.
            DeduplicationResult {
                action: DedupAction::Create,
                similarity: best.similarity,
                existing_memory: Some(best.memory),
            }
        },
        _ => DeduplicationResult::create(),
    };

    metrics::histogram!(
        "memory_dedup_check_duration_ms",
        "action" => match result.action {
            DedupAction::Create => "create",
            DedupAction::Update => "update",
        }
    )
    .record(duration_ms);

    tracing::debug!(
        user_id = user_id,
        action = %result.action,
        similarity = result.similarity,
        "Deduplication check complete"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn store_with(contents: &[&str], user_id: &str) -> InMemoryStore {
        let store = InMemoryStore::new();
        for content in contents {
            let mut memory = Memory::new(MemoryType::Semantic, *content, user_id);
            store.store(&mut memory).unwrap();
        }
        store
    }

    fn check(
        store: &InMemoryStore,
        user_id: &str,
        content: &str,
        fact_type: MemoryType,
    ) -> DeduplicationResult {
        check_deduplication(
            store,
            user_id,
            content,
            fact_type,
            &DeduplicationSettings::default(),
            &CancellationToken::new(),
        )
    }

    #[test]
    fn test_exact_duplicate_updates() {
        let store = store_with(&["User's budget for Hawaii vacation is $10,000"], "u1");
        let result = check(
            &store,
            "u1",
            "User's budget for Hawaii vacation is $10,000",
            MemoryType::Semantic,
        );
        assert_eq!(result.action, DedupAction::Update);
        assert!(result.similarity >= 0.85);
        assert!(result.existing_memory.is_some());
    }

    #[test]
    fn test_different_topic_creates() {
        let store = store_with(&["User's budget for Hawaii vacation is $10,000"], "u1");
        let result = check(
            &store,
            "u1",
            "User likes chocolate ice cream",
            MemoryType::Semantic,
        );
        assert_eq!(result.action, DedupAction::Create);
    }

    #[test]
    fn test_gray_zone_resolves_to_create() {
        let store = store_with(&["User's budget for Hawaii vacation is $10,000"], "u1");
        // Shares words with the stored memory without being equivalent
        let result = check(
            &store,
            "u1",
            "User's vacation to Hawaii needs direct flights and a budget hotel by the beach",
            MemoryType::Semantic,
        );
        assert_eq!(result.action, DedupAction::Create);
        if result.existing_memory.is_some() {
            assert!(result.similarity < 0.85);
        }
    }

    #[test]
    fn test_best_match_selected_among_multiple() {
        let store = store_with(
            &[
                "User's budget for Hawaii vacation is $10,000",
                "User prefers direct flights",
                "User likes beach hotels",
            ],
            "u1",
        );
        let result = check(
            &store,
            "u1",
            "User's budget for Hawaii vacation is $10,000",
            MemoryType::Semantic,
        );
        assert_eq!(result.action, DedupAction::Update);
        assert_eq!(
            result.existing_memory.unwrap().content,
            "User's budget for Hawaii vacation is $10,000"
        );
    }

    #[test]
    fn test_user_isolation() {
        let store = store_with(&["User's budget for Hawaii vacation is $10,000"], "user1");
        let result = check(
            &store,
            "user2",
            "User's budget for Hawaii vacation is $10,000",
            MemoryType::Semantic,
        );
        assert_eq!(result.action, DedupAction::Create);
        assert!(result.existing_memory.is_none());
    }

    #[test]
    fn test_type_isolation() {
        let store = store_with(&["User's budget for Hawaii vacation is $10,000"], "u1");
        let result = check(
            &store,
            "u1",
            "User's budget for Hawaii vacation is $10,000",
            MemoryType::Procedural,
        );
        assert_eq!(result.action, DedupAction::Create);
        assert!(result.existing_memory.is_none());
    }

    #[test]
    fn test_store_failure_degrades_to_create() {
        let store = InMemoryStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        // Cancellation surfaces as a retrieval error; dedup must not
        // propagate it
        let result = check_deduplication(
            &store,
            "u1",
            "User likes coffee",
            MemoryType::Semantic,
            &DeduplicationSettings::default(),
            &cancel,
        );
        assert_eq!(result.action, DedupAction::Create);
        assert!(result.existing_memory.is_none());
    }

    #[test]
    fn test_custom_thresholds_respected() {
        let store = store_with(&["User's budget for Hawaii vacation is $10,000"], "u1");
        // With an impossible update threshold everything creates
        let settings = DeduplicationSettings {
            high_similarity: 1.1,
            gray_similarity: 0.1,
        };
        let result = check_deduplication(
            &store,
            "u1",
            "User's budget for Hawaii vacation is $10,000",
            MemoryType::Semantic,
            &settings,
            &CancellationToken::new(),
        );
        assert_eq!(result.action, DedupAction::Create);
    }
}
