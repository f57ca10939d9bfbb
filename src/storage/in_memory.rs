//! In-process memory store.

use super::MemoryStore;
use crate::models::{Memory, MemoryId, MemoryScope, RetrieveOptions, RetrieveResult};
use crate::{CancellationToken, Error, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-process implementation of [`MemoryStore`].
///
/// An id-to-memory map behind a single reader/writer lock. Relevance is
/// case-insensitive keyword overlap (`matched_words / query_words`), not
/// cosine similarity, so the cosine threshold of [`RetrieveOptions`] does
/// not apply here; any memory sharing at least one query word is a
/// candidate. Retrieval bumps `access_count` and `accessed_at` in place
/// under the retrieval lock.
///
/// Intended for development and tests; the vector backend serves
/// production.
pub struct InMemoryStore {
    memories: RwLock<HashMap<MemoryId, Memory>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            memories: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the number of stored memories.
    #[must_use]
    pub fn count(&self) -> usize {
        self.read_lock().len()
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<MemoryId, Memory>> {
        self.memories
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<MemoryId, Memory>> {
        self.memories
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore for InMemoryStore {
    fn store(&self, memory: &mut Memory) -> Result<()> {
        memory.validate()?;

        if memory.id.is_empty() {
            memory.id = MemoryId::generate();
        }
        memory.accessed_at = Utc::now();

        let mut memories = self.write_lock();
        memories.insert(memory.id.clone(), memory.clone());
        Ok(())
    }

    fn retrieve(
        &self,
        opts: &RetrieveOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<RetrieveResult>> {
        opts.validate()?;
        cancel.check()?;

        let query_lower = opts.query.to_lowercase();
        let query_words: Vec<&str> = query_lower
            .split(|c: char| !c.is_alphanumeric() && c != '$' && c != '\'')
            .filter(|word| !word.is_empty())
            .collect();
        if query_words.is_empty() {
            return Ok(Vec::new());
        }

        // Retrieval mutates access tracking, so the write lock doubles as
        // the retrieval lock.
        let mut memories = self.write_lock();
        let now = Utc::now();
        let mut results: Vec<RetrieveResult> = Vec::new();

        for memory in memories.values_mut() {
            if memory.user_id != opts.user_id {
                continue;
            }
            if let Some(project_id) = &opts.project_id
                && memory.project_id.as_deref() != Some(project_id.as_str())
            {
                continue;
            }
            if !opts.types.is_empty() && !opts.types.contains(&memory.memory_type) {
                continue;
            }

            let content_lower = memory.content.to_lowercase();
            let match_count = query_words
                .iter()
                .filter(|word| content_lower.contains(*word))
                .count();
            if match_count == 0 {
                continue;
            }

            let relevance = match_count as f32 / query_words.len() as f32;

            memory.access_count += 1;
            memory.accessed_at = now;

            results.push(RetrieveResult::new(memory.clone(), relevance));
        }
        drop(memories);

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.memory.created_at.cmp(&b.memory.created_at))
        });
        results.truncate(opts.effective_limit());

        Ok(results)
    }

    fn get(&self, id: &MemoryId) -> Result<Memory> {
        self.read_lock()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn update(&self, id: &MemoryId, memory: &mut Memory) -> Result<()> {
        let mut memories = self.write_lock();
        if !memories.contains_key(id) {
            return Err(Error::NotFound(id.to_string()));
        }

        memory.id = id.clone();
        memory.updated_at = Utc::now();
        memories.insert(id.clone(), memory.clone());
        Ok(())
    }

    fn forget(&self, id: &MemoryId) -> Result<()> {
        let mut memories = self.write_lock();
        if memories.remove(id).is_none() {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn forget_by_scope(&self, scope: &MemoryScope) -> Result<()> {
        if scope.is_empty() {
            return Ok(());
        }

        let mut memories = self.write_lock();
        memories.retain(|_, memory| !scope.matches(memory));
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemoryType;

    fn store_memory(store: &InMemoryStore, content: &str, user_id: &str) -> MemoryId {
        let mut memory = Memory::new(MemoryType::Semantic, content, user_id);
        store.store(&mut memory).unwrap();
        memory.id
    }

    #[test]
    fn test_store_assigns_id() {
        let store = InMemoryStore::new();
        let mut memory = Memory::new(MemoryType::Semantic, "User likes coffee", "u1");
        store.store(&mut memory).unwrap();
        assert!(memory.id.as_str().starts_with("mem_"));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_store_preserves_explicit_id() {
        let store = InMemoryStore::new();
        let mut memory = Memory::new(MemoryType::Semantic, "content", "u1");
        memory.id = MemoryId::new("mem_fixed01");
        store.store(&mut memory).unwrap();
        assert_eq!(store.get(&MemoryId::new("mem_fixed01")).unwrap().content, "content");
    }

    #[test]
    fn test_store_rejects_empty_user_id() {
        let store = InMemoryStore::new();
        let mut memory = Memory::new(MemoryType::Semantic, "content", "");
        assert!(matches!(
            store.store(&mut memory),
            Err(Error::InvalidUserId)
        ));
    }

    #[test]
    fn test_retrieve_matches_stored_content() {
        let store = InMemoryStore::new();
        store_memory(&store, "User's budget for Hawaii vacation is $10,000", "u1");

        let results = store
            .retrieve(
                &RetrieveOptions::new("What is my budget?", "u1"),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].content(),
            "User's budget for Hawaii vacation is $10,000"
        );
    }

    #[test]
    fn test_retrieve_isolates_users() {
        let store = InMemoryStore::new();
        store_memory(&store, "User's budget for Hawaii vacation is $10,000", "u1");

        let results = store
            .retrieve(
                &RetrieveOptions::new("What is my budget?", "u2"),
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_retrieve_filters_by_type() {
        let store = InMemoryStore::new();
        store_memory(&store, "User prefers window seats", "u1");

        let results = store
            .retrieve(
                &RetrieveOptions::new("window", "u1").with_types([MemoryType::Procedural]),
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_retrieve_filters_by_project() {
        let store = InMemoryStore::new();
        let mut memory = Memory::new(MemoryType::Semantic, "deploy target is eu-west", "u1")
            .with_project_id("proj_a");
        store.store(&mut memory).unwrap();

        let same_project = store
            .retrieve(
                &RetrieveOptions::new("deploy target", "u1").with_project_id("proj_a"),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(same_project.len(), 1);

        let other_project = store
            .retrieve(
                &RetrieveOptions::new("deploy target", "u1").with_project_id("proj_b"),
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(other_project.is_empty());
    }

    #[test]
    fn test_retrieve_orders_by_relevance() {
        let store = InMemoryStore::new();
        store_memory(&store, "budget", "u1");
        store_memory(&store, "budget for the Hawaii vacation", "u1");

        let results = store
            .retrieve(
                &RetrieveOptions::new("Hawaii vacation budget", "u1"),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].similarity >= results[1].similarity);
        assert_eq!(results[0].content(), "budget for the Hawaii vacation");
    }

    #[test]
    fn test_retrieve_applies_limit() {
        let store = InMemoryStore::new();
        for i in 0..10 {
            store_memory(&store, &format!("coffee note number {i}"), "u1");
        }

        let results = store
            .retrieve(
                &RetrieveOptions::new("coffee", "u1").with_limit(3),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_retrieve_updates_access_tracking() {
        let store = InMemoryStore::new();
        let id = store_memory(&store, "User likes coffee", "u1");

        store
            .retrieve(
                &RetrieveOptions::new("coffee", "u1"),
                &CancellationToken::new(),
            )
            .unwrap();

        let memory = store.get(&id).unwrap();
        assert_eq!(memory.access_count, 1);
        assert!(memory.accessed_at >= memory.created_at);
    }

    #[test]
    fn test_retrieve_cancelled() {
        let store = InMemoryStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = store.retrieve(&RetrieveOptions::new("query", "u1"), &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_get_missing_returns_not_found() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.get(&MemoryId::new("mem_missing")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_update_preserves_id() {
        let store = InMemoryStore::new();
        let id = store_memory(&store, "old content words", "u1");

        let mut replacement = Memory::new(MemoryType::Semantic, "new content words", "u1");
        store.update(&id, &mut replacement).unwrap();

        assert_eq!(replacement.id, id);
        let fetched = store.get(&id).unwrap();
        assert_eq!(fetched.content, "new content words");
        assert!(fetched.updated_at >= fetched.created_at);
    }

    #[test]
    fn test_update_missing_returns_not_found() {
        let store = InMemoryStore::new();
        let mut memory = Memory::new(MemoryType::Semantic, "content", "u1");
        assert!(matches!(
            store.update(&MemoryId::new("mem_missing"), &mut memory),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_forget() {
        let store = InMemoryStore::new();
        let id = store_memory(&store, "to be removed", "u1");
        store.forget(&id).unwrap();
        assert!(matches!(store.get(&id), Err(Error::NotFound(_))));
        assert!(matches!(store.forget(&id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_forget_by_scope_removes_matching() {
        let store = InMemoryStore::new();
        store_memory(&store, "first fact about coffee", "u1");
        store_memory(&store, "second fact about tea", "u1");
        store_memory(&store, "other user's fact", "u2");

        store
            .forget_by_scope(&MemoryScope::for_user("u1"))
            .unwrap();
        assert_eq!(store.count(), 1);

        let remaining = store
            .retrieve(
                &RetrieveOptions::new("fact", "u2"),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn test_forget_by_empty_scope_is_noop() {
        let store = InMemoryStore::new();
        store_memory(&store, "kept fact", "u1");
        store.forget_by_scope(&MemoryScope::default()).unwrap();
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_concurrent_store_and_retrieve() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryStore::new());
        let mut handles = Vec::new();

        for thread in 0..4 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..25 {
                    let mut memory = Memory::new(
                        MemoryType::Semantic,
                        format!("thread {thread} note {i} about coffee"),
                        format!("user_{thread}"),
                    );
                    store.store(&mut memory).unwrap();
                    store
                        .retrieve(
                            &RetrieveOptions::new("coffee", &format!("user_{thread}")),
                            &CancellationToken::new(),
                        )
                        .unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.count(), 100);
    }
}
