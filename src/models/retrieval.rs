//! Retrieval options and results.

use super::{Memory, MemoryId, MemoryType};
use serde_json::{Map, Value};

/// Configures a memory retrieval.
#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    /// Text query to embed and search. Must be non-empty.
    pub query: String,
    /// The user whose memories to search. Must be non-empty.
    pub user_id: String,
    /// Optional project scope.
    pub project_id: Option<String>,
    /// Filter by memory types; empty matches all.
    pub types: Vec<MemoryType>,
    /// Maximum results. Zero falls back to [`Self::DEFAULT_LIMIT`].
    pub limit: usize,
    /// Minimum cosine similarity. Non-positive falls back to
    /// [`Self::DEFAULT_THRESHOLD`].
    pub threshold: f32,
}

impl RetrieveOptions {
    /// Default result limit.
    pub const DEFAULT_LIMIT: usize = 5;

    /// Default cosine similarity cutoff.
    pub const DEFAULT_THRESHOLD: f32 = 0.6;

    /// Creates retrieval options for a query and user.
    #[must_use]
    pub fn new(query: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Sets the project scope.
    #[must_use]
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Restricts results to the given memory types.
    #[must_use]
    pub fn with_types(mut self, types: impl Into<Vec<MemoryType>>) -> Self {
        self.types = types.into();
        self
    }

    /// Sets the result limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the similarity threshold.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Result limit with the documented default applied.
    #[must_use]
    pub const fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            Self::DEFAULT_LIMIT
        } else {
            self.limit
        }
    }

    /// Similarity threshold with the documented default applied.
    #[must_use]
    pub fn effective_threshold(&self) -> f32 {
        if self.threshold <= 0.0 {
            Self::DEFAULT_THRESHOLD
        } else {
            self.threshold
        }
    }

    /// Raw candidate pool size requested from the backend before threshold
    /// filtering, widened so the post-filter trim still fills the limit.
    #[must_use]
    pub const fn effective_top_k(&self) -> usize {
        let widened = self.effective_limit() * 4;
        if widened > 20 { widened } else { 20 }
    }

    /// Validates required fields.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidUserId`] for an empty user id and
    /// [`crate::Error::InvalidInput`] for an empty query.
    pub fn validate(&self) -> crate::Result<()> {
        if self.user_id.is_empty() {
            return Err(crate::Error::InvalidUserId);
        }
        if self.query.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "retrieval query must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A retrieved memory with its relevance score.
#[derive(Debug, Clone)]
pub struct RetrieveResult {
    /// The matched memory.
    pub memory: Memory,
    /// Cosine similarity in `[0, 1]`, after backend normalisation.
    pub similarity: f32,
}

impl RetrieveResult {
    /// Creates a result from a memory and score.
    #[must_use]
    pub const fn new(memory: Memory, similarity: f32) -> Self {
        Self { memory, similarity }
    }

    /// The matched memory's id.
    #[must_use]
    pub const fn id(&self) -> &MemoryId {
        &self.memory.id
    }

    /// The matched memory's content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.memory.content
    }

    /// The matched memory's type.
    #[must_use]
    pub const fn memory_type(&self) -> MemoryType {
        self.memory.memory_type
    }

    /// The matched memory's inflated metadata.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.memory.metadata
    }
}
