//! Memory types and identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Unique identifier for a memory.
///
/// Generated identifiers carry a `mem_` prefix followed by the first eight
/// hex characters of a v4 UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Creates a memory ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh memory ID.
    #[must_use]
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("mem_{}", &uuid[..8]))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns whether the ID is empty (not yet assigned).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MemoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self(String::new())
    }
}

/// Classification of a memory entry.
///
/// Only [`Semantic`](Self::Semantic), [`Procedural`](Self::Procedural) and
/// [`Episodic`](Self::Episodic) are produced by the extractor; the remaining
/// variants exist for memories written by external collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    /// Facts, preferences, constraints and knowledge about the user.
    Semantic,
    /// The user's own workflows and processes.
    Procedural,
    /// Past events and conversations, usually dated.
    Episodic,
    /// A recorded conversation turn.
    Conversation,
    /// A bare fact written by an external collaborator.
    Fact,
    /// Ambient context supplied by an external collaborator.
    Context,
    /// User profile data supplied by an external collaborator.
    User,
    /// Temporary session-scoped context, not persisted across sessions.
    Working,
}

impl MemoryType {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Procedural => "procedural",
            Self::Episodic => "episodic",
            Self::Conversation => "conversation",
            Self::Fact => "fact",
            Self::Context => "context",
            Self::User => "user",
            Self::Working => "working",
        }
    }

    /// Parses any memory type name, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "semantic" => Some(Self::Semantic),
            "procedural" => Some(Self::Procedural),
            "episodic" => Some(Self::Episodic),
            "conversation" => Some(Self::Conversation),
            "fact" => Some(Self::Fact),
            "context" => Some(Self::Context),
            "user" => Some(Self::User),
            "working" => Some(Self::Working),
            _ => None,
        }
    }

    /// Normalises an extractor-emitted type string.
    ///
    /// The extractor may only produce `semantic`, `procedural` and
    /// `episodic`; any other value (after trimming and lowercasing) yields
    /// `None`, the "invalid, drop this fact" marker.
    #[must_use]
    pub fn from_extraction(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "semantic" => Some(Self::Semantic),
            "procedural" => Some(Self::Procedural),
            "episodic" => Some(Self::Episodic),
            _ => None,
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single stored fact.
///
/// The embedding is populated by the storing backend and is never part of
/// the serialised JSON form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier, assigned at creation if unset.
    pub id: MemoryId,
    /// Memory classification.
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// Self-contained natural-language content.
    pub content: String,
    /// Dense embedding vector of the backend's declared dimension.
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// The memory owner. The sole tenancy key; required.
    pub user_id: String,
    /// Optional project scope within a user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Free-form origin tag, e.g. `conversation` or `auto_store`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Additional string-keyed properties.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last content update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Last retrieval timestamp.
    pub accessed_at: DateTime<Utc>,
    /// Number of times this memory was retrieved.
    #[serde(default)]
    pub access_count: u64,
    /// Relevance weight in `[0.0, 1.0]`.
    pub importance: f64,
    /// Optional absolute expiration time, enforced by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<DateTime<Utc>>,
}

impl Memory {
    /// Default importance assigned to new memories.
    pub const DEFAULT_IMPORTANCE: f64 = 0.5;

    /// Creates a new memory with timestamps set to now.
    #[must_use]
    pub fn new(
        memory_type: MemoryType,
        content: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: MemoryId::default(),
            memory_type,
            content: content.into(),
            embedding: Vec::new(),
            user_id: user_id.into(),
            project_id: None,
            source: None,
            metadata: Map::new(),
            created_at: now,
            updated_at: now,
            accessed_at: now,
            access_count: 0,
            importance: Self::DEFAULT_IMPORTANCE,
            ttl: None,
        }
    }

    /// Sets the project scope.
    #[must_use]
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Sets the origin tag.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the importance weight.
    #[must_use]
    pub const fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Validates required fields for a write.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidUserId`] when `user_id` is empty and
    /// [`crate::Error::InvalidInput`] when content is blank after trimming.
    pub fn validate(&self) -> crate::Result<()> {
        if self.user_id.is_empty() {
            return Err(crate::Error::InvalidUserId);
        }
        if self.content.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "memory content must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Filtering criteria for bulk memory operations.
///
/// Used by `forget_by_scope`. All fields are optional filters composed with
/// AND; an entirely empty scope matches nothing and deletes nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryScope {
    /// Restrict to a user.
    pub user_id: Option<String>,
    /// Restrict to a project.
    pub project_id: Option<String>,
    /// Restrict to a memory type.
    pub memory_type: Option<MemoryType>,
}

impl MemoryScope {
    /// Creates a scope matching all memories of a user.
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            project_id: None,
            memory_type: None,
        }
    }

    /// Narrows the scope to a project.
    #[must_use]
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Narrows the scope to a memory type.
    #[must_use]
    pub const fn with_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = Some(memory_type);
        self
    }

    /// Returns whether no filters are set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.project_id.is_none() && self.memory_type.is_none()
    }

    /// Returns whether a memory matches every set filter.
    #[must_use]
    pub fn matches(&self, memory: &Memory) -> bool {
        if let Some(user_id) = &self.user_id
            && memory.user_id != *user_id
        {
            return false;
        }
        if let Some(project_id) = &self.project_id
            && memory.project_id.as_deref() != Some(project_id.as_str())
        {
            return false;
        }
        if let Some(memory_type) = self.memory_type
            && memory.memory_type != memory_type
        {
            return false;
        }
        true
    }
}
