//! Configuration management.
//!
//! A single nested [`MemoryConfig`] covers the whole memory core. All
//! zero-valued or absent numeric fields fall back to their documented
//! defaults at the point of use (the `effective_*` accessors); enabled-flags
//! default to `false`.

use serde::Deserialize;
use std::time::Duration;

/// Backend selection for the memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    /// In-process map with keyword scoring; development and tests.
    #[default]
    InMemory,
    /// External vector database; production.
    Vector,
}

/// Top-level configuration for the memory core.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryConfig {
    /// Master switch for all memory operations.
    #[serde(default)]
    pub enabled: bool,
    /// Which store backend to construct.
    #[serde(default)]
    pub store_backend: StoreBackend,
    /// Vector backend parameters.
    #[serde(default)]
    pub vector: VectorStoreConfig,
    /// Default retrieval limit when the caller passes zero.
    #[serde(default)]
    pub default_retrieval_limit: usize,
    /// Default similarity threshold when the caller passes zero.
    #[serde(default)]
    pub default_similarity_threshold: f32,
    /// Embedding backend parameters.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Fact extraction parameters.
    #[serde(default)]
    pub extraction: ExtractionConfig,
    /// Query rewrite parameters.
    #[serde(default)]
    pub query_rewrite: QueryRewriteConfig,
    /// Deduplication thresholds.
    #[serde(default)]
    pub deduplication: DeduplicationSettings,
}

impl MemoryConfig {
    /// Default retrieval limit.
    pub const DEFAULT_RETRIEVAL_LIMIT: usize = 5;

    /// Default similarity threshold.
    pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.6;

    /// Parses configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] when the document does not
    /// deserialize into a [`MemoryConfig`].
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| crate::Error::InvalidInput(format!("invalid memory config: {e}")))
    }

    /// Retrieval limit with the documented default applied.
    #[must_use]
    pub const fn effective_retrieval_limit(&self) -> usize {
        if self.default_retrieval_limit == 0 {
            Self::DEFAULT_RETRIEVAL_LIMIT
        } else {
            self.default_retrieval_limit
        }
    }

    /// Similarity threshold with the documented default applied.
    #[must_use]
    pub fn effective_similarity_threshold(&self) -> f32 {
        if self.default_similarity_threshold <= 0.0 {
            Self::DEFAULT_SIMILARITY_THRESHOLD
        } else {
            self.default_similarity_threshold
        }
    }
}

/// Vector backend parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreConfig {
    /// Vector database address, e.g. `http://localhost:19530`.
    #[serde(default = "VectorStoreConfig::default_address")]
    pub address: String,
    /// Optional database name.
    #[serde(default)]
    pub database: Option<String>,
    /// Collection name.
    #[serde(default = "VectorStoreConfig::default_collection")]
    pub collection: String,
    /// HNSW graph connectivity parameter.
    #[serde(default)]
    pub m: usize,
    /// HNSW index build parameter.
    #[serde(default)]
    pub ef_construction: usize,
    /// HNSW search-time parameter.
    #[serde(default)]
    pub ef: usize,
    /// Backend-level similarity threshold applied when the caller passes
    /// none.
    #[serde(default)]
    pub similarity_threshold: f32,
    /// Backend-level result cap applied when the caller passes none.
    #[serde(default)]
    pub top_k: usize,
}

impl VectorStoreConfig {
    /// Default HNSW `M`.
    pub const DEFAULT_M: usize = 16;

    /// Default HNSW `efConstruction`.
    pub const DEFAULT_EF_CONSTRUCTION: usize = 256;

    /// Default HNSW search-time `ef`.
    pub const DEFAULT_EF: usize = 64;

    fn default_address() -> String {
        "http://localhost:19530".to_string()
    }

    fn default_collection() -> String {
        "agentic_memory".to_string()
    }

    /// `M` with the documented default applied.
    #[must_use]
    pub const fn effective_m(&self) -> usize {
        if self.m == 0 { Self::DEFAULT_M } else { self.m }
    }

    /// `efConstruction` with the documented default applied.
    #[must_use]
    pub const fn effective_ef_construction(&self) -> usize {
        if self.ef_construction == 0 {
            Self::DEFAULT_EF_CONSTRUCTION
        } else {
            self.ef_construction
        }
    }

    /// Search-time `ef` with the documented default applied.
    #[must_use]
    pub const fn effective_ef(&self) -> usize {
        if self.ef == 0 { Self::DEFAULT_EF } else { self.ef }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            database: None,
            collection: Self::default_collection(),
            m: 0,
            ef_construction: 0,
            ef: 0,
            similarity_threshold: 0.0,
            top_k: 0,
        }
    }
}

/// Embedding backend parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingConfig {
    /// OpenAI-compatible embeddings endpoint. Empty selects the
    /// deterministic in-process embedder.
    #[serde(default)]
    pub endpoint: String,
    /// Embedding model name.
    #[serde(default)]
    pub model: String,
}

/// Fact extraction parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionConfig {
    /// Whether extraction runs at all.
    #[serde(default)]
    pub enabled: bool,
    /// OpenAI-compatible chat-completions endpoint base URL.
    #[serde(default)]
    pub endpoint: String,
    /// Model name passed through to the endpoint.
    #[serde(default)]
    pub model: String,
    /// Per-call deadline in seconds. Zero falls back to 30.
    #[serde(default)]
    pub timeout_seconds: u64,
    /// Completion token cap. Zero falls back to 500.
    #[serde(default)]
    pub max_tokens: u32,
    /// Sampling temperature. Zero falls back to 0.1.
    #[serde(default)]
    pub temperature: f64,
    /// Extraction fires every `batch_size` turns. Non-positive falls back
    /// to 10.
    #[serde(default)]
    pub batch_size: i64,
}

impl ExtractionConfig {
    /// Default per-call deadline.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default completion token cap.
    pub const DEFAULT_MAX_TOKENS: u32 = 500;

    /// Default sampling temperature.
    pub const DEFAULT_TEMPERATURE: f64 = 0.1;

    /// Default turn batch size.
    pub const DEFAULT_BATCH_SIZE: u64 = 10;

    /// Per-call deadline with the documented default applied.
    #[must_use]
    pub const fn effective_timeout(&self) -> Duration {
        if self.timeout_seconds == 0 {
            Self::DEFAULT_TIMEOUT
        } else {
            Duration::from_secs(self.timeout_seconds)
        }
    }

    /// Token cap with the documented default applied.
    #[must_use]
    pub const fn effective_max_tokens(&self) -> u32 {
        if self.max_tokens == 0 {
            Self::DEFAULT_MAX_TOKENS
        } else {
            self.max_tokens
        }
    }

    /// Temperature with the documented default applied.
    #[must_use]
    pub fn effective_temperature(&self) -> f64 {
        if self.temperature <= 0.0 {
            Self::DEFAULT_TEMPERATURE
        } else {
            self.temperature
        }
    }

    /// Batch size with the documented default applied; non-positive values
    /// behave as the default.
    #[must_use]
    pub const fn effective_batch_size(&self) -> u64 {
        if self.batch_size <= 0 {
            Self::DEFAULT_BATCH_SIZE
        } else {
            self.batch_size as u64
        }
    }

    /// Returns whether extraction is enabled and an endpoint is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.endpoint.is_empty()
    }
}

/// Query rewrite parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRewriteConfig {
    /// Whether query rewriting runs at all.
    #[serde(default)]
    pub enabled: bool,
    /// OpenAI-compatible chat-completions endpoint base URL.
    #[serde(default)]
    pub endpoint: String,
    /// Model name passed through to the endpoint.
    #[serde(default)]
    pub model: String,
    /// Per-call deadline in seconds. Zero falls back to 5.
    #[serde(default)]
    pub timeout_seconds: u64,
    /// Completion token cap. Zero falls back to 50.
    #[serde(default)]
    pub max_tokens: u32,
    /// Sampling temperature. Zero falls back to 0.1.
    #[serde(default)]
    pub temperature: f64,
}

impl QueryRewriteConfig {
    /// Default per-call deadline; rewriting sits on the request critical
    /// path so the budget is tight.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Default completion token cap, sized for a ~50 word query.
    pub const DEFAULT_MAX_TOKENS: u32 = 50;

    /// Default sampling temperature.
    pub const DEFAULT_TEMPERATURE: f64 = 0.1;

    /// Per-call deadline with the documented default applied.
    #[must_use]
    pub const fn effective_timeout(&self) -> Duration {
        if self.timeout_seconds == 0 {
            Self::DEFAULT_TIMEOUT
        } else {
            Duration::from_secs(self.timeout_seconds)
        }
    }

    /// Token cap with the documented default applied.
    #[must_use]
    pub const fn effective_max_tokens(&self) -> u32 {
        if self.max_tokens == 0 {
            Self::DEFAULT_MAX_TOKENS
        } else {
            self.max_tokens
        }
    }

    /// Temperature with the documented default applied.
    #[must_use]
    pub fn effective_temperature(&self) -> f64 {
        if self.temperature <= 0.0 {
            Self::DEFAULT_TEMPERATURE
        } else {
            self.temperature
        }
    }

    /// Returns whether rewriting is enabled and an endpoint is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.endpoint.is_empty()
    }
}

/// Deduplication thresholds.
///
/// Matches at or above `high_similarity` update the existing memory; the
/// gray zone between `gray_similarity` and `high_similarity` currently
/// resolves to creating a new memory but remains a distinct branch so the
/// policy can be tuned.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeduplicationSettings {
    /// Similarity at or above which a fact updates an existing memory.
    /// Non-positive falls back to 0.85.
    #[serde(default)]
    pub high_similarity: f32,
    /// Lower bound of the gray zone. Non-positive falls back to 0.60.
    #[serde(default)]
    pub gray_similarity: f32,
}

impl DeduplicationSettings {
    /// Default update threshold.
    pub const DEFAULT_HIGH_SIMILARITY: f32 = 0.85;

    /// Default gray-zone lower bound.
    pub const DEFAULT_GRAY_SIMILARITY: f32 = 0.60;

    /// Update threshold with the documented default applied.
    #[must_use]
    pub fn effective_high_similarity(&self) -> f32 {
        if self.high_similarity <= 0.0 {
            Self::DEFAULT_HIGH_SIMILARITY
        } else {
            self.high_similarity
        }
    }

    /// Gray-zone lower bound with the documented default applied.
    #[must_use]
    pub fn effective_gray_similarity(&self) -> f32 {
        if self.gray_similarity <= 0.0 {
            Self::DEFAULT_GRAY_SIMILARITY
        } else {
            self.gray_similarity
        }
    }
}
