//! Vector database memory store.
//!
//! Production backend: memories live in an external vector database behind
//! the [`VectorClient`] trait, searched with HNSW cosine similarity and
//! scoped by boolean filter expressions over scalar columns. Vector search
//! is the one retryable operation and runs through the bounded retry policy
//! in [`crate::storage::retry`].

mod client;
mod http;

pub use client::{
    CollectionSchema, FieldSchema, FieldType, HnswParams, MemoryRow, ScoredRow, SearchRequest,
    VectorClient,
};
pub use http::HttpVectorClient;

use super::MemoryStore;
use super::retry::with_retries;
use crate::config::VectorStoreConfig;
use crate::embedding::Embedder;
use crate::models::{Memory, MemoryId, MemoryScope, MemoryType, RetrieveOptions, RetrieveResult};
use crate::{CancellationToken, Error, Result};
use chrono::{TimeZone, Utc};
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};

/// Scalar columns returned by queries and searches.
const OUTPUT_FIELDS: [&str; 8] = [
    "id",
    "user_id",
    "project_id",
    "memory_type",
    "content",
    "importance",
    "created_at",
    "metadata",
];

/// Memory store backed by an external vector database.
///
/// The RPC client is assumed internally thread-safe, so no local lock wraps
/// client calls; a reader/writer lock serializes only schema bootstrap
/// against first-writer races. Retrieval does not rewrite `accessed_at` or
/// `access_count` — writes on the search path are costly on this backend.
pub struct VectorMemoryStore {
    client: Arc<dyn VectorClient>,
    embedder: Arc<dyn Embedder>,
    config: VectorStoreConfig,
    dimension: RwLock<usize>,
}

impl VectorMemoryStore {
    /// Connects the store and bootstraps the collection.
    ///
    /// On first use this probes the embedding model for its dimension,
    /// declares the schema, builds the HNSW cosine index and loads the
    /// collection for serving.
    ///
    /// # Errors
    ///
    /// Returns an error when the dimension probe or any bootstrap RPC
    /// fails.
    pub fn new(
        client: Arc<dyn VectorClient>,
        embedder: Arc<dyn Embedder>,
        config: VectorStoreConfig,
    ) -> Result<Self> {
        let store = Self {
            client,
            embedder,
            config,
            dimension: RwLock::new(0),
        };
        store.initialize_collection()?;
        Ok(store)
    }

    fn initialize_collection(&self) -> Result<()> {
        let mut dimension = self
            .dimension
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // Probe the embedding model for its dimension
        let probe = self.embedder.embed("test")?;
        if probe.is_empty() {
            return Err(Error::operation(
                "collection_bootstrap",
                "embedding probe returned empty vector",
            ));
        }
        *dimension = probe.len();

        let collection = &self.config.collection;
        if self.client.has_collection(collection)? {
            tracing::debug!(collection = %collection, "Collection already exists");
            if let Err(err) = self.client.load_collection(collection) {
                tracing::warn!(
                    collection = %collection,
                    error = %err,
                    "Failed to load existing collection"
                );
            }
            return Ok(());
        }

        let schema = CollectionSchema {
            name: collection.clone(),
            description: "Agentic memory storage for cross-session recall".to_string(),
            fields: vec![
                FieldSchema::primary_varchar("id", 64),
                FieldSchema::varchar("user_id", 128),
                FieldSchema::varchar("project_id", 128),
                FieldSchema::varchar("memory_type", 32),
                FieldSchema::varchar("content", 65_535),
                FieldSchema::float("importance"),
                FieldSchema::int64("created_at"),
                FieldSchema::varchar("metadata", 65_535),
                FieldSchema::float_vector("embedding", *dimension),
            ],
        };
        self.client.create_collection(&schema)?;

        let index = HnswParams {
            m: self.config.effective_m(),
            ef_construction: self.config.effective_ef_construction(),
        };
        self.client.create_index(collection, "embedding", &index)?;
        self.client.load_collection(collection)?;

        tracing::info!(
            collection = %collection,
            dimension = *dimension,
            m = index.m,
            ef_construction = index.ef_construction,
            "Created collection with HNSW index"
        );
        Ok(())
    }

    fn declared_dimension(&self) -> usize {
        *self
            .dimension
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn resolve_threshold(&self, opts: &RetrieveOptions) -> f32 {
        if opts.threshold > 0.0 {
            opts.threshold
        } else if self.config.similarity_threshold > 0.0 {
            self.config.similarity_threshold
        } else {
            RetrieveOptions::DEFAULT_THRESHOLD
        }
    }

    fn resolve_limit(&self, opts: &RetrieveOptions) -> usize {
        if opts.limit > 0 {
            opts.limit
        } else if self.config.top_k > 0 {
            self.config.top_k
        } else {
            RetrieveOptions::DEFAULT_LIMIT
        }
    }

    fn memory_to_row(memory: &Memory) -> MemoryRow {
        MemoryRow {
            id: memory.id.to_string(),
            user_id: memory.user_id.clone(),
            project_id: memory.project_id.clone().unwrap_or_default(),
            memory_type: memory.memory_type.as_str().to_string(),
            content: memory.content.clone(),
            importance: memory.importance as f32,
            created_at: memory.created_at.timestamp(),
            metadata: metadata_json(memory),
            embedding: memory.embedding.clone(),
        }
    }

    fn row_to_memory(row: MemoryRow) -> Memory {
        let metadata = inflate_metadata(&row.metadata);
        let source = metadata
            .get("source")
            .and_then(Value::as_str)
            .map(str::to_string);
        let created_at = Utc
            .timestamp_opt(row.created_at, 0)
            .single()
            .unwrap_or_else(Utc::now);
        let memory_type = MemoryType::parse(&row.memory_type).unwrap_or_else(|| {
            tracing::warn!(
                memory_id = %row.id,
                memory_type = %row.memory_type,
                "Unknown stored memory type, treating as semantic"
            );
            MemoryType::Semantic
        });

        Memory {
            id: MemoryId::new(row.id),
            memory_type,
            content: row.content,
            embedding: row.embedding,
            user_id: row.user_id,
            project_id: (!row.project_id.is_empty()).then_some(row.project_id),
            source,
            metadata,
            created_at,
            updated_at: created_at,
            accessed_at: created_at,
            access_count: 0,
            importance: f64::from(row.importance),
            ttl: None,
        }
    }
}

impl MemoryStore for VectorMemoryStore {
    fn store(&self, memory: &mut Memory) -> Result<()> {
        memory.validate()?;

        if memory.id.is_empty() {
            memory.id = MemoryId::generate();
        }
        memory.accessed_at = Utc::now();

        tracing::debug!(
            memory_id = %memory.id,
            content_length = memory.content.len(),
            "Generating embedding for memory"
        );
        let embedding = self.embedder.embed(&memory.content)?;
        if embedding.is_empty() {
            return Err(Error::operation(
                "memory_store",
                format!(
                    "embedding generation returned empty vector for content: {}",
                    truncate(&memory.content, 100)
                ),
            ));
        }

        let declared = self.declared_dimension();
        if declared != 0 && embedding.len() != declared {
            // Tolerant: log and still attempt the write
            tracing::warn!(
                memory_id = %memory.id,
                embedding_dimension = embedding.len(),
                declared_dimension = declared,
                "Embedding dimension does not match collection schema"
            );
        }
        memory.embedding = embedding;

        let row = Self::memory_to_row(memory);
        self.client.insert(&self.config.collection, &[row])?;

        if let Err(err) = self.client.flush(&self.config.collection) {
            tracing::warn!(
                collection = %self.config.collection,
                error = %err,
                "Flush after insert failed"
            );
        }

        tracing::debug!(
            memory_id = %memory.id,
            user_id = %memory.user_id,
            "Stored memory"
        );
        Ok(())
    }

    fn retrieve(
        &self,
        opts: &RetrieveOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<RetrieveResult>> {
        opts.validate()?;
        cancel.check()?;

        let query_embedding = self.embedder.embed(&opts.query)?;
        let filter = retrieval_filter(opts);
        let threshold = self.resolve_threshold(opts);
        let limit = self.resolve_limit(opts);

        let request_fields: Vec<&str> = OUTPUT_FIELDS.to_vec();
        let hits = with_retries("vector_search", cancel, || {
            self.client.search(&SearchRequest {
                collection: &self.config.collection,
                filter: &filter,
                vector: &query_embedding,
                top_k: opts.effective_top_k(),
                ef: self.config.effective_ef(),
                output_fields: &request_fields,
            })
        })?;

        tracing::debug!(
            user_id = %opts.user_id,
            raw_hits = hits.len(),
            threshold = threshold,
            "Vector search returned candidates"
        );

        let mut results: Vec<RetrieveResult> = hits
            .into_iter()
            .filter(|hit| hit.score >= threshold)
            .map(|hit| RetrieveResult::new(Self::row_to_memory(hit.row), hit.score))
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.memory.created_at.cmp(&b.memory.created_at))
        });
        results.truncate(limit);

        Ok(results)
    }

    fn get(&self, id: &MemoryId) -> Result<Memory> {
        let rows = self.client.query(
            &self.config.collection,
            &id_filter(id),
            &OUTPUT_FIELDS,
        )?;
        rows.into_iter()
            .next()
            .map(Self::row_to_memory)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn update(&self, id: &MemoryId, memory: &mut Memory) -> Result<()> {
        // The backend has no in-place update; delete then re-insert under
        // the same id
        self.forget(id)?;
        memory.id = id.clone();
        memory.updated_at = Utc::now();
        self.store(memory)
    }

    fn forget(&self, id: &MemoryId) -> Result<()> {
        let existing = self
            .client
            .query(&self.config.collection, &id_filter(id), &["id"])?;
        if existing.is_empty() {
            return Err(Error::NotFound(id.to_string()));
        }
        self.client.delete(&self.config.collection, &id_filter(id))
    }

    fn forget_by_scope(&self, scope: &MemoryScope) -> Result<()> {
        let Some(filter) = scope_filter(scope) else {
            return Ok(());
        };
        self.client.delete(&self.config.collection, &filter)
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn close(&self) -> Result<()> {
        self.client.close()
    }
}

/// Escapes a value for use inside a double-quoted filter literal.
fn escape_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn id_filter(id: &MemoryId) -> String {
    format!("id == \"{}\"", escape_value(id.as_str()))
}

/// AND of the user scope with optional project and type narrowing.
fn retrieval_filter(opts: &RetrieveOptions) -> String {
    let mut filter = format!("user_id == \"{}\"", escape_value(&opts.user_id));
    if let Some(project_id) = &opts.project_id {
        filter.push_str(&format!(
            " && project_id == \"{}\"",
            escape_value(project_id)
        ));
    }
    if !opts.types.is_empty() {
        let types = opts
            .types
            .iter()
            .map(|t| format!("memory_type == \"{}\"", t.as_str()))
            .collect::<Vec<_>>()
            .join(" || ");
        filter.push_str(&format!(" && ({types})"));
    }
    filter
}

/// Filter for a deletion scope; `None` when the scope is empty.
fn scope_filter(scope: &MemoryScope) -> Option<String> {
    let mut clauses = Vec::new();
    if let Some(user_id) = &scope.user_id {
        clauses.push(format!("user_id == \"{}\"", escape_value(user_id)));
    }
    if let Some(project_id) = &scope.project_id {
        clauses.push(format!("project_id == \"{}\"", escape_value(project_id)));
    }
    if let Some(memory_type) = scope.memory_type {
        clauses.push(format!("memory_type == \"{}\"", memory_type.as_str()));
    }
    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" && "))
    }
}

/// Serialises a memory's metadata column, folding `source` into the map.
fn metadata_json(memory: &Memory) -> String {
    let mut map = memory.metadata.clone();
    if let Some(source) = &memory.source
        && !map.contains_key("source")
    {
        map.insert("source".to_string(), Value::String(source.clone()));
    }
    if map.is_empty() {
        String::new()
    } else {
        serde_json::to_string(&map).unwrap_or_default()
    }
}

/// Parses the persisted metadata column into a structured map.
///
/// The original JSON text is preserved under `_raw_source` for audit;
/// malformed JSON lands under `raw` and never fails the retrieval.
fn inflate_metadata(raw: &str) -> Map<String, Value> {
    let mut map = if raw.trim().is_empty() {
        Map::new()
    } else {
        match serde_json::from_str::<Map<String, Value>>(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::debug!(error = %err, "Malformed metadata JSON, preserving raw text");
                let mut fallback = Map::new();
                fallback.insert("raw".to_string(), Value::String(raw.to_string()));
                fallback
            },
        }
    };
    map.insert(
        "_raw_source".to_string(),
        Value::String(raw.to_string()),
    );
    map
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
