//! Vector database client abstraction.
//!
//! Models the logical RPC surface the memory store needs from an external
//! vector database: collection lifecycle, HNSW indexing, row insertion,
//! filtered deletion and cosine similarity search. Implementations are
//! expected to be internally thread-safe; the store takes no lock around
//! client calls.

use crate::Result;

/// Scalar or vector column type in a collection schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Variable-length string with a maximum length.
    VarChar {
        /// Maximum stored length.
        max_length: usize,
    },
    /// 32-bit float.
    Float,
    /// 64-bit integer.
    Int64,
    /// Dense float vector of fixed dimension.
    FloatVector {
        /// The vector dimension.
        dim: usize,
    },
}

/// A single column declaration.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    /// Column name.
    pub name: &'static str,
    /// Column type.
    pub field_type: FieldType,
    /// Whether this column is the primary key.
    pub primary_key: bool,
}

impl FieldSchema {
    /// Declares a varchar column.
    #[must_use]
    pub const fn varchar(name: &'static str, max_length: usize) -> Self {
        Self {
            name,
            field_type: FieldType::VarChar { max_length },
            primary_key: false,
        }
    }

    /// Declares the varchar primary-key column.
    #[must_use]
    pub const fn primary_varchar(name: &'static str, max_length: usize) -> Self {
        Self {
            name,
            field_type: FieldType::VarChar { max_length },
            primary_key: true,
        }
    }

    /// Declares a float column.
    #[must_use]
    pub const fn float(name: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::Float,
            primary_key: false,
        }
    }

    /// Declares an int64 column.
    #[must_use]
    pub const fn int64(name: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::Int64,
            primary_key: false,
        }
    }

    /// Declares a float-vector column.
    #[must_use]
    pub const fn float_vector(name: &'static str, dim: usize) -> Self {
        Self {
            name,
            field_type: FieldType::FloatVector { dim },
            primary_key: false,
        }
    }
}

/// A collection declaration.
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    /// Collection name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Column declarations.
    pub fields: Vec<FieldSchema>,
}

/// HNSW index build parameters. Cosine is the only metric used.
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    /// Graph connectivity.
    pub m: usize,
    /// Build-time candidate list size.
    pub ef_construction: usize,
}

/// A stored memory row with its scalar columns and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryRow {
    /// Primary key.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Project scope; empty when unscoped.
    pub project_id: String,
    /// Memory type name.
    pub memory_type: String,
    /// Memory content.
    pub content: String,
    /// Importance weight.
    pub importance: f32,
    /// Creation time as Unix seconds.
    pub created_at: i64,
    /// Metadata as a JSON document.
    pub metadata: String,
    /// Embedding vector; empty on query results that omit it.
    pub embedding: Vec<f32>,
}

/// A search hit: row columns plus the similarity score.
#[derive(Debug, Clone)]
pub struct ScoredRow {
    /// The matched row.
    pub row: MemoryRow,
    /// Cosine similarity in `[0, 1]`.
    pub score: f32,
}

/// A similarity search request.
#[derive(Debug)]
pub struct SearchRequest<'a> {
    /// Collection to search.
    pub collection: &'a str,
    /// Boolean filter expression over scalar columns.
    pub filter: &'a str,
    /// Query embedding.
    pub vector: &'a [f32],
    /// Raw candidate count to return.
    pub top_k: usize,
    /// HNSW search-time `ef`.
    pub ef: usize,
    /// Scalar columns to return per hit.
    pub output_fields: &'a [&'a str],
}

/// Trait for vector database clients.
///
/// The client owns connection state and must be safe to share across
/// threads.
pub trait VectorClient: Send + Sync {
    /// Returns whether a collection exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe fails.
    fn has_collection(&self, collection: &str) -> Result<bool>;

    /// Creates a collection with the given schema.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails.
    fn create_collection(&self, schema: &CollectionSchema) -> Result<()>;

    /// Builds an HNSW cosine index over a vector column.
    ///
    /// # Errors
    ///
    /// Returns an error if index creation fails.
    fn create_index(&self, collection: &str, field: &str, params: &HnswParams) -> Result<()>;

    /// Loads a collection into serving memory.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails.
    fn load_collection(&self, collection: &str) -> Result<()>;

    /// Inserts rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn insert(&self, collection: &str, rows: &[MemoryRow]) -> Result<()>;

    /// Flushes pending writes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&self, collection: &str) -> Result<()>;

    /// Deletes rows matching a filter expression.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete(&self, collection: &str, filter: &str) -> Result<()>;

    /// Fetches rows matching a filter expression.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn query(
        &self,
        collection: &str,
        filter: &str,
        output_fields: &[&str],
    ) -> Result<Vec<MemoryRow>>;

    /// Runs a cosine similarity search.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<ScoredRow>>;

    /// Releases the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if shutdown fails.
    fn close(&self) -> Result<()>;
}
