//! Memory storage layer.
//!
//! Persistent, user-scoped, semantically-searchable memory storage behind the
//! [`MemoryStore`] trait. Two backends implement the same contract:
//!
//! - [`InMemoryStore`] — an id-to-memory map under a reader/writer lock with
//!   case-insensitive keyword-overlap scoring. Development and tests; needs
//!   no embeddings.
//! - [`vector::VectorMemoryStore`] — an external vector database reached
//!   through a thread-safe RPC client, with HNSW cosine search, bounded
//!   retrying and JSON metadata inflation. Production.
//!
//! There is no global ordering between concurrent `store` and `retrieve`
//! calls: a memory written at time T may or may not be visible to a
//! retrieval issued concurrently with its write. Once both operations have
//! returned and any backend flush completed, the write is visible.

// Allow cast precision loss for score calculations where exact precision is
// not critical.
#![allow(clippy::cast_precision_loss)]

mod in_memory;
pub mod retry;
pub mod vector;

pub use in_memory::InMemoryStore;
pub use vector::{HttpVectorClient, VectorClient, VectorMemoryStore};

use crate::models::{Memory, MemoryId, MemoryScope, RetrieveOptions, RetrieveResult};
use crate::{CancellationToken, Result};
use std::sync::Arc;

/// The agentic memory storage contract.
///
/// Implementations must be safe to share across request-handling threads.
/// Retrieval results never cross `user_id` boundaries; additional filters
/// only narrow.
pub trait MemoryStore: Send + Sync {
    /// Persists a new memory.
    ///
    /// Assigns `memory.id` when unset and refreshes `accessed_at`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidUserId`] for an empty `user_id`,
    /// [`crate::Error::InvalidInput`] for blank content and backend errors
    /// (including empty embedding vectors) as
    /// [`crate::Error::OperationFailed`].
    fn store(&self, memory: &mut Memory) -> Result<()>;

    /// Finds memories similar to the query.
    ///
    /// Results are ordered by descending similarity (ties broken by earlier
    /// `created_at`) and trimmed to the effective limit.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidUserId`] for an empty `user_id`,
    /// [`crate::Error::Cancelled`] when the token fires, and transient
    /// backend errors after the bounded retry budget is exhausted.
    fn retrieve(
        &self,
        opts: &RetrieveOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<RetrieveResult>>;

    /// Fetches a memory by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] when the id does not exist.
    fn get(&self, id: &MemoryId) -> Result<Memory>;

    /// Replaces an existing memory in place, preserving its id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] when the id does not exist.
    fn update(&self, id: &MemoryId, memory: &mut Memory) -> Result<()>;

    /// Removes a memory by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] when the id does not exist.
    fn forget(&self, id: &MemoryId) -> Result<()>;

    /// Removes every memory matching the scope. An empty scope is a no-op.
    ///
    /// # Errors
    ///
    /// Returns backend errors as [`crate::Error::OperationFailed`].
    fn forget_by_scope(&self, scope: &MemoryScope) -> Result<()>;

    /// Returns whether the store is active.
    fn is_enabled(&self) -> bool;

    /// Releases backend resources. Stores with background work stop it here.
    ///
    /// # Errors
    ///
    /// Returns backend-specific shutdown errors.
    fn close(&self) -> Result<()>;
}

impl<S: MemoryStore + ?Sized> MemoryStore for Arc<S> {
    fn store(&self, memory: &mut Memory) -> Result<()> {
        (**self).store(memory)
    }

    fn retrieve(
        &self,
        opts: &RetrieveOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<RetrieveResult>> {
        (**self).retrieve(opts, cancel)
    }

    fn get(&self, id: &MemoryId) -> Result<Memory> {
        (**self).get(id)
    }

    fn update(&self, id: &MemoryId, memory: &mut Memory) -> Result<()> {
        (**self).update(id, memory)
    }

    fn forget(&self, id: &MemoryId) -> Result<()> {
        (**self).forget(id)
    }

    fn forget_by_scope(&self, scope: &MemoryScope) -> Result<()> {
        (**self).forget_by_scope(scope)
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}
