//! # Mnemo
//!
//! Agentic memory core for LLM serving gateways.
//!
//! Mnemo gives a stateless chat gateway the ability to remember user-specific
//! facts across independent sessions. It is built from five cooperating
//! components:
//!
//! - A **decision filter** that gates memory retrieval on classification
//!   signals, a personal-pronoun override and a greeting detector.
//! - A **memory store** behind the [`MemoryStore`] trait, with an in-process
//!   backend for development and a vector-database backend for production.
//! - A **query rewriter** that turns vague follow-up queries into
//!   self-contained search strings using an LLM.
//! - An **extractor/deduplicator** that distils facts from conversation
//!   history every N turns and either creates new memories or updates
//!   semantically-equivalent existing ones.
//! - A **context injector** that folds retrieved memories into an outbound
//!   chat-completion request as a system message.
//!
//! ## Example
//!
//! ```rust
//! use mnemo::models::{Memory, MemoryType, RetrieveOptions};
//! use mnemo::storage::{InMemoryStore, MemoryStore};
//! use mnemo::CancellationToken;
//!
//! let store = InMemoryStore::new();
//! let mut memory = Memory::new(
//!     MemoryType::Semantic,
//!     "User prefers window seats",
//!     "u1",
//! );
//! store.store(&mut memory).unwrap();
//!
//! let opts = RetrieveOptions::new("window seats", "u1");
//! let results = store.retrieve(&opts, &CancellationToken::new()).unwrap();
//! assert_eq!(results.len(), 1);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use std::error::Error as StdError;
use std::fmt;

// Module declarations
pub mod cancel;
pub mod config;
pub mod embedding;
pub mod extraction;
pub mod filter;
pub mod inject;
pub mod llm;
pub mod models;
pub mod observability;
pub mod rewrite;
pub mod services;
pub mod session;
pub mod storage;

// Re-exports for convenience
pub use cancel::CancellationToken;
pub use config::MemoryConfig;
pub use embedding::Embedder;
pub use extraction::MemoryExtractor;
pub use filter::{RequestSignals, should_search_memory};
pub use llm::ChatClient;
pub use models::{Memory, MemoryId, MemoryScope, MemoryType, RetrieveOptions, RetrieveResult};
pub use rewrite::QueryRewriter;
pub use services::MemoryService;
pub use storage::{InMemoryStore, MemoryStore};

/// Error type for memory operations.
#[derive(Debug)]
pub enum Error {
    /// A write or retrieval was attempted without a user id.
    InvalidUserId,
    /// Invalid input was provided.
    InvalidInput(String),
    /// The requested memory does not exist.
    NotFound(String),
    /// An operation failed.
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
    /// The ambient cancellation token was cancelled.
    Cancelled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUserId => write!(f, "user_id is required"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::NotFound(id) => write!(f, "memory not found: {id}"),
            Self::OperationFailed { operation, cause } => {
                write!(f, "operation '{operation}' failed: {cause}")
            },
            Self::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl StdError for Error {}

impl Error {
    /// Builds an [`Error::OperationFailed`] from an operation name and cause.
    #[must_use]
    pub fn operation(operation: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for memory operations.
pub type Result<T> = std::result::Result<T, Error>;
