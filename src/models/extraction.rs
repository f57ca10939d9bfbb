//! Extraction output types.

use super::MemoryType;

/// A fact distilled from conversation history by the extractor.
///
/// Facts carry one of the extractor-producible memory types and non-blank,
/// statement-form content; anything else is dropped during response parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFact {
    /// The normalised memory type.
    pub fact_type: MemoryType,
    /// The fact, phrased as a self-contained statement.
    pub content: String,
}

impl ExtractedFact {
    /// Creates an extracted fact.
    #[must_use]
    pub fn new(fact_type: MemoryType, content: impl Into<String>) -> Self {
        Self {
            fact_type,
            content: content.into(),
        }
    }
}
