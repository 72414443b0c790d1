//! Storage error types for memodag-storage.
//!
//! [`StorageError`] covers the failure modes of the persisted form: malformed
//! JSON, null payloads, and every graph-level rejection raised while
//! replaying a parsed document through the validating mutation API.

use memodag_core::DagError;
use thiserror::Error;

/// Errors produced by serialization and deserialization.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A vertex in the document carries a `null` payload.
    #[error("vertex '{id}' has a null payload")]
    NullVertex { id: String },

    /// The document describes an invalid graph (duplicate id or vertex,
    /// unknown edge endpoint, self-loop, cycle, ...).
    #[error(transparent)]
    Graph(#[from] DagError),
}
