//! Core error types for memodag-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering all
//! anticipated failure modes of graph mutation and lookup. Every fallible
//! operation returns one of these as a first-class value; nothing is retried
//! internally, and after any error the graph is exactly the graph before the
//! failing call.

use thiserror::Error;

/// Errors produced by the memodag-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DagError {
    /// An empty string was passed where a vertex id is required.
    #[error("vertex id must not be empty")]
    EmptyId,

    /// The given id does not name a live vertex.
    #[error("unknown vertex id: '{id}'")]
    UnknownId { id: String },

    /// A vertex with the given id already exists.
    #[error("duplicate vertex id: '{id}'")]
    DuplicateId { id: String },

    /// A live vertex with an equal key already exists; `id` names it.
    #[error("duplicate vertex: payload collides with vertex '{id}'")]
    DuplicateVertex { id: String },

    /// Source and destination of an edge are the same vertex.
    #[error("source and destination are equal: '{src}'")]
    SrcDstEqual { src: String, dst: String },

    /// The edge is already part of the graph.
    #[error("duplicate edge: '{src}' -> '{dst}'")]
    DuplicateEdge { src: String, dst: String },

    /// There is no edge between the two vertices.
    #[error("unknown edge: '{src}' -> '{dst}'")]
    UnknownEdge { src: String, dst: String },

    /// Inserting the edge would close a directed cycle.
    #[error("edge '{src}' -> '{dst}' would create a loop")]
    WouldLoop { src: String, dst: String },
}
