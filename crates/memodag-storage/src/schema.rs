//! The canonical persisted form.
//!
//! A graph serialises to `{"vs": [{"i": id, "v": payload}, ...],
//! "es": [{"s": src, "d": dst}, ...]}`. The single-letter tags are fixed;
//! payloads under `"v"` are whatever the caller's type serialises to. `vs`
//! is written in DFS-visit order, but parsers must not rely on any ordering
//! beyond "vertices restore before edges".

use serde::{Deserialize, Serialize};

/// One stored vertex: wrapped id plus payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorableVertex<T> {
    /// The vertex id. Wrapped because engine-generated ids are not part of
    /// the payload itself.
    #[serde(rename = "i")]
    pub id: String,
    /// The caller's payload.
    #[serde(rename = "v")]
    pub value: T,
}

/// One stored edge, by endpoint ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorableEdge {
    #[serde(rename = "s")]
    pub src: String,
    #[serde(rename = "d")]
    pub dst: String,
}

/// The whole persisted graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorableDag<T> {
    #[serde(rename = "vs", default = "Vec::new")]
    pub vertices: Vec<StorableVertex<T>>,
    #[serde(rename = "es", default = "Vec::new")]
    pub edges: Vec<StorableEdge>,
}
