//! Conversion between live graphs and the persisted form.
//!
//! Emission snapshots the graph once ([`Dag::to_parts`], a single read lock)
//! and writes the schema types out. Parsing goes the other way through the
//! *validating* mutation API -- vertices first, in document order, then
//! edges -- so a document describing a duplicate vertex, an unknown
//! endpoint, a self-loop, or a cycle aborts with the same error the
//! equivalent mutation sequence would produce, and payload values are
//! converted individually so a single bad vertex is reported, not a generic
//! document error.

use serde::de::DeserializeOwned;
use serde::Serialize;

use memodag_core::{Dag, KeyPolicy, PayloadKey};

use crate::error::StorageError;
use crate::schema::{StorableDag, StorableEdge, StorableVertex};

/// Serialises the graph to the canonical JSON form.
pub fn to_json<T, P>(dag: &Dag<T, P>) -> Result<Vec<u8>, StorageError>
where
    T: Clone + Serialize,
    P: KeyPolicy<T>,
{
    let parts = dag.to_parts();
    let doc = StorableDag {
        vertices: parts
            .vertices
            .into_iter()
            .map(|(id, value)| StorableVertex { id, value })
            .collect(),
        edges: parts
            .edges
            .into_iter()
            .map(|(src, dst)| StorableEdge { src, dst })
            .collect(),
    };
    Ok(serde_json::to_vec(&doc)?)
}

/// Parses the canonical JSON form into a graph with the default key policy.
pub fn from_json<T>(bytes: &[u8]) -> Result<Dag<T>, StorageError>
where
    T: DeserializeOwned + Clone + Eq + std::hash::Hash + Send + Sync,
{
    from_json_with_policy(bytes, PayloadKey)
}

/// Parses the canonical JSON form, deriving vertex keys with `policy`.
pub fn from_json_with_policy<T, P>(bytes: &[u8], policy: P) -> Result<Dag<T, P>, StorageError>
where
    T: DeserializeOwned,
    P: KeyPolicy<T>,
{
    let doc: StorableDag<serde_json::Value> = serde_json::from_slice(bytes)?;

    let dag = Dag::with_policy(policy);
    for vertex in doc.vertices {
        if vertex.value.is_null() {
            return Err(StorageError::NullVertex { id: vertex.id });
        }
        let payload: T = serde_json::from_value(vertex.value)?;
        dag.add_vertex_with_id(&vertex.id, payload)?;
    }
    for edge in doc.edges {
        dag.add_edge(&edge.src, &edge.dst)?;
    }
    Ok(dag)
}
