//! Canonical persisted form and JSON codec for memodag graphs.
//!
//! The wire shape is `{"vs": [{"i", "v"}, ...], "es": [{"s", "d"}, ...]}`:
//! vertices in DFS-visit order, then edges. Parsing replays the document
//! through the engine's validating mutation API, so a stored graph that
//! would be illegal to build is equally illegal to load.
//!
//! ```
//! use memodag_core::Dag;
//! use memodag_storage::{from_json, to_json};
//!
//! let dag: Dag<u32> = Dag::new();
//! dag.add_vertex_with_id("a", 1).unwrap();
//! dag.add_vertex_with_id("b", 2).unwrap();
//! dag.add_edge("a", "b").unwrap();
//!
//! let bytes = to_json(&dag).unwrap();
//! let restored: Dag<u32> = from_json(&bytes).unwrap();
//! assert!(restored.is_edge("a", "b").unwrap());
//! ```

pub mod convert;
pub mod error;
pub mod schema;

pub use convert::{from_json, from_json_with_policy, to_json};
pub use error::StorageError;
pub use schema::{StorableDag, StorableEdge, StorableVertex};
