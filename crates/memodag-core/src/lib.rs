//! Thread-safe in-memory DAG engine with memoised reachability.
//!
//! A [`Dag`] stores `(id, payload)` vertices indexed both by id and by a
//! content key derived from a pluggable [`KeyPolicy`], guarantees acyclicity
//! under every mutation, memoises ancestor/descendant queries with
//! fine-grained invalidation, and offers deterministic traversals,
//! interruptible walkers, structural transformations, and a
//! parent-aggregating parallel fold over descendant cones.
//!
//! ```
//! use memodag_core::Dag;
//!
//! let dag: Dag<u32> = Dag::new();
//! dag.add_vertex_with_id("build", 1).unwrap();
//! dag.add_vertex_with_id("test", 2).unwrap();
//! dag.add_vertex_with_id("ship", 3).unwrap();
//! dag.add_edge("build", "test").unwrap();
//! dag.add_edge("test", "ship").unwrap();
//!
//! assert_eq!(dag.get_descendants("build").unwrap().len(), 2);
//! assert!(dag.add_edge("ship", "build").is_err()); // stays acyclic
//! ```

pub mod error;
pub mod flow;
pub mod graph;
pub mod key;
pub mod walk;

mod cache;
mod ops;
mod store;
mod sync;

pub use error::DagError;
pub use flow::{FlowError, FlowResult};
pub use graph::{Dag, DagParts};
pub use key::{KeyFn, KeyPolicy, PayloadKey};
pub use walk::{CancelToken, ReachWalker, Visitor};
