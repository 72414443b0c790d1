//! The DAG container: construction, invariant-preserving mutation, queries,
//! and structural snapshots.
//!
//! [`Dag`] is the single entry point. It owns the vertex/adjacency store
//! behind one readers-writer lock, and the reachability cache next to it.
//! All public operations are linearizable: mutations hold the store lock
//! exclusively across precondition checks, the adjacency update, and the
//! cache invalidation, so no reader ever observes a half-applied mutation.
//!
//! # Locking
//!
//! Lock order throughout the crate is store -> cache -> per-key build lock.
//! Queries take the store lock shared; mutations take it exclusively. Cache
//! locks are only ever held to probe or swap a single entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::cache::ReachCache;
use crate::error::DagError;
use crate::key::{KeyPolicy, PayloadKey};
use crate::store::Store;

/// Pure function deriving a stable id from a payload, configured at
/// construction for payloads that carry their own identity.
pub(crate) type IdSource<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// A thread-safe directed acyclic graph of `(id, payload)` vertices.
///
/// Vertex identity is the *key* derived by the [`KeyPolicy`] `P`; ids are
/// caller-visible, non-empty strings. Every mutation rejects anything that
/// would break id/key uniqueness or acyclicity, and the graph after a failed
/// call is exactly the graph before it.
///
/// ```
/// use memodag_core::Dag;
///
/// let dag: Dag<&str> = Dag::new();
/// dag.add_vertex_with_id("a", "first").unwrap();
/// dag.add_vertex_with_id("b", "second").unwrap();
/// dag.add_edge("a", "b").unwrap();
/// assert!(dag.add_edge("b", "a").is_err()); // would loop
/// ```
pub struct Dag<T, P: KeyPolicy<T> = PayloadKey> {
    policy: P,
    id_source: Option<IdSource<T>>,
    store: RwLock<Store<T, P::Key>>,
    cache: ReachCache<P::Key>,
}

/// A structural snapshot: vertices in DFS-visit order plus the edge list.
///
/// Produced by [`Dag::to_parts`] under a single read lock, so the two lists
/// are always mutually consistent. This is the exchange format between the
/// engine and the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagParts<T> {
    /// `(id, payload)` pairs in DFS-visit order.
    pub vertices: Vec<(String, T)>,
    /// `(src_id, dst_id)` pairs.
    pub edges: Vec<(String, String)>,
}

impl<T> Dag<T, PayloadKey>
where
    T: Clone + Eq + std::hash::Hash + Send + Sync,
{
    /// Creates an empty graph with the default key policy (the payload is
    /// its own key).
    pub fn new() -> Self {
        Dag::with_policy(PayloadKey)
    }
}

impl<T> Default for Dag<T, PayloadKey>
where
    T: Clone + Eq + std::hash::Hash + Send + Sync,
{
    fn default() -> Self {
        Dag::new()
    }
}

impl<T, P: KeyPolicy<T>> Dag<T, P> {
    /// Creates an empty graph with the given key policy.
    ///
    /// The policy is captured by value and fixed for the lifetime of the
    /// graph.
    pub fn with_policy(policy: P) -> Self {
        Dag {
            policy,
            id_source: None,
            store: RwLock::new(Store::new()),
            cache: ReachCache::new(),
        }
    }

    /// Configures a stable-id source for engine-assigned ids.
    ///
    /// When set, [`add_vertex`](Self::add_vertex) derives the id from the
    /// payload instead of generating a random one. Must be called before the
    /// first mutation; consuming `self` makes that structural.
    pub fn with_id_source(mut self, source: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        self.id_source = Some(Arc::new(source));
        self
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Adds a vertex and returns its id.
    ///
    /// The id comes from the configured id source, or is a fresh UUID.
    /// Fails with [`DagError::DuplicateVertex`] if a live vertex has an equal
    /// key, or [`DagError::DuplicateId`] if the derived id is taken.
    pub fn add_vertex(&self, payload: T) -> Result<String, DagError> {
        let id = match &self.id_source {
            Some(source) => source(&payload),
            None => Uuid::new_v4().to_string(),
        };
        self.add_vertex_with_id(&id, payload)?;
        Ok(id)
    }

    /// Adds a vertex under a caller-chosen id.
    pub fn add_vertex_with_id(&self, id: &str, payload: T) -> Result<(), DagError> {
        let mut store = self.store.write();
        if id.is_empty() {
            return Err(DagError::EmptyId);
        }
        let key = self.policy.key_of(&payload);
        if let Some(existing) = store.id_of(&key) {
            return Err(DagError::DuplicateVertex {
                id: existing.to_string(),
            });
        }
        if store.contains_id(id) {
            return Err(DagError::DuplicateId { id: id.to_string() });
        }
        store.insert_vertex(key, id.to_string(), payload);
        tracing::debug!(id, "vertex added");
        Ok(())
    }

    /// Adds the edge `src -> dst`.
    ///
    /// Errors, in priority order: [`DagError::EmptyId`] (either id),
    /// [`DagError::UnknownId`], [`DagError::SrcDstEqual`],
    /// [`DagError::DuplicateEdge`], [`DagError::WouldLoop`]. The loop check
    /// runs before anything is mutated.
    pub fn add_edge(&self, src: &str, dst: &str) -> Result<(), DagError> {
        let mut store = self.store.write();
        if src.is_empty() || dst.is_empty() {
            return Err(DagError::EmptyId);
        }
        let src_key = Self::key_in(&store, src)?;
        let dst_key = Self::key_in(&store, dst)?;
        if src == dst {
            return Err(DagError::SrcDstEqual {
                src: src.to_string(),
                dst: dst.to_string(),
            });
        }
        if store.has_edge(&src_key, &dst_key) {
            return Err(DagError::DuplicateEdge {
                src: src.to_string(),
                dst: dst.to_string(),
            });
        }
        if store.would_loop(&src_key, &dst_key) {
            return Err(DagError::WouldLoop {
                src: src.to_string(),
                dst: dst.to_string(),
            });
        }

        // Reachability as it stands *before* the edge exists decides which
        // cache entries the change obsoletes.
        let anc_of_src = self.cache.ancestors(&*store, &src_key);
        let desc_of_dst = self.cache.descendants(&*store, &dst_key);

        store.insert_edge(&src_key, &dst_key);
        self.cache
            .invalidate_edge_change(&src_key, &dst_key, &anc_of_src, &desc_of_dst);

        #[cfg(debug_assertions)]
        store.assert_symmetric();

        tracing::debug!(src, dst, "edge added");
        Ok(())
    }

    /// Deletes the edge `src -> dst`.
    ///
    /// Errors: [`DagError::EmptyId`], [`DagError::UnknownId`],
    /// [`DagError::SrcDstEqual`], [`DagError::UnknownEdge`].
    pub fn delete_edge(&self, src: &str, dst: &str) -> Result<(), DagError> {
        let mut store = self.store.write();
        if src.is_empty() || dst.is_empty() {
            return Err(DagError::EmptyId);
        }
        let src_key = Self::key_in(&store, src)?;
        let dst_key = Self::key_in(&store, dst)?;
        if src == dst {
            return Err(DagError::SrcDstEqual {
                src: src.to_string(),
                dst: dst.to_string(),
            });
        }
        if !store.has_edge(&src_key, &dst_key) {
            return Err(DagError::UnknownEdge {
                src: src.to_string(),
                dst: dst.to_string(),
            });
        }

        let anc_of_src = self.cache.ancestors(&*store, &src_key);
        let desc_of_dst = self.cache.descendants(&*store, &dst_key);

        store.remove_edge(&src_key, &dst_key);
        self.cache
            .invalidate_edge_change(&src_key, &dst_key, &anc_of_src, &desc_of_dst);

        #[cfg(debug_assertions)]
        store.assert_symmetric();

        tracing::debug!(src, dst, "edge deleted");
        Ok(())
    }

    /// Deletes a vertex together with all its incident edges.
    pub fn delete_vertex(&self, id: &str) -> Result<(), DagError> {
        let mut store = self.store.write();
        if id.is_empty() {
            return Err(DagError::EmptyId);
        }
        let key = Self::key_in(&store, id)?;

        // Former relatives, captured before the adjacency maps change.
        let ancestors = self.cache.ancestors(&*store, &key);
        let descendants = self.cache.descendants(&*store, &key);

        store.remove_vertex(&key, id);
        self.cache
            .invalidate_vertex_removal(&key, &ancestors, &descendants);

        #[cfg(debug_assertions)]
        store.assert_symmetric();

        tracing::debug!(id, "vertex deleted");
        Ok(())
    }

    /// Drops every memoised reachability set. Subsequent queries recompute
    /// from scratch.
    pub fn flush_caches(&self) {
        let _store = self.store.write();
        self.cache.flush();
        tracing::debug!("reachability caches flushed");
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Number of vertices.
    pub fn order(&self) -> usize {
        self.store.read().order()
    }

    /// Number of edges.
    pub fn size(&self) -> usize {
        self.store.read().size()
    }

    /// Returns `true` if the edge `src -> dst` exists.
    pub fn is_edge(&self, src: &str, dst: &str) -> Result<bool, DagError> {
        let store = self.store.read();
        if src.is_empty() || dst.is_empty() {
            return Err(DagError::EmptyId);
        }
        let src_key = Self::key_in(&store, src)?;
        let dst_key = Self::key_in(&store, dst)?;
        if src == dst {
            return Err(DagError::SrcDstEqual {
                src: src.to_string(),
                dst: dst.to_string(),
            });
        }
        Ok(store.has_edge(&src_key, &dst_key))
    }

    /// Returns `true` if the vertex has no parents.
    pub fn is_root(&self, id: &str) -> Result<bool, DagError> {
        let store = self.store.read();
        let key = Self::key_in(&store, id)?;
        Ok(store.is_root(&key))
    }

    /// Returns `true` if the vertex has no children.
    pub fn is_leaf(&self, id: &str) -> Result<bool, DagError> {
        let store = self.store.read();
        let key = Self::key_in(&store, id)?;
        Ok(store.is_leaf(&key))
    }

    pub(crate) fn key_in(store: &Store<T, P::Key>, id: &str) -> Result<P::Key, DagError> {
        if id.is_empty() {
            return Err(DagError::EmptyId);
        }
        store
            .key_of_id(id)
            .cloned()
            .ok_or_else(|| DagError::UnknownId { id: id.to_string() })
    }

    pub(crate) fn store(&self) -> &RwLock<Store<T, P::Key>> {
        &self.store
    }

    pub(crate) fn cache(&self) -> &ReachCache<P::Key> {
        &self.cache
    }
}

impl<T, P: KeyPolicy<T> + Clone> Dag<T, P> {
    /// An empty graph with the same policy and id source as this one.
    pub(crate) fn like(&self) -> Self {
        Dag {
            policy: self.policy.clone(),
            id_source: self.id_source.clone(),
            store: RwLock::new(Store::new()),
            cache: ReachCache::new(),
        }
    }
}

impl<T, P> Dag<T, P>
where
    T: Clone,
    P: KeyPolicy<T>,
{
    /// Returns the payload of the vertex with the given id.
    pub fn get_vertex(&self, id: &str) -> Result<T, DagError> {
        let store = self.store.read();
        if id.is_empty() {
            return Err(DagError::EmptyId);
        }
        store
            .payload(id)
            .cloned()
            .ok_or_else(|| DagError::UnknownId { id: id.to_string() })
    }

    /// All vertices as an id -> payload map.
    pub fn get_vertices(&self) -> HashMap<String, T> {
        let store = self.store.read();
        store
            .iter()
            .map(|(id, payload)| (id.to_string(), payload.clone()))
            .collect()
    }

    /// All vertices without parents.
    pub fn get_roots(&self) -> HashMap<String, T> {
        let store = self.store.read();
        Self::collect_ids(&store, store.root_ids())
    }

    /// All vertices without children.
    pub fn get_leaves(&self) -> HashMap<String, T> {
        let store = self.store.read();
        Self::collect_ids(&store, store.leaf_ids())
    }

    /// The direct parents of the vertex.
    pub fn get_parents(&self, id: &str) -> Result<HashMap<String, T>, DagError> {
        let store = self.store.read();
        let key = Self::key_in(&store, id)?;
        Ok(Self::collect_keys(
            &store,
            store.parents(&key).into_iter().flatten(),
        ))
    }

    /// The direct children of the vertex.
    pub fn get_children(&self, id: &str) -> Result<HashMap<String, T>, DagError> {
        let store = self.store.read();
        let key = Self::key_in(&store, id)?;
        Ok(Self::collect_keys(
            &store,
            store.children(&key).into_iter().flatten(),
        ))
    }

    /// Every vertex that reaches this one, memoised.
    pub fn get_ancestors(&self, id: &str) -> Result<HashMap<String, T>, DagError> {
        let store = self.store.read();
        let key = Self::key_in(&store, id)?;
        let ancestors = self.cache.ancestors(&*store, &key);
        Ok(Self::collect_keys(&store, ancestors.iter()))
    }

    /// Every vertex reachable from this one, memoised.
    pub fn get_descendants(&self, id: &str) -> Result<HashMap<String, T>, DagError> {
        let store = self.store.read();
        let key = Self::key_in(&store, id)?;
        let descendants = self.cache.descendants(&*store, &key);
        Ok(Self::collect_keys(&store, descendants.iter()))
    }

    /// Vertices in DFS order plus the edge list, from one consistent view.
    pub fn to_parts(&self) -> DagParts<T> {
        let store = self.store.read();
        let mut vertices = Vec::with_capacity(store.order());
        let mut edges = Vec::with_capacity(store.size());
        for id in crate::walk::dfs_order(&store) {
            if let Some(payload) = store.payload(&id) {
                vertices.push((id.clone(), payload.clone()));
            }
            if let Ok(key) = Self::key_in(&store, &id) {
                for child in store.sorted_child_ids(&key) {
                    edges.push((id.clone(), child));
                }
            }
        }
        DagParts { vertices, edges }
    }

    fn collect_ids(store: &Store<T, P::Key>, ids: Vec<String>) -> HashMap<String, T> {
        ids.into_iter()
            .filter_map(|id| store.payload(&id).cloned().map(|payload| (id, payload)))
            .collect()
    }

    fn collect_keys<'k>(
        store: &Store<T, P::Key>,
        keys: impl Iterator<Item = &'k P::Key>,
    ) -> HashMap<String, T>
    where
        P::Key: 'k,
    {
        keys.filter_map(|key| {
            let id = store.id_of(key)?;
            let payload = store.payload(id)?;
            Some((id.to_string(), payload.clone()))
        })
        .collect()
    }
}

impl<T, P: KeyPolicy<T>> fmt::Debug for Dag<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.store.read();
        f.debug_struct("Dag")
            .field("order", &store.order())
            .field("size", &store.size())
            .finish_non_exhaustive()
    }
}

impl<T, P: KeyPolicy<T>> fmt::Display for Dag<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.store.read();
        writeln!(
            f,
            "DAG Vertices: {} - Edges: {}",
            store.order(),
            store.size()
        )?;
        let mut ids: Vec<&str> = store.iter().map(|(id, _)| id).collect();
        ids.sort_unstable();
        writeln!(f, "Vertices:")?;
        for id in &ids {
            writeln!(f, "  {id}")?;
        }
        writeln!(f, "Edges:")?;
        for id in &ids {
            if let Ok(key) = Self::key_in(&store, id) {
                for child in store.sorted_child_ids(&key) {
                    writeln!(f, "  {id} -> {child}")?;
                }
            }
        }
        Ok(())
    }
}
