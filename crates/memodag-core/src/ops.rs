//! Structural operations: whole-graph copy, cone subgraphs, and transitive
//! reduction.
//!
//! Copy and the subgraph extractors reproduce vertices through the public
//! mutation API of a fresh graph, so the result carries the same ids, the
//! same payloads, and a freshly validated edge set. The source graph is read
//! under a single read lock for the duration.

use std::collections::HashSet;

use crate::error::DagError;
use crate::graph::Dag;
use crate::key::KeyPolicy;
use crate::store::Store;

impl<T, P> Dag<T, P>
where
    T: Clone,
    P: KeyPolicy<T> + Clone,
{
    /// Returns an independent graph with the same vertices (same ids, same
    /// payloads) and the same edges.
    pub fn copy(&self) -> Result<Self, DagError> {
        let target = self.like();
        let store = self.store().read();
        let mut visited: HashSet<String> = HashSet::new();

        let mut roots = store.root_ids();
        roots.sort_unstable();
        for root in roots {
            self.reproduce_rec(&store, &root, &target, &mut visited, false)?;
        }
        Ok(target)
    }

    /// Extracts the vertex and all its descendants into a new graph.
    ///
    /// Returns the new graph and the seed's id within it (the id is
    /// preserved, so this is the id that was passed in).
    pub fn descendants_subgraph(&self, id: &str) -> Result<(Self, String), DagError> {
        self.cone_subgraph(id, false)
    }

    /// Extracts the vertex and all its ancestors into a new graph.
    pub fn ancestors_subgraph(&self, id: &str) -> Result<(Self, String), DagError> {
        self.cone_subgraph(id, true)
    }

    fn cone_subgraph(&self, id: &str, ascending: bool) -> Result<(Self, String), DagError> {
        let store = self.store().read();
        // Validates the id before any copying happens.
        Self::key_in(&store, id)?;

        let target = self.like();
        let mut visited: HashSet<String> = HashSet::new();
        self.reproduce_rec(&store, id, &target, &mut visited, ascending)?;
        Ok((target, id.to_string()))
    }

    /// Copies `id`, then recursively its relatives in the chosen direction,
    /// wiring each edge towards the copy just produced.
    fn reproduce_rec(
        &self,
        store: &Store<T, P::Key>,
        id: &str,
        target: &Self,
        visited: &mut HashSet<String>,
        ascending: bool,
    ) -> Result<(), DagError> {
        if let Some(payload) = store.payload(id) {
            target.add_vertex_with_id(id, payload.clone())?;
        }
        visited.insert(id.to_string());

        let relatives: Vec<String> = match store.key_of_id(id) {
            Some(key) if ascending => store.sorted_parent_ids(key),
            Some(key) => store.sorted_child_ids(key),
            None => Vec::new(),
        };
        for relative in relatives {
            if !visited.contains(&relative) {
                self.reproduce_rec(store, &relative, target, visited, ascending)?;
            }
            let (src, dst) = if ascending {
                (relative.as_str(), id)
            } else {
                (id, relative.as_str())
            };
            target.add_edge(src, dst)?;
        }
        Ok(())
    }
}

impl<T, P: KeyPolicy<T>> Dag<T, P> {
    /// Transitively reduces the graph in place.
    ///
    /// Removes every edge `v -> c` where `c` is also reachable from `v`
    /// through another child, leaving the unique minimal graph with the same
    /// reachability relation. Flushes the caches iff anything was removed.
    pub fn reduce_transitively(&self) {
        let mut store = self.store().write();

        // Building from every root populates the descendant entry of every
        // vertex; the loop below reads those entries directly.
        let root_keys: Vec<P::Key> = store
            .vertex_keys()
            .filter(|key| store.is_root(key))
            .cloned()
            .collect();
        for root in &root_keys {
            let _ = self.cache().descendants(&store, root);
        }

        let all_keys: Vec<P::Key> = store.vertex_keys().cloned().collect();
        let mut changed = false;
        for vertex in &all_keys {
            let children: Vec<P::Key> = store
                .children(vertex)
                .into_iter()
                .flatten()
                .cloned()
                .collect();
            if children.len() < 2 {
                // A single edge cannot be shadowed by a sibling path.
                continue;
            }

            let mut via_children: HashSet<P::Key> = HashSet::new();
            for child in &children {
                if let Some(reachable) = self.cache().cached_descendants(child) {
                    via_children.extend(reachable.iter().cloned());
                }
            }
            for child in &children {
                if via_children.contains(child) {
                    store.remove_edge(vertex, child);
                    changed = true;
                }
            }
        }

        if changed {
            self.cache().flush();
            tracing::debug!("transitive reduction removed redundant edges");
        }
    }
}
