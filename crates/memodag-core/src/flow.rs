//! Parent-aggregating parallel fold over a descendant cone.
//!
//! [`Dag::descendants_flow`] invokes a callback exactly once for a seed
//! vertex and each of its descendants. A vertex runs only once every parent
//! inside the cone has produced its result, and receives those results as
//! input; independent branches run concurrently on a small worker pool. A
//! callback error is captured as that vertex's result and flows on to its
//! children without aborting the other branches.
//!
//! The cone and its internal parent/child relationships are snapshotted
//! under one graph read lock up front; the fold itself runs without holding
//! any graph lock, so callbacks are free to query the graph.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::DagError;
use crate::graph::Dag;
use crate::key::KeyPolicy;

/// Error type a flow callback may return.
pub type FlowError = Box<dyn Error + Send + Sync>;

/// The captured outcome of one callback invocation.
///
/// Also the type of the seed inputs: the caller fabricates the "results" the
/// seed vertex should see as its `parent_results`.
#[derive(Debug, Clone)]
pub struct FlowResult<V> {
    /// Id of the vertex this result belongs to.
    pub id: String,
    /// The callback's return value, or its captured error.
    pub outcome: Result<V, Arc<dyn Error + Send + Sync>>,
}

impl<V> FlowResult<V> {
    /// A successful result for `id`.
    pub fn new(id: impl Into<String>, value: V) -> Self {
        FlowResult {
            id: id.into(),
            outcome: Ok(value),
        }
    }

    /// The value, if the callback succeeded.
    pub fn value(&self) -> Option<&V> {
        self.outcome.as_ref().ok()
    }
}

/// Per-vertex snapshot of the cone-internal wiring.
struct FlowNode {
    parents: Vec<String>,
    children: Vec<String>,
    pending: AtomicUsize,
}

impl<T, P> Dag<T, P>
where
    T: Send + Sync,
    P: KeyPolicy<T> + Sync,
{
    /// Folds a callback over the seed vertex and all its descendants.
    ///
    /// `parent_results` for a vertex is the results of its in-cone parents in
    /// ascending parent-id order; the seed receives `seed_inputs` verbatim.
    /// Returns the results of the cone's leaves, in ascending id order.
    pub fn descendants_flow<V, F>(
        &self,
        start_id: &str,
        seed_inputs: Vec<FlowResult<V>>,
        callback: F,
    ) -> Result<Vec<FlowResult<V>>, DagError>
    where
        V: Clone + Send + Sync,
        F: Fn(&Self, &str, &[FlowResult<V>]) -> Result<V, FlowError> + Send + Sync,
    {
        let nodes = self.snapshot_cone(start_id)?;
        let total = nodes.len();
        tracing::debug!(start_id, cone = total, "descendants flow started");

        let results: Mutex<HashMap<String, FlowResult<V>>> =
            Mutex::new(HashMap::with_capacity(total));
        let completed = AtomicUsize::new(0);

        // Ready queue; `None` is the shutdown sentinel, sent once per worker
        // when the last vertex completes.
        let (tx, rx) = crossbeam_channel::unbounded::<Option<String>>();
        let _ = tx.send(Some(start_id.to_string()));

        let workers = num_cpus::get().clamp(1, total.max(1));
        std::thread::scope(|scope| {
            for _ in 0..workers {
                let rx = rx.clone();
                let tx = tx.clone();
                let nodes = &nodes;
                let results = &results;
                let completed = &completed;
                let callback = &callback;
                let seed_inputs = seed_inputs.as_slice();

                scope.spawn(move || {
                    while let Ok(Some(id)) = rx.recv() {
                        let Some(node) = nodes.get(&id) else {
                            continue;
                        };

                        let outcome = if id == start_id {
                            callback(self, &id, seed_inputs)
                        } else {
                            let gathered: Vec<FlowResult<V>> = {
                                let finished = results.lock();
                                node.parents
                                    .iter()
                                    .filter_map(|parent| finished.get(parent).cloned())
                                    .collect()
                            };
                            callback(self, &id, &gathered)
                        };

                        let result = FlowResult {
                            id: id.clone(),
                            outcome: outcome.map_err(Arc::from),
                        };
                        results.lock().insert(id.clone(), result);

                        for child in &node.children {
                            if nodes[child].pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                                let _ = tx.send(Some(child.clone()));
                            }
                        }
                        if completed.fetch_add(1, Ordering::AcqRel) + 1 == total {
                            for _ in 0..workers {
                                let _ = tx.send(None);
                            }
                        }
                    }
                });
            }
        });

        let results = results.into_inner();
        let mut leaf_ids: Vec<&String> = nodes
            .iter()
            .filter(|(_, node)| node.children.is_empty())
            .map(|(id, _)| id)
            .collect();
        leaf_ids.sort_unstable();
        Ok(leaf_ids
            .into_iter()
            .filter_map(|id| results.get(id).cloned())
            .collect())
    }

    /// Captures the cone membership and its internal edges under one read
    /// lock. Join counters start at the in-cone parent count; only the seed
    /// starts at zero.
    fn snapshot_cone(&self, start_id: &str) -> Result<HashMap<String, FlowNode>, DagError> {
        let store = self.store().read();
        let seed_key = Self::key_in(&store, start_id)?;

        let cone = self.cache().descendants(&store, &seed_key);
        let mut members: HashSet<String> = cone
            .iter()
            .filter_map(|key| store.id_of(key).map(str::to_string))
            .collect();
        members.insert(start_id.to_string());

        let mut nodes = HashMap::with_capacity(members.len());
        for id in &members {
            let Some(key) = store.key_of_id(id) else {
                continue;
            };
            let parents: Vec<String> = store
                .sorted_parent_ids(key)
                .into_iter()
                .filter(|parent| members.contains(parent))
                .collect();
            let children: Vec<String> = store
                .sorted_child_ids(key)
                .into_iter()
                .filter(|child| members.contains(child))
                .collect();
            nodes.insert(
                id.clone(),
                FlowNode {
                    pending: AtomicUsize::new(parents.len()),
                    parents,
                    children,
                },
            );
        }
        Ok(nodes)
    }
}
