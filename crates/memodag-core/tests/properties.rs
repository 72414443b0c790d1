//! Property-based invariants: whatever sequence of mutations runs, the
//! graph stays an internally consistent DAG and the memoised reachability
//! answers match a from-scratch recomputation.

use std::collections::HashSet;

use proptest::prelude::*;

use memodag_core::Dag;

const VERTEX_SPACE: u8 = 10;

#[derive(Debug, Clone)]
enum Op {
    AddVertex(u8),
    AddEdge(u8, u8),
    DeleteEdge(u8, u8),
    DeleteVertex(u8),
    Flush,
    /// Populates cache entries so later mutations exercise invalidation.
    WarmCache(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..VERTEX_SPACE).prop_map(Op::AddVertex),
        5 => (0..VERTEX_SPACE, 0..VERTEX_SPACE).prop_map(|(a, b)| Op::AddEdge(a, b)),
        2 => (0..VERTEX_SPACE, 0..VERTEX_SPACE).prop_map(|(a, b)| Op::DeleteEdge(a, b)),
        1 => (0..VERTEX_SPACE).prop_map(Op::DeleteVertex),
        1 => Just(Op::Flush),
        2 => (0..VERTEX_SPACE).prop_map(Op::WarmCache),
    ]
}

fn vid(n: u8) -> String {
    format!("v{n:02}")
}

/// Applies one op, ignoring rejections -- rejected mutations must leave the
/// graph untouched, which the invariant checks below then verify.
fn apply(dag: &Dag<String>, op: &Op) {
    match op {
        Op::AddVertex(n) => {
            let _ = dag.add_vertex_with_id(&vid(*n), format!("payload-{n}"));
        }
        Op::AddEdge(a, b) => {
            let _ = dag.add_edge(&vid(*a), &vid(*b));
        }
        Op::DeleteEdge(a, b) => {
            let _ = dag.delete_edge(&vid(*a), &vid(*b));
        }
        Op::DeleteVertex(n) => {
            let _ = dag.delete_vertex(&vid(*n));
        }
        Op::Flush => dag.flush_caches(),
        Op::WarmCache(n) => {
            let _ = dag.get_descendants(&vid(*n));
            let _ = dag.get_ancestors(&vid(*n));
        }
    }
}

/// Transitive closure over `get_children`, computed without the cache.
fn reachable_down(dag: &Dag<String>, id: &str) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut pending = vec![id.to_string()];
    while let Some(current) = pending.pop() {
        for child in dag.get_children(&current).unwrap().into_keys() {
            if seen.insert(child.clone()) {
                pending.push(child);
            }
        }
    }
    seen
}

/// Transitive closure over `get_parents`, computed without the cache.
fn reachable_up(dag: &Dag<String>, id: &str) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut pending = vec![id.to_string()];
    while let Some(current) = pending.pop() {
        for parent in dag.get_parents(&current).unwrap().into_keys() {
            if seen.insert(parent.clone()) {
                pending.push(parent);
            }
        }
    }
    seen
}

fn check_adjacency_symmetry(dag: &Dag<String>) {
    for id in dag.get_vertices().keys() {
        for child in dag.get_children(id).unwrap().keys() {
            assert!(
                dag.get_parents(child).unwrap().contains_key(id),
                "outbound {id} -> {child} lacks its inbound mirror"
            );
        }
        for parent in dag.get_parents(id).unwrap().keys() {
            assert!(
                dag.get_children(parent).unwrap().contains_key(id),
                "inbound {parent} -> {id} lacks its outbound mirror"
            );
        }
    }
}

fn check_topological_walk(dag: &Dag<String>) {
    let mut order = Vec::new();
    dag.ordered_walk(&mut |id: &str, _: &String| order.push(id.to_string()));

    assert_eq!(order.len(), dag.order(), "walk must visit every vertex once");
    let position: std::collections::HashMap<String, usize> = order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), i))
        .collect();
    for id in &order {
        for parent in dag.get_parents(id).unwrap().keys() {
            assert!(
                position[parent] < position[id],
                "edge {parent} -> {id} visited out of order"
            );
        }
    }
}

fn check_cache_against_recomputation(dag: &Dag<String>) {
    for id in dag.get_vertices().keys() {
        let cached: HashSet<String> = dag.get_descendants(id).unwrap().into_keys().collect();
        assert_eq!(cached, reachable_down(dag, id), "descendants of {id}");

        let cached: HashSet<String> = dag.get_ancestors(id).unwrap().into_keys().collect();
        assert_eq!(cached, reachable_up(dag, id), "ancestors of {id}");
    }
}

fn check_index_consistency(dag: &Dag<String>) {
    let vertices = dag.get_vertices();
    assert_eq!(vertices.len(), dag.order());

    let mut edge_count = 0;
    for (id, payload) in &vertices {
        assert_eq!(&dag.get_vertex(id).unwrap(), payload);
        edge_count += dag.get_children(id).unwrap().len();

        let root = dag.is_root(id).unwrap();
        assert_eq!(root, dag.get_parents(id).unwrap().is_empty());
        let leaf = dag.is_leaf(id).unwrap();
        assert_eq!(leaf, dag.get_children(id).unwrap().is_empty());
    }
    assert_eq!(edge_count, dag.size());

    assert_eq!(
        dag.get_roots().len(),
        vertices
            .keys()
            .filter(|id| dag.is_root(id).unwrap())
            .count()
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn mutations_preserve_all_invariants(
        ops in proptest::collection::vec(op_strategy(), 0..64)
    ) {
        let dag: Dag<String> = Dag::new();
        for op in &ops {
            apply(&dag, op);
        }

        check_adjacency_symmetry(&dag);
        check_topological_walk(&dag);
        check_cache_against_recomputation(&dag);
        check_index_consistency(&dag);
    }

    #[test]
    fn reduction_is_idempotent_and_preserves_reachability(
        edges in proptest::collection::vec((0..8u8, 0..8u8), 0..24)
    ) {
        let dag: Dag<String> = Dag::new();
        for n in 0..8u8 {
            dag.add_vertex_with_id(&vid(n), format!("payload-{n}")).unwrap();
        }
        for (a, b) in &edges {
            let _ = dag.add_edge(&vid(*a), &vid(*b));
        }

        let before: Vec<(String, HashSet<String>)> = dag
            .get_vertices()
            .into_keys()
            .map(|id| {
                let down = reachable_down(&dag, &id);
                (id, down)
            })
            .collect();

        dag.reduce_transitively();

        for (id, expected) in &before {
            prop_assert_eq!(
                &reachable_down(&dag, id),
                expected,
                "reachability from {} changed",
                id
            );
        }

        let reduced_once = dag.to_parts();
        dag.reduce_transitively();
        prop_assert_eq!(reduced_once, dag.to_parts());
    }

    #[test]
    fn ordered_queries_agree_with_memoised_sets(
        edges in proptest::collection::vec((0..8u8, 0..8u8), 0..20)
    ) {
        let dag: Dag<String> = Dag::new();
        for n in 0..8u8 {
            dag.add_vertex_with_id(&vid(n), format!("payload-{n}")).unwrap();
        }
        for (a, b) in &edges {
            let _ = dag.add_edge(&vid(*a), &vid(*b));
        }

        for id in dag.get_vertices().into_keys() {
            let ordered = dag.get_ordered_descendants(&id).unwrap();
            let as_set: HashSet<String> = ordered.iter().cloned().collect();
            prop_assert_eq!(as_set.len(), ordered.len(), "walker repeated an id");

            let memoised: HashSet<String> =
                dag.get_descendants(&id).unwrap().into_keys().collect();
            prop_assert_eq!(as_set, memoised);
        }
    }
}
