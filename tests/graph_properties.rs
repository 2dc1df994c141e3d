use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use incrbuild::graph::{CellId, ComputableId, Graph, NodeId};
use incrbuild::types::UpdatePolicy;
use proptest::prelude::*;

/// Shape of a random graph: `leaves` cells followed by computables whose
/// children are indices of earlier nodes.
#[derive(Debug, Clone)]
struct Shape {
    leaves: Vec<i64>,
    computables: Vec<Vec<usize>>,
}

// Acyclic by construction: node N only depends on nodes 0..N-1.
fn shape_strategy(max_leaves: usize, max_computables: usize) -> impl Strategy<Value = Shape> {
    (1..=max_leaves, 1..=max_computables).prop_flat_map(|(num_leaves, num_computables)| {
        let leaves = proptest::collection::vec(0..100i64, num_leaves);
        let children = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 1..4),
            num_computables,
        );
        (leaves, children).prop_map(move |(leaves, raw_children)| {
            let computables = raw_children
                .into_iter()
                .enumerate()
                .map(|(i, picks)| {
                    let available = num_leaves + i;
                    let unique: BTreeSet<usize> = picks.into_iter().map(|p| p % available).collect();
                    unique.into_iter().collect()
                })
                .collect();
            Shape {
                leaves,
                computables,
            }
        })
    })
}

struct Built {
    graph: Graph,
    cells: Vec<CellId<i64>>,
    computables: Vec<ComputableId<i64>>,
    builds: Vec<Arc<AtomicUsize>>,
}

fn build(shape: &Shape, policy: UpdatePolicy) -> Built {
    let mut graph = Graph::new();
    let mut ids: Vec<NodeId> = Vec::new();
    let mut cells = Vec::new();
    for &value in &shape.leaves {
        let cell = graph.add_cell(value, None, policy);
        ids.push(cell.node());
        cells.push(cell);
    }

    let mut computables = Vec::new();
    let mut builds = Vec::new();
    for children in &shape.computables {
        let child_ids: Vec<NodeId> = children.iter().map(|&c| ids[c]).collect();
        let count = Arc::new(AtomicUsize::new(0));
        let computable = graph.computable(&child_ids, {
            let count = Arc::clone(&count);
            move |inputs| {
                count.fetch_add(1, Ordering::SeqCst);
                let mut total = 0i64;
                for i in 0..inputs.len() {
                    total += inputs.value::<i64>(i)?;
                }
                Ok(total)
            }
        });
        ids.push(computable.node());
        computables.push(computable);
        builds.push(count);
    }

    Built {
        graph,
        cells,
        computables,
        builds,
    }
}

/// Values every computable should hold for the given leaf values.
fn expected(shape: &Shape, leaves: &[i64]) -> Vec<i64> {
    let mut values: Vec<i64> = leaves.to_vec();
    for children in &shape.computables {
        let total = children.iter().map(|&c| values[c]).sum();
        values.push(total);
    }
    values.split_off(leaves.len())
}

fn build_counts(built: &Built) -> Vec<usize> {
    built
        .builds
        .iter()
        .map(|count| count.load(Ordering::SeqCst))
        .collect()
}

proptest! {
    #[test]
    fn lazy_graph_matches_reference_and_builds_each_node_at_most_once(
        shape in shape_strategy(4, 8),
        writes in proptest::collection::vec((any::<usize>(), 0..100i64), 1..6),
    ) {
        let mut built = build(&shape, UpdatePolicy::Lazy);
        let mut leaves = shape.leaves.clone();

        for (pick, value) in writes {
            let index = pick % leaves.len();
            leaves[index] = value;
            built.graph.set(built.cells[index], value).unwrap();

            let before = build_counts(&built);
            for &computable in &built.computables {
                built.graph.compute(computable).unwrap();
            }
            let after = build_counts(&built);

            for (b, a) in before.iter().zip(&after) {
                prop_assert!(a - b <= 1);
            }
            let values: Vec<i64> = built
                .computables
                .iter()
                .map(|&c| built.graph.value(c).unwrap())
                .collect();
            prop_assert_eq!(values, expected(&shape, &leaves));
        }
    }

    #[test]
    fn eager_graph_is_current_without_compute(
        shape in shape_strategy(4, 8),
        writes in proptest::collection::vec((any::<usize>(), 0..100i64), 1..6),
    ) {
        let mut built = build(&shape, UpdatePolicy::Eager);
        for &computable in &built.computables {
            built.graph.compute(computable).unwrap();
        }
        let mut leaves = shape.leaves.clone();

        for (pick, value) in writes {
            let index = pick % leaves.len();
            leaves[index] = value;
            built.graph.set(built.cells[index], value).unwrap();

            for &computable in &built.computables {
                prop_assert!(!built.graph.should_rebuild(computable));
            }
            let values: Vec<i64> = built
                .computables
                .iter()
                .map(|&c| built.graph.value(c).unwrap())
                .collect();
            prop_assert_eq!(values, expected(&shape, &leaves));
        }
    }

    #[test]
    fn parent_and_child_edges_mirror_each_other(shape in shape_strategy(4, 8)) {
        let built = build(&shape, UpdatePolicy::Lazy);
        let graph = &built.graph;

        for (id, node) in graph.nodes() {
            for &child in node.children() {
                let back = graph.parents(child).iter().filter(|&&p| p == id).count();
                let forward = node.children().iter().filter(|&&c| c == child).count();
                prop_assert_eq!(back, forward);
            }
            for &parent in node.parents() {
                prop_assert!(graph.children(parent).contains(&id));
            }
        }
    }

    #[test]
    fn roots_have_no_parents_and_depend_on_the_node(shape in shape_strategy(4, 8)) {
        let built = build(&shape, UpdatePolicy::Lazy);
        let graph = &built.graph;

        for &cell in &built.cells {
            let roots = graph.roots(cell);
            let unique: BTreeSet<NodeId> = roots.iter().copied().collect();
            prop_assert_eq!(unique.len(), roots.len());
            for root in roots {
                prop_assert!(graph.parents(root).is_empty());
            }
        }
    }
}
