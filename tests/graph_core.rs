use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use incrbuild::errors::GraphError;
use incrbuild::graph::{Graph, Inputs, Node, NodeId};
use incrbuild_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn sum(inputs: &Inputs<'_>) -> anyhow::Result<i64> {
    let mut total = 0;
    for i in 0..inputs.len() {
        total += inputs.value::<i64>(i)?;
    }
    Ok(total)
}

#[test]
fn memoized_value_is_not_rebuilt_without_changes() -> TestResult {
    init_tracing();

    let mut graph = Graph::new();
    let a = graph.cell(1i64);
    let builds = counter();
    let doubled = graph.computable(&[a.into()], {
        let builds = Arc::clone(&builds);
        move |inputs| {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(inputs.value::<i64>(0)? * 2)
        }
    });

    assert_eq!(graph.value(doubled), None);
    graph.compute(doubled)?;
    graph.compute(doubled)?;
    graph.compute(doubled)?;

    assert_eq!(graph.value(doubled), Some(2));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn diamond_recomputes_shared_node_once() -> TestResult {
    init_tracing();

    let mut graph = Graph::new();
    let y = graph.cell(2i64);
    let z = graph.cell(3i64);
    let x_builds = counter();
    let x = graph.computable(&[y.into(), z.into()], {
        let x_builds = Arc::clone(&x_builds);
        move |inputs| {
            x_builds.fetch_add(1, Ordering::SeqCst);
            sum(inputs)
        }
    });
    let w = graph.cell(4i64);
    let v = graph.computable(&[w.into(), x.into()], sum);

    graph.compute(v)?;
    assert_eq!(graph.value(v), Some(9));
    assert_eq!(x_builds.load(Ordering::SeqCst), 1);

    assert!(graph.set(y, 10)?);
    assert!(graph.should_rebuild(v));
    assert!(graph.should_rebuild(x));

    graph.compute(v)?;
    assert_eq!(graph.value(v), Some(17));
    assert_eq!(x_builds.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn node_reached_along_paths_of_different_lengths_builds_once() -> TestResult {
    init_tracing();

    // top -> mid -> shared, and top -> shared directly.
    let mut graph = Graph::new();
    let leaf = graph.cell(1i64);
    let shared_builds = counter();
    let shared = graph.computable(&[leaf.into()], {
        let shared_builds = Arc::clone(&shared_builds);
        move |inputs| {
            shared_builds.fetch_add(1, Ordering::SeqCst);
            sum(inputs)
        }
    });
    let mid = graph.computable(&[shared.into()], sum);
    let top = graph.computable(&[mid.into(), shared.into()], sum);

    graph.compute(top)?;
    assert_eq!(graph.value(top), Some(2));

    graph.set(leaf, 5)?;
    graph.compute(top)?;
    assert_eq!(graph.value(top), Some(10));
    assert_eq!(shared_builds.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn string_pipeline_with_explicit_keys() -> TestResult {
    init_tracing();

    let mut graph = Graph::new();
    let greeting = graph.cell_with_key("Hello".to_string(), "greeting");
    let name = graph.cell_with_key("world".to_string(), "name");
    let sentence = graph.computable_with_key(&[greeting.into(), name.into()], "sentence", |inputs| {
        Ok(format!(
            "{}, {}!",
            inputs.value::<String>(0)?,
            inputs.value::<String>(1)?
        ))
    });
    let shout = graph.map(sentence, |s: &String| s.to_uppercase());

    graph.compute(shout)?;
    assert_eq!(graph.value(shout).as_deref(), Some("HELLO, WORLD!"));
    assert_eq!(graph.key(sentence), "sentence");

    graph.set(name, "there".to_string())?;
    assert_eq!(graph.value(shout).as_deref(), Some("HELLO, WORLD!"));
    graph.compute(shout)?;
    assert_eq!(graph.value(shout).as_deref(), Some("HELLO, THERE!"));
    Ok(())
}

#[test]
fn build_functions_can_read_child_keys() -> TestResult {
    let mut graph = Graph::new();
    let a = graph.cell_with_key(1u8, "a.txt");
    let b = graph.cell_with_key(2u8, "b.txt");
    let listing = graph.computable(&[a.into(), b.into()], |inputs| {
        Ok((0..inputs.len())
            .filter_map(|i| inputs.key(i))
            .collect::<Vec<_>>()
            .join(","))
    });

    graph.compute(listing)?;
    assert_eq!(graph.value(listing).as_deref(), Some("a.txt,b.txt"));
    Ok(())
}

#[test]
fn auto_cell_propagates_without_compute() -> TestResult {
    init_tracing();

    let mut graph = Graph::new();
    let y = graph.cell(2i64);
    let z = graph.cell(3i64);
    let x = graph.computable(&[y.into(), z.into()], sum);
    let w = graph.auto_cell(4i64);
    let v = graph.computable(&[w.into(), x.into()], sum);
    graph.compute(v)?;
    assert_eq!(graph.value(v), Some(9));

    graph.set(w, 5)?;
    assert!(!graph.should_rebuild(v));
    assert_eq!(graph.value(v), Some(10));
    Ok(())
}

#[test]
fn eager_walk_rebuilds_children_before_parents() -> TestResult {
    init_tracing();

    // a feeds left and top; left feeds top. top must see the new left.
    let mut graph = Graph::new();
    let a = graph.auto_cell(1i64);
    let left = graph.computable(&[a.into()], |inputs| Ok(inputs.value::<i64>(0)? * 10));
    let top = graph.computable(&[a.into(), left.into()], sum);
    graph.compute(top)?;
    assert_eq!(graph.value(top), Some(11));

    graph.set(a, 2)?;
    assert_eq!(graph.value(left), Some(20));
    assert_eq!(graph.value(top), Some(22));
    Ok(())
}

#[test]
fn failed_eager_write_leaves_unbuilt_dependents_stale() -> TestResult {
    init_tracing();

    let mut graph = Graph::new();
    let a = graph.auto_cell(1i64);
    let fail_next = Arc::new(AtomicBool::new(false));
    let b = graph.computable_with_key(&[a.into()], "b", {
        let fail_next = Arc::clone(&fail_next);
        move |inputs| {
            anyhow::ensure!(!fail_next.swap(false, Ordering::SeqCst), "flaky build");
            Ok(inputs.value::<i64>(0)?)
        }
    });
    let c = graph.computable(&[b.into()], |inputs| Ok(inputs.value::<i64>(0)? * 10));
    graph.compute(c)?;
    assert_eq!(graph.value(c), Some(10));

    fail_next.store(true, Ordering::SeqCst);
    let err = graph.set(a, 2).unwrap_err();
    assert!(matches!(&err, GraphError::Build { key, .. } if key == "b"));
    assert!(graph.should_rebuild(b));
    assert!(graph.should_rebuild(c));

    graph.compute(c)?;
    assert_eq!(graph.value(c), Some(20));
    Ok(())
}

#[test]
fn eager_walk_rebuilds_every_dependent_on_every_write() -> TestResult {
    let mut graph = Graph::new();
    let a = graph.auto_cell(0i64);
    let builds = counter();
    let _unread = graph.computable(&[a.into()], {
        let builds = Arc::clone(&builds);
        move |inputs| {
            builds.fetch_add(1, Ordering::SeqCst);
            sum(inputs)
        }
    });

    for i in 1..=3 {
        graph.set(a, i)?;
    }
    assert_eq!(builds.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn auto_computable_rebuilds_itself_and_dependents() -> TestResult {
    let mut graph = Graph::new();
    let a = graph.cell(1i64);
    let b = graph.cell(2i64);
    let total = graph.auto_computable(&[a.into()], sum);
    let report = graph.map(total, |t: &i64| format!("total={t}"));
    graph.compute(report)?;
    assert_eq!(graph.value(report).as_deref(), Some("total=1"));

    graph.add_children(total, &[b.into()])?;
    assert!(!graph.should_rebuild(total));
    assert_eq!(graph.value(total), Some(3));
    assert_eq!(graph.value(report).as_deref(), Some("total=3"));
    Ok(())
}

#[test]
fn add_children_invalidates_lazy_computable() -> TestResult {
    let mut graph = Graph::new();
    let a = graph.cell(1i64);
    let b = graph.cell(2i64);
    let total = graph.computable(&[a.into()], sum);
    graph.compute(total)?;

    graph.add_children(total, &[b.into()])?;
    assert!(graph.should_rebuild(total));
    assert_eq!(graph.parents(b), &[total.node()]);

    graph.compute(total)?;
    assert_eq!(graph.value(total), Some(3));
    Ok(())
}

#[test]
fn setting_an_equal_value_does_not_invalidate() -> TestResult {
    let mut graph = Graph::new();
    let a = graph.cell(7i64);
    let c = graph.map(a, |v: &i64| *v + 1);
    graph.compute(c)?;

    assert!(!graph.set(a, 7)?);
    assert!(!graph.should_rebuild(c));
    assert_eq!(graph.revision(a), 0);
    Ok(())
}

#[test]
fn invalidating_a_stale_node_again_is_harmless() -> TestResult {
    let mut graph = Graph::new();
    let a = graph.cell(1i64);
    let builds = counter();
    let c = graph.computable(&[a.into()], {
        let builds = Arc::clone(&builds);
        move |inputs| {
            builds.fetch_add(1, Ordering::SeqCst);
            sum(inputs)
        }
    });
    graph.compute(c)?;

    graph.invalidate(a)?;
    graph.invalidate(a)?;
    graph.invalidate(c)?;
    assert!(graph.should_rebuild(c));
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    graph.compute(c)?;
    assert_eq!(builds.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn failing_build_leaves_nodes_stale_until_retried() -> TestResult {
    init_tracing();

    let mut graph = Graph::new();
    let divisor = graph.cell(2i64);
    let quotient = graph.computable_with_key(&[divisor.into()], "quotient", |inputs| {
        let d = inputs.value::<i64>(0)?;
        anyhow::ensure!(d != 0, "division by zero");
        Ok(100 / d)
    });
    let label = graph.map(quotient, |q: &i64| format!("q={q}"));
    graph.compute(label)?;

    graph.set(divisor, 0)?;
    let err = graph.compute(label).unwrap_err();
    match &err {
        GraphError::Build { key, .. } => assert_eq!(key, "quotient"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("division by zero"));
    assert!(graph.should_rebuild(quotient));
    assert!(graph.should_rebuild(label));
    assert_eq!(graph.value(label).as_deref(), Some("q=50"));

    graph.set(divisor, 4)?;
    graph.compute(label)?;
    assert_eq!(graph.value(label).as_deref(), Some("q=25"));
    Ok(())
}

#[test]
fn reading_a_child_with_the_wrong_type_fails_the_build() {
    let mut graph = Graph::new();
    let a = graph.cell("text");
    let c = graph.computable_with_key(&[a.into()], "typed", |inputs| Ok(inputs.value::<i64>(0)?));

    let err = graph.compute(c).unwrap_err();
    assert!(err.to_string().contains("does not hold a value of the requested type"));
}

#[test]
fn roots_are_parentless_computables_above_a_node() {
    let mut graph = Graph::new();
    let y = graph.cell(2i64);
    let z = graph.cell(3i64);
    let x = graph.computable(&[y.into(), z.into()], sum);
    let w = graph.cell(4i64);
    let v = graph.computable(&[w.into(), x.into()], sum);
    let u = graph.computable(&[x.into()], sum);

    assert_eq!(graph.roots(y), vec![v.node(), u.node()]);
    assert_eq!(graph.roots(w), vec![v.node()]);
    assert_eq!(graph.roots(v), vec![v.node()]);
}

#[test]
fn migrated_cell_takes_over_child_positions() -> TestResult {
    let mut graph = Graph::new();
    let a = graph.cell(1i64);
    let old = graph.cell(10i64);
    let c = graph.cell(100i64);
    let first = graph.computable(&[a.into(), old.into(), c.into()], |inputs| {
        Ok(inputs.value::<i64>(0)? + 2 * inputs.value::<i64>(1)? + 3 * inputs.value::<i64>(2)?)
    });
    let second = graph.computable(&[old.into()], sum);
    graph.compute(first)?;
    graph.compute(second)?;

    let new = graph.cell(10i64);
    graph.migrate(old, new)?;

    assert_eq!(graph.children(first), &[a.node(), new.node(), c.node()]);
    assert_eq!(graph.children(second), &[new.node()]);
    assert!(graph.parents(old).is_empty());
    assert_eq!(graph.parents(new), &[first.node(), second.node()]);
    // The swap itself changes nothing.
    assert!(!graph.should_rebuild(first));

    graph.set(old, 99)?;
    assert!(!graph.should_rebuild(first));

    graph.set(new, 20)?;
    graph.compute(first)?;
    assert_eq!(graph.value(first), Some(1 + 40 + 300));
    Ok(())
}

#[test]
fn node_enum_supports_visitor_style_inspection() {
    let mut graph = Graph::new();
    let a = graph.cell(1i64);
    let b = graph.computable(&[a.into()], sum);

    let describe = |graph: &Graph, id: NodeId| match graph.node(id) {
        Node::Cell(cell) => format!("cell r{}", cell.revision()),
        Node::Computable(c) => format!("computable stale={}", c.should_rebuild()),
    };
    assert_eq!(describe(&graph, a.node()), "cell r0");
    assert_eq!(describe(&graph, b.node()), "computable stale=true");

    let kinds: Vec<bool> = graph.nodes().map(|(_, node)| matches!(node, Node::Cell(_))).collect();
    assert_eq!(kinds, vec![true, false]);
}

#[test]
fn custom_key_generator_names_nodes() {
    let mut next = 0;
    let mut graph = Graph::with_keys(move || {
        next += 1;
        format!("n{next}")
    });
    let a = graph.cell(1i64);
    let b = graph.map(a, |v: &i64| *v);
    assert_eq!(graph.key(a), "n1");
    assert_eq!(graph.key(b), "n2");
}
