//! Triangulation and junction-tree scenarios


use jtree::jtree_triangulation::{verify, BinaryJoinTreeConverter, Error};
use jtree::{EliminationStrategy, NodeSet, Triangulation, UndiGraph};
use test_graphs::*;

fn run(strategy: EliminationStrategy, g: &UndiGraph, size: usize) -> Triangulation {
    let mut t = Triangulation::with_graph(strategy, g, &uniform(g, size));
    let out = t.triangulate().expect("triangulation failed");
    verify::assert_triangulation(g, out);
    t
}

#[test]
fn test_cycle_descending_order() {
    let g = cycle(8);
    let mut t = run(
        EliminationStrategy::ordered(order(&[8, 7, 6, 5, 4, 3, 2, 1])),
        &g,
        10,
    );
    let out = t.triangulate().unwrap();
    let expected: Vec<_> = (3..=7).map(|v| edge(1, v)).collect();
    assert_eq!(out.fill_ins().iter().copied().collect::<Vec<_>>(), expected);
    assert_eq!(out.triangulated_graph().size_edges(), 13);
    assert_eq!(out.junction_tree().size(), 6);
    assert_eq!(out.junction_tree().size_edges(), 5);
    assert_eq!(out.induced_width(), 2);
    assert!((out.max_log10_clique_domain_size() - 3.0).abs() < 1e-9);
}

#[test]
fn test_chordal_graph_perfect_orders() {
    let g = two_cliques();
    assert_eq!(g.size_edges(), 14);
    assert!(verify::is_chordal(&g));

    let mut t = run(EliminationStrategy::ordered(order(&[1, 2, 3, 4, 5, 6, 7, 8])), &g, 2);
    let out = t.triangulate().unwrap();
    assert!(out.fill_ins().is_empty());
    assert_eq!(out.triangulated_graph().size_edges(), 14);
    assert_eq!(
        clique_sets(out.junction_tree()),
        vec![nodes(&[1, 2, 3, 4]), nodes(&[3, 4, 5]), nodes(&[5, 6, 7, 8])]
    );
    assert_eq!(out.junction_tree().size_edges(), 2);

    let mut t = run(EliminationStrategy::ordered(order(&[8, 7, 6, 5, 4, 3, 2, 1])), &g, 2);
    let out = t.triangulate().unwrap();
    assert!(out.fill_ins().is_empty());
    assert_eq!(out.junction_tree().size(), 3);
}

#[test]
fn test_chordal_graph_bad_orders() {
    let g = two_cliques();

    let mut t = run(EliminationStrategy::ordered(order(&[5, 6, 7, 8, 1, 2, 3, 4])), &g, 2);
    let out = t.triangulate().unwrap();
    let expected: Vec<_> = [(3, 6), (3, 7), (3, 8), (4, 6), (4, 7), (4, 8)]
        .iter()
        .map(|&(a, b)| edge(a, b))
        .collect();
    assert_eq!(out.fill_ins().iter().copied().collect::<Vec<_>>(), expected);
    assert_eq!(out.triangulated_graph().size_edges(), 20);
    assert_eq!(out.junction_tree().size(), 2);
    assert_eq!(out.junction_tree().size_edges(), 1);

    let mut t = run(EliminationStrategy::ordered(order(&[5, 4, 3, 2, 1, 6, 7, 8])), &g, 2);
    let out = t.triangulate().unwrap();
    assert_eq!(out.fill_ins().len(), 12);
    assert_eq!(out.triangulated_graph().size_edges(), 26);
    assert_eq!(out.junction_tree().size(), 2);
}

#[test]
fn test_two_cliques_sharing_an_edge() {
    let g = two_cliques_sharing_an_edge();
    assert_eq!(g.size(), 8);
    assert_eq!(g.size_edges(), 14);
    let perfect = [5, 6, 3, 7, 8, 4, 1, 2];

    let mut t = run(EliminationStrategy::ordered(order(&perfect)), &g, 10);
    let out = t.triangulate().unwrap();
    assert!(out.fill_ins().is_empty());
    assert_eq!(out.triangulated_graph().size(), 8);
    assert_eq!(out.triangulated_graph().size_edges(), 14);
    assert_eq!(
        clique_sets(out.junction_tree()),
        vec![
            nodes(&[1, 2, 3, 4]),
            nodes(&[1, 2, 7]),
            nodes(&[1, 8]),
            nodes(&[3, 4, 5, 6]),
        ]
    );
    assert!((out.max_log10_clique_domain_size() - 4.0).abs() < 1e-9);

    let reversed: Vec<u64> = perfect.iter().rev().copied().collect();
    let mut t = run(EliminationStrategy::ordered(order(&reversed)), &g, 10);
    let out = t.triangulate().unwrap();
    let expected: Vec<_> = [
        (3, 7),
        (3, 8),
        (4, 7),
        (4, 8),
        (5, 7),
        (5, 8),
        (6, 7),
        (6, 8),
        (7, 8),
    ]
    .iter()
    .map(|&(a, b)| edge(a, b))
    .collect();
    assert_eq!(out.fill_ins().iter().copied().collect::<Vec<_>>(), expected);
    assert_eq!(out.triangulated_graph().size(), 8);
    assert_eq!(out.triangulated_graph().size_edges(), 23);
    assert_eq!(
        clique_sets(out.junction_tree()),
        vec![
            nodes(&[1, 2, 3, 4, 7]),
            nodes(&[1, 3, 4, 7, 8]),
            nodes(&[3, 4, 5, 6, 7, 8]),
        ]
    );
    assert!((out.max_log10_clique_domain_size() - 6.0).abs() < 1e-9);
}

#[test]
fn test_greedy_strategy() {
    let g = cycle(8);
    let mut t = run(EliminationStrategy::greedy(), &g, 10);
    let out = t.triangulate().unwrap();
    assert_eq!(out.elimination_order(), order(&[1, 2, 3, 4, 5, 6, 7, 8]).as_slice());
    let expected: Vec<_> = (2..=6).map(|v| edge(v, 8)).collect();
    assert_eq!(out.fill_ins().iter().copied().collect::<Vec<_>>(), expected);

    // Cheap (odd) nodes first when eliminating them costs less.
    let sizes = g
        .nodes()
        .map(|v| (v, if v.get() % 2 == 1 { 2 } else { 5 }))
        .collect();
    let mut t = Triangulation::with_graph(EliminationStrategy::greedy(), &g, &sizes);
    let out = t.triangulate().unwrap();
    verify::assert_triangulation(&g, out);
    assert_eq!(out.elimination_order(), order(&[2, 1, 4, 3, 6, 5, 7, 8]).as_slice());

    let g = two_cliques();
    let mut t = run(EliminationStrategy::greedy(), &g, 2);
    let out = t.triangulate().unwrap();
    assert_eq!(out.elimination_order(), order(&[1, 2, 3, 4, 5, 6, 7, 8]).as_slice());
    assert!(out.fill_ins().is_empty());
}

#[test]
fn test_grid_greedy() {
    let g = grid(3);
    let mut t = run(EliminationStrategy::greedy(), &g, 2);
    let out = t.triangulate().unwrap();
    assert_eq!(out.elimination_order(), order(&[1, 3, 7, 9, 2, 4, 5, 6, 8]).as_slice());
    let expected: Vec<_> = [(2, 4), (2, 6), (4, 6), (4, 8), (6, 8)]
        .iter()
        .map(|&(a, b)| edge(a, b))
        .collect();
    assert_eq!(out.fill_ins().iter().copied().collect::<Vec<_>>(), expected);
    assert_eq!(out.triangulated_graph().size_edges(), 17);
    assert_eq!(
        clique_sets(out.junction_tree()),
        vec![
            nodes(&[1, 2, 4]),
            nodes(&[2, 3, 6]),
            nodes(&[2, 4, 5, 6]),
            nodes(&[4, 5, 6, 8]),
            nodes(&[4, 7, 8]),
            nodes(&[6, 8, 9]),
        ]
    );
    assert_eq!(out.junction_tree().size_edges(), 5);
}

#[test]
fn test_partial_order() {
    let subsets = vec![nodes(&[5, 6, 7, 8]), nodes(&[1, 2, 3, 4])];

    let g = cycle(8);
    let mut t = run(EliminationStrategy::partial_ordered(subsets.clone()).unwrap(), &g, 10);
    let out = t.triangulate().unwrap();
    verify::assert_partial_order_respected(out.elimination_order(), &subsets);
    assert_eq!(out.elimination_order(), order(&[5, 6, 7, 8, 1, 2, 3, 4]).as_slice());
    let expected: Vec<_> = [(1, 4), (2, 4), (4, 6), (4, 7), (4, 8)]
        .iter()
        .map(|&(a, b)| edge(a, b))
        .collect();
    assert_eq!(out.fill_ins().iter().copied().collect::<Vec<_>>(), expected);
    assert_eq!(out.triangulated_graph().size_edges(), 13);
    assert_eq!(out.junction_tree().size(), 6);
    assert_eq!(out.junction_tree().size_edges(), 5);

    let g = two_cliques();
    let mut t = run(EliminationStrategy::partial_ordered(subsets.clone()).unwrap(), &g, 2);
    let out = t.triangulate().unwrap();
    verify::assert_partial_order_respected(out.elimination_order(), &subsets);
    assert_eq!(out.elimination_order(), order(&[6, 7, 8, 5, 1, 2, 3, 4]).as_slice());
    assert!(out.fill_ins().is_empty());
    assert_eq!(out.junction_tree().size(), 3);
    assert_eq!(out.junction_tree().size_edges(), 2);
}

#[test]
fn test_overlapping_partial_order_rejected() {
    let subsets = vec![nodes(&[1, 2]), nodes(&[2, 3])];
    assert!(matches!(
        EliminationStrategy::partial_ordered(subsets),
        Err(Error::OrderMismatch(_))
    ));
}

#[test]
fn test_order_must_cover_the_graph() {
    let g = cycle(4);
    let mut t = Triangulation::with_graph(
        EliminationStrategy::ordered(order(&[1, 2, 3])),
        &g,
        &uniform(&g, 2),
    );
    assert!(t.triangulate().is_err());
}

#[test]
fn test_empty_graph_rejected() {
    let g = UndiGraph::new();
    let mut t = Triangulation::with_graph(EliminationStrategy::greedy(), &g, &uniform(&g, 2));
    assert!(matches!(t.triangulate(), Err(Error::InvalidGraph(_))));
}

#[test]
fn test_deterministic_fingerprint() {
    let g = grid(3);
    let a = run(EliminationStrategy::greedy(), &g, 3)
        .triangulate()
        .unwrap()
        .fingerprint()
        .unwrap();
    let b = run(EliminationStrategy::greedy(), &g, 3)
        .triangulate()
        .unwrap()
        .fingerprint()
        .unwrap();
    assert_eq!(a, b);

    let c = run(EliminationStrategy::ordered(order(&[9, 8, 7, 6, 5, 4, 3, 2, 1])), &g, 3)
        .triangulate()
        .unwrap()
        .fingerprint()
        .unwrap();
    assert_ne!(a, c);
}

#[test]
fn test_rebinding_identical_inputs_is_stable() {
    let g = two_cliques_sharing_an_edge();
    let sizes = uniform(&g, 10);
    let reversed = order(&[2, 1, 4, 8, 7, 3, 6, 5]);

    let mut t = Triangulation::with_graph(EliminationStrategy::ordered(reversed.clone()), &g, &sizes);
    let first = t.triangulate().unwrap().clone();

    assert!(!t.set_graph(&g, &sizes));
    t.set_strategy(EliminationStrategy::ordered(reversed));
    assert!(!t.is_triangulated());
    let second = t.triangulate().unwrap();

    assert_eq!(first.fill_ins(), second.fill_ins());
    assert_eq!(first.elimination_order(), second.elimination_order());
    assert_eq!(first.junction_tree(), second.junction_tree());
    assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
}

#[test]
fn test_binary_join_tree_from_grid() {
    let g = grid(3);
    let mut t = run(EliminationStrategy::greedy(), &g, 2);
    let out = t.triangulate().unwrap();
    let bjt = BinaryJoinTreeConverter::new()
        .convert(out.junction_tree(), &uniform(&g, 2), &Default::default())
        .unwrap();
    assert!(bjt.max_children() <= 2);
    assert_eq!(bjt.roots.len(), 1);
    assert!(bjt.tree.is_forest());
    // Original cliques survive unchanged.
    for (id, clique) in out.junction_tree().cliques() {
        assert_eq!(bjt.tree.clique(id).unwrap(), clique);
    }
    let every: NodeSet = bjt.tree.cliques().flat_map(|(_, c)| c.iter().copied()).collect();
    assert_eq!(every, g.node_set());
}
