//! Verification helpers for triangulations and junction trees.
//!
//! The predicates (`is_chordal`, `maximal_cliques`, ...) are usable anywhere.
//! The `assert_*` functions panic with a descriptive message and are meant
//! for tests and debug builds.

use std::collections::BTreeMap;

use jtree_core::{CliqueGraph, CliqueId, NodeId, NodeSet, UndiGraph};

use crate::error::{Error, Result};
use crate::triangulation::Triangulated;

/// Maximum cardinality search visiting order. Ties go to the smallest id.
/// The reverse of this order is a perfect elimination order iff the graph is
/// chordal.
pub fn maximum_cardinality_search(graph: &UndiGraph) -> Vec<NodeId> {
    let mut weight: BTreeMap<NodeId, usize> = graph.nodes().map(|n| (n, 0)).collect();
    let mut order = Vec::with_capacity(graph.size());
    while !weight.is_empty() {
        let mut pick: Option<(NodeId, usize)> = None;
        for (&n, &w) in &weight {
            if pick.map_or(true, |(_, best)| w > best) {
                pick = Some((n, w));
            }
        }
        let Some((node, _)) = pick else { break };
        weight.remove(&node);
        if let Ok(neighbours) = graph.neighbours(node) {
            for m in neighbours {
                if let Some(w) = weight.get_mut(m) {
                    *w += 1;
                }
            }
        }
        order.push(node);
    }
    order
}

/// True if eliminating `order` in `graph` adds no edge.
pub fn is_perfect_elimination_order(graph: &UndiGraph, order: &[NodeId]) -> bool {
    if order.len() != graph.size() {
        return false;
    }
    let position: BTreeMap<NodeId, usize> = order.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    if position.len() != order.len() {
        return false;
    }
    order.iter().enumerate().all(|(i, v)| {
        let Ok(neighbours) = graph.neighbours(*v) else {
            return false;
        };
        let later: NodeSet = neighbours
            .iter()
            .copied()
            .filter(|n| position.get(n).is_some_and(|p| *p > i))
            .collect();
        graph.missing_edges_among(&later).is_empty()
    })
}

pub fn perfect_elimination_order(graph: &UndiGraph) -> Option<Vec<NodeId>> {
    let mut order = maximum_cardinality_search(graph);
    order.reverse();
    is_perfect_elimination_order(graph, &order).then_some(order)
}

pub fn is_chordal(graph: &UndiGraph) -> bool {
    perfect_elimination_order(graph).is_some()
}

/// Maximal cliques of a chordal graph, in ascending order of their sets.
pub fn maximal_cliques(graph: &UndiGraph) -> Result<Vec<NodeSet>> {
    let order = perfect_elimination_order(graph)
        .ok_or_else(|| Error::InvalidGraph("maximal cliques need a chordal graph".into()))?;
    let position: BTreeMap<NodeId, usize> = order.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    let mut candidates: Vec<NodeSet> = Vec::with_capacity(order.len());
    for (i, v) in order.iter().enumerate() {
        let mut clique: NodeSet = graph
            .neighbours(*v)?
            .iter()
            .copied()
            .filter(|n| position.get(n).is_some_and(|p| *p > i))
            .collect();
        clique.insert(*v);
        candidates.push(clique);
    }
    let mut maximal: Vec<NodeSet> = candidates
        .iter()
        .filter(|c| !candidates.iter().any(|o| o.len() > c.len() && c.is_subset(o)))
        .cloned()
        .collect();
    maximal.sort();
    maximal.dedup();
    Ok(maximal)
}

/// No clique of `tree` is contained in another one.
pub fn is_non_redundant(tree: &CliqueGraph) -> bool {
    let cliques: Vec<&NodeSet> = tree.cliques().map(|(_, c)| c).collect();
    cliques.iter().enumerate().all(|(i, a)| {
        cliques
            .iter()
            .enumerate()
            .all(|(j, b)| i == j || !a.is_subset(b))
    })
}

pub fn assert_running_intersection(tree: &CliqueGraph) {
    assert!(tree.is_forest(), "clique graph is not a forest");
    assert!(
        tree.has_running_intersection(),
        "clique graph violates the running intersection property"
    );
    assert_intersections_on_paths(tree);
}

/// The intersection of any two connected cliques is contained in every
/// clique on the path between them.
pub fn assert_intersections_on_paths(tree: &CliqueGraph) {
    let ids: Vec<CliqueId> = tree.ids().collect();
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            let path = match tree.path(a, b) {
                Ok(Some(path)) => path,
                Ok(None) => continue,
                Err(e) => panic!("no path between {a} and {b}: {e}"),
            };
            let shared: NodeSet = match (tree.clique(a), tree.clique(b)) {
                (Ok(x), Ok(y)) => x.intersection(y).copied().collect(),
                _ => panic!("clique {a} or {b} vanished"),
            };
            for c in path {
                assert!(
                    tree.clique(c).is_ok_and(|nodes| shared.is_subset(nodes)),
                    "clique {c} on the path {a} .. {b} misses part of their intersection"
                );
            }
        }
    }
}

pub fn assert_non_redundant(tree: &CliqueGraph) {
    for (id, a) in tree.cliques() {
        for (other, b) in tree.cliques() {
            assert!(
                id == other || !a.is_subset(b),
                "clique {id} is contained in clique {other}"
            );
        }
    }
}

/// Check every structural property of a triangulation of `original`.
pub fn assert_triangulation(original: &UndiGraph, out: &Triangulated) {
    let tri = out.triangulated_graph();
    assert_eq!(
        out.elimination_order().len(),
        original.size(),
        "elimination order does not cover every node"
    );
    for e in out.fill_ins() {
        assert!(
            !original.exists_edge(e.first(), e.second()),
            "fill-in {e} duplicates an original edge"
        );
    }
    let mut expected = original.edge_set();
    expected.extend(out.fill_ins().iter().copied());
    assert_eq!(tri.edge_set(), expected, "triangulated graph != original + fill-ins");
    assert!(
        is_perfect_elimination_order(tri, out.elimination_order()),
        "elimination order is not perfect for the triangulated graph"
    );

    let jt = out.junction_tree();
    for n in original.nodes() {
        assert!(
            !jt.cliques_containing(n).is_empty(),
            "node {n} is in no junction-tree clique"
        );
    }
    assert_running_intersection(jt);
    assert_non_redundant(jt);
    let maximal = match maximal_cliques(tri) {
        Ok(m) => m,
        Err(e) => panic!("triangulated graph is not chordal: {e}"),
    };
    let present: Vec<&NodeSet> = jt.cliques().map(|(_, c)| c).collect();
    for clique in &maximal {
        assert!(
            present.contains(&clique),
            "maximal clique {clique:?} missing from the junction tree"
        );
    }
    assert_eq!(maximal.len(), jt.size(), "junction tree has non-maximal cliques");
}

/// No node of subset `i + 1` precedes a node of subset `i` in `order`.
pub fn assert_partial_order_respected(order: &[NodeId], subsets: &[NodeSet]) {
    let rank: BTreeMap<NodeId, usize> = subsets
        .iter()
        .enumerate()
        .flat_map(|(i, s)| s.iter().map(move |n| (*n, i)))
        .collect();
    let mut highest = 0;
    for n in order {
        let Some(&r) = rank.get(n) else { continue };
        assert!(
            r >= highest,
            "node {n} of subset {r} eliminated after a node of subset {highest}"
        );
        highest = r;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: u64) -> NodeId {
        NodeId::new(v)
    }

    fn cycle(len: u64) -> UndiGraph {
        UndiGraph::from_edges((1..=len).map(|i| (n(i), n(i % len + 1)))).unwrap()
    }

    #[test]
    fn cycles_are_not_chordal() {
        assert!(!is_chordal(&cycle(4)));
        assert!(is_chordal(&cycle(3)));
        let mut g = cycle(4);
        g.add_edge(n(1), n(3)).unwrap();
        assert!(is_chordal(&g));
        assert!(maximal_cliques(&cycle(5)).is_err());
    }

    #[test]
    #[should_panic(expected = "misses part of their intersection")]
    fn broken_path_panics() {
        let set = |vals: &[u64]| -> NodeSet { vals.iter().map(|&v| n(v)).collect() };
        let mut tree = CliqueGraph::new();
        tree.add_clique(CliqueId::new(0), set(&[1, 2])).unwrap();
        tree.add_clique(CliqueId::new(1), set(&[3])).unwrap();
        tree.add_clique(CliqueId::new(2), set(&[1, 4])).unwrap();
        tree.add_edge(CliqueId::new(0), CliqueId::new(1)).unwrap();
        tree.add_edge(CliqueId::new(1), CliqueId::new(2)).unwrap();
        assert!(!tree.has_running_intersection());
        assert_intersections_on_paths(&tree);
    }

    #[test]
    fn maximal_cliques_of_chordal_graph() {
        let mut g = cycle(4);
        g.add_edge(n(1), n(3)).unwrap();
        g.ensure_node(n(9));
        let cliques = maximal_cliques(&g).unwrap();
        let expected: Vec<NodeSet> = vec![
            [n(1), n(2), n(3)].into_iter().collect(),
            [n(1), n(3), n(4)].into_iter().collect(),
            [n(9)].into_iter().collect(),
        ];
        assert_eq!(cliques, expected);
    }

    #[test]
    fn perfect_order_check() {
        let g = cycle(4);
        assert!(!is_perfect_elimination_order(&g, &[n(1), n(2), n(3), n(4)]));
        assert!(!is_perfect_elimination_order(&g, &[n(1), n(2)]));
    }

    #[test]
    #[should_panic(expected = "eliminated after")]
    fn partial_order_violation_panics() {
        let subsets: Vec<NodeSet> = vec![[n(1)].into_iter().collect(), [n(2)].into_iter().collect()];
        assert_partial_order_respected(&[n(2), n(1)], &subsets);
    }
}
