//! Elimination trees and their contraction into junction trees.
//!
//! Clique `k` of an elimination tree is the clique created by the `k`-th
//! eliminated node: the node plus its neighbours at elimination time. Its
//! parent is the clique of the earliest-eliminated node among those
//! neighbours.
//!
//! Contraction merges every clique that is a subset of an adjacent clique
//! into that neighbour. Merging keeps the tree shape (the absorbing clique
//! inherits the absorbed one's neighbours) and never changes the variables of
//! the surviving clique.

use std::collections::BTreeMap;

use jtree_core::{CliqueGraph, CliqueId, NodeId, NodeSet};
use tracing::trace;

use crate::error::{Error, Result};

/// Elimination tree plus its child → parent map. Roots have no entry.
#[derive(Debug, Clone, Default)]
pub struct EliminationTree {
    pub tree: CliqueGraph,
    pub parents: BTreeMap<CliqueId, CliqueId>,
}

/// Build the elimination tree from the order and the clique each node
/// created (same indexing).
pub fn build_elimination_tree(order: &[NodeId], cliques: &[NodeSet]) -> Result<EliminationTree> {
    if order.len() != cliques.len() {
        return Err(Error::Invariant(format!(
            "{} eliminated nodes but {} cliques",
            order.len(),
            cliques.len()
        )));
    }
    let position: BTreeMap<NodeId, usize> = order.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    let mut tree = CliqueGraph::new();
    for (k, clique) in cliques.iter().enumerate() {
        tree.add_clique(CliqueId::new(k as u64), clique.clone())?;
    }

    let mut parents = BTreeMap::new();
    for (k, clique) in cliques.iter().enumerate() {
        let mut earliest: Option<usize> = None;
        for n in clique {
            let p = *position.get(n).ok_or(Error::InvalidNode(*n))?;
            if p > k && earliest.map_or(true, |e| p < e) {
                earliest = Some(p);
            }
        }
        if let Some(p) = earliest {
            let child = CliqueId::new(k as u64);
            let parent = CliqueId::new(p as u64);
            tree.add_edge(child, parent)?;
            parents.insert(child, parent);
        }
    }
    Ok(EliminationTree { tree, parents })
}

/// Junction tree obtained by contraction, and where each removed clique went.
#[derive(Debug, Clone, Default)]
pub struct Contraction {
    pub tree: CliqueGraph,
    /// Direct absorptions, removed clique → absorbing clique. Chains are
    /// possible; use [`Contraction::representative`].
    pub absorbed_into: BTreeMap<CliqueId, CliqueId>,
}

impl Contraction {
    /// Clique of the junction tree that holds `id`'s variables.
    pub fn representative(&self, id: CliqueId) -> CliqueId {
        let mut cur = id;
        while let Some(&next) = self.absorbed_into.get(&cur) {
            cur = next;
        }
        cur
    }
}

/// Contract an elimination tree into a junction tree.
///
/// Cliques are visited in ascending id (elimination) order. A visited clique
/// first swallows its subset neighbours, then is itself swallowed by a
/// neighbour containing it. Passes repeat until nothing changes, and the
/// result is checked for the running intersection property.
pub fn contract_elimination_tree(elimination_tree: &CliqueGraph) -> Result<Contraction> {
    let mut tree = elimination_tree.clone();
    let mut absorbed_into = BTreeMap::new();

    loop {
        let mut changed = false;
        let ids: Vec<CliqueId> = tree.ids().collect();
        for id in ids {
            if !tree.exists_clique(id) {
                continue;
            }
            while let Some(sub) = first_neighbour_where(&tree, id, |nb, me| nb.is_subset(me))? {
                tree.absorb(sub, id)?;
                absorbed_into.insert(sub, id);
                trace!(absorbed = sub.get(), into = id.get(), "clique contraction");
                changed = true;
            }
            if let Some(sup) = first_neighbour_where(&tree, id, |nb, me| me.is_subset(nb))? {
                tree.absorb(id, sup)?;
                absorbed_into.insert(id, sup);
                trace!(absorbed = id.get(), into = sup.get(), "clique contraction");
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    if !tree.is_forest() {
        return Err(Error::Invariant("contracted clique graph has a cycle".into()));
    }
    if !tree.has_running_intersection() {
        return Err(Error::Invariant(
            "junction tree violates the running intersection property".into(),
        ));
    }
    Ok(Contraction {
        tree,
        absorbed_into,
    })
}

fn first_neighbour_where<F>(tree: &CliqueGraph, id: CliqueId, pred: F) -> Result<Option<CliqueId>>
where
    F: Fn(&NodeSet, &NodeSet) -> bool,
{
    let me = tree.clique(id)?;
    for &nb in tree.neighbours(id)? {
        if pred(tree.clique(nb)?, me) {
            return Ok(Some(nb));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: u64) -> NodeId {
        NodeId::new(v)
    }

    fn c(v: u64) -> CliqueId {
        CliqueId::new(v)
    }

    fn set(vals: &[u64]) -> NodeSet {
        vals.iter().map(|&v| n(v)).collect()
    }

    /// Path 1-2-3 eliminated as 1, 2, 3.
    fn path_elimination() -> (Vec<NodeId>, Vec<NodeSet>) {
        (
            vec![n(1), n(2), n(3)],
            vec![set(&[1, 2]), set(&[2, 3]), set(&[3])],
        )
    }

    #[test]
    fn parents_follow_earliest_later_neighbour() {
        let (order, cliques) = path_elimination();
        let et = build_elimination_tree(&order, &cliques).unwrap();
        assert_eq!(et.parents.get(&c(0)), Some(&c(1)));
        assert_eq!(et.parents.get(&c(1)), Some(&c(2)));
        assert_eq!(et.parents.get(&c(2)), None);
        assert_eq!(et.tree.size_edges(), 2);
    }

    #[test]
    fn subset_cliques_are_absorbed() {
        let (order, cliques) = path_elimination();
        let et = build_elimination_tree(&order, &cliques).unwrap();
        let jt = contract_elimination_tree(&et.tree).unwrap();
        assert_eq!(jt.tree.size(), 2);
        assert_eq!(jt.absorbed_into.get(&c(2)), Some(&c(1)));
        assert_eq!(jt.representative(c(2)), c(1));
        assert_eq!(jt.representative(c(0)), c(0));
        assert!(jt.tree.exists_edge(c(0), c(1)));
    }

    #[test]
    fn chains_resolve_to_the_surviving_clique() {
        // Star centre 4 with leaves 1..3, eliminated leaves first then 4.
        let order = vec![n(1), n(2), n(3), n(4)];
        let cliques = vec![set(&[1, 4]), set(&[2, 4]), set(&[3, 4]), set(&[4])];
        let et = build_elimination_tree(&order, &cliques).unwrap();
        let jt = contract_elimination_tree(&et.tree).unwrap();
        assert_eq!(jt.tree.size(), 3);
        assert_eq!(jt.representative(c(3)), c(0));
        assert!(jt.tree.is_forest());
        assert!(jt.tree.has_running_intersection());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        assert!(matches!(
            build_elimination_tree(&[n(1)], &[]),
            Err(Error::Invariant(_))
        ));
    }
}
