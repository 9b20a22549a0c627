//! Reshape a junction tree so that every clique has at most two children.
//!
//! Each connected component is rooted (at a caller-chosen clique or at its
//! smallest id) and walked top-down. A clique with more than two children
//! repeatedly gets the pair of children whose separators span the smallest
//! domain grouped under a new auxiliary clique holding exactly the union of
//! those two separators. That union lies inside the parent clique, so existing
//! cliques are never enlarged and running intersection is kept.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use jtree_core::{CliqueGraph, CliqueId, DomainSizes, NodeSet};
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::strategy::WEIGHT_EPSILON;
use crate::triangulation::log10_domain;

#[derive(Debug, Clone, Serialize)]
pub struct BinaryJoinTree {
    pub tree: CliqueGraph,
    /// One root per connected component.
    pub roots: BTreeSet<CliqueId>,
    /// Child → parent. Roots have no entry.
    pub parents: BTreeMap<CliqueId, CliqueId>,
    /// Cliques introduced by the conversion.
    pub auxiliary: BTreeSet<CliqueId>,
}

impl BinaryJoinTree {
    pub fn children(&self, id: CliqueId) -> Vec<CliqueId> {
        self.parents
            .iter()
            .filter(|(_, p)| **p == id)
            .map(|(c, _)| *c)
            .collect()
    }

    pub fn max_children(&self) -> usize {
        let mut counts: BTreeMap<CliqueId, usize> = BTreeMap::new();
        for p in self.parents.values() {
            *counts.entry(*p).or_default() += 1;
        }
        counts.values().copied().max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryJoinTreeConverter;

impl BinaryJoinTreeConverter {
    pub fn new() -> Self {
        Self
    }

    /// Convert `junction_tree`. `roots` may name at most one clique per
    /// component; components without one are rooted at their smallest id.
    pub fn convert(
        &self,
        junction_tree: &CliqueGraph,
        domain_sizes: &DomainSizes,
        roots: &BTreeSet<CliqueId>,
    ) -> Result<BinaryJoinTree> {
        if !junction_tree.is_forest() {
            return Err(Error::InvalidGraph("a junction tree must not contain cycles".into()));
        }
        let chosen = choose_roots(junction_tree, roots)?;

        let mut tree = junction_tree.clone();
        let mut parents = BTreeMap::new();
        let mut auxiliary = BTreeSet::new();

        for &root in &chosen {
            let mut queue = VecDeque::from([root]);
            while let Some(current) = queue.pop_front() {
                let parent = parents.get(&current).copied();
                let mut children: Vec<CliqueId> = tree
                    .neighbours(current)?
                    .iter()
                    .copied()
                    .filter(|c| Some(*c) != parent)
                    .collect();

                while children.len() > 2 {
                    let (i, j, union) = cheapest_pair(&tree, current, &children, domain_sizes)?;
                    let (a, b) = (children[i], children[j]);
                    let aux = tree.add_fresh_clique(union);
                    tree.erase_edge(current, a);
                    tree.erase_edge(current, b);
                    tree.add_edge(current, aux)?;
                    tree.add_edge(aux, a)?;
                    tree.add_edge(aux, b)?;
                    auxiliary.insert(aux);
                    trace!(
                        parent = current.get(),
                        aux = aux.get(),
                        left = a.get(),
                        right = b.get(),
                        "grouped children"
                    );
                    children[i] = aux;
                    children.remove(j);
                }

                for child in children {
                    parents.insert(child, current);
                    queue.push_back(child);
                }
            }
        }

        debug!(
            cliques = tree.size(),
            auxiliary = auxiliary.len(),
            roots = chosen.len(),
            "binary join tree built"
        );
        Ok(BinaryJoinTree {
            tree,
            roots: chosen,
            parents,
            auxiliary,
        })
    }
}

fn choose_roots(tree: &CliqueGraph, roots: &BTreeSet<CliqueId>) -> Result<BTreeSet<CliqueId>> {
    let components = tree.components();
    let mut chosen: Vec<Option<CliqueId>> = vec![None; components.len()];
    for &r in roots {
        let idx = components
            .iter()
            .position(|comp| comp.contains(&r))
            .ok_or(jtree_core::Error::InvalidClique(r))?;
        if let Some(existing) = chosen[idx] {
            return Err(Error::InvalidGraph(format!(
                "cliques {existing} and {r} are both roots of the same component"
            )));
        }
        chosen[idx] = Some(r);
    }
    Ok(components
        .iter()
        .zip(chosen)
        .filter_map(|(comp, root)| root.or_else(|| comp.iter().next().copied()))
        .collect())
}

/// Pair of children whose separator union has the smallest domain. Ties go to
/// the first pair in `(i, j)` order.
fn cheapest_pair(
    tree: &CliqueGraph,
    parent: CliqueId,
    children: &[CliqueId],
    domain_sizes: &DomainSizes,
) -> Result<(usize, usize, NodeSet)> {
    let separators = children
        .iter()
        .map(|c| tree.separator(parent, *c))
        .collect::<jtree_core::Result<Vec<NodeSet>>>()?;

    let mut best: Option<(usize, usize, NodeSet, f64)> = None;
    for i in 0..children.len() {
        for j in (i + 1)..children.len() {
            let union: NodeSet = separators[i].union(&separators[j]).copied().collect();
            let weight = log10_domain(&union, domain_sizes)?;
            let replace = match &best {
                Some((_, _, _, w)) => weight < *w - WEIGHT_EPSILON,
                None => true,
            };
            if replace {
                best = Some((i, j, union, weight));
            }
        }
    }
    best.map(|(i, j, union, _)| (i, j, union))
        .ok_or_else(|| Error::Invariant("fewer than two children to group".into()))
}
