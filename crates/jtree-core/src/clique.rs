//! Clique graphs: elimination trees, junction trees and binary join trees.
//!
//! A clique graph is an undirected graph whose vertices carry a set of
//! variables. It is stored as two ordered maps keyed by `CliqueId`, so trees
//! are plain index arenas and every traversal is reproducible.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::NodeSet;
use crate::id::{CliqueId, NodeId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliqueGraph {
    cliques: BTreeMap<CliqueId, NodeSet>,
    adjacency: BTreeMap<CliqueId, BTreeSet<CliqueId>>,
}

impl CliqueGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_clique(&mut self, id: CliqueId, nodes: NodeSet) -> Result<()> {
        if self.cliques.contains_key(&id) {
            return Err(Error::DuplicateClique(id));
        }
        self.cliques.insert(id, nodes);
        self.adjacency.insert(id, BTreeSet::new());
        Ok(())
    }

    /// Insert a clique under a fresh id (one past the largest id in use).
    pub fn add_fresh_clique(&mut self, nodes: NodeSet) -> CliqueId {
        let id = self.next_id();
        self.cliques.insert(id, nodes);
        self.adjacency.insert(id, BTreeSet::new());
        id
    }

    pub fn next_id(&self) -> CliqueId {
        self.cliques
            .keys()
            .next_back()
            .map(|c| CliqueId::new(c.get() + 1))
            .unwrap_or(CliqueId::new(0))
    }

    /// Remove a clique and its incident edges; returns its variables.
    pub fn erase_clique(&mut self, id: CliqueId) -> Result<NodeSet> {
        let nodes = self.cliques.remove(&id).ok_or(Error::InvalidClique(id))?;
        if let Some(neighbours) = self.adjacency.remove(&id) {
            for n in neighbours {
                if let Some(adj) = self.adjacency.get_mut(&n) {
                    adj.remove(&id);
                }
            }
        }
        Ok(nodes)
    }

    pub fn add_edge(&mut self, a: CliqueId, b: CliqueId) -> Result<bool> {
        if a == b {
            return Err(Error::Invariant(format!("self loop on clique {a}")));
        }
        if !self.cliques.contains_key(&a) {
            return Err(Error::InvalidClique(a));
        }
        if !self.cliques.contains_key(&b) {
            return Err(Error::InvalidClique(b));
        }
        let inserted = self
            .adjacency
            .get_mut(&a)
            .map(|adj| adj.insert(b))
            .unwrap_or(false);
        if let Some(adj) = self.adjacency.get_mut(&b) {
            adj.insert(a);
        }
        Ok(inserted)
    }

    pub fn erase_edge(&mut self, a: CliqueId, b: CliqueId) -> bool {
        let removed = self
            .adjacency
            .get_mut(&a)
            .map(|adj| adj.remove(&b))
            .unwrap_or(false);
        if let Some(adj) = self.adjacency.get_mut(&b) {
            adj.remove(&a);
        }
        removed
    }

    pub fn exists_clique(&self, id: CliqueId) -> bool {
        self.cliques.contains_key(&id)
    }

    pub fn exists_edge(&self, a: CliqueId, b: CliqueId) -> bool {
        self.adjacency
            .get(&a)
            .map(|adj| adj.contains(&b))
            .unwrap_or(false)
    }

    pub fn clique(&self, id: CliqueId) -> Result<&NodeSet> {
        self.cliques.get(&id).ok_or(Error::InvalidClique(id))
    }

    pub fn add_to_clique(&mut self, id: CliqueId, node: NodeId) -> Result<()> {
        self.cliques
            .get_mut(&id)
            .ok_or(Error::InvalidClique(id))?
            .insert(node);
        Ok(())
    }

    pub fn neighbours(&self, id: CliqueId) -> Result<&BTreeSet<CliqueId>> {
        self.adjacency.get(&id).ok_or(Error::InvalidClique(id))
    }

    /// Variables shared by two cliques.
    pub fn separator(&self, a: CliqueId, b: CliqueId) -> Result<NodeSet> {
        let ca = self.clique(a)?;
        let cb = self.clique(b)?;
        Ok(ca.intersection(cb).copied().collect())
    }

    /// `(id, variables)` in ascending id order.
    pub fn cliques(&self) -> impl Iterator<Item = (CliqueId, &NodeSet)> + '_ {
        self.cliques.iter().map(|(id, nodes)| (*id, nodes))
    }

    pub fn ids(&self) -> impl Iterator<Item = CliqueId> + '_ {
        self.cliques.keys().copied()
    }

    /// Each edge once, as `(smaller, larger)`, in ascending order.
    pub fn edges(&self) -> Vec<(CliqueId, CliqueId)> {
        self.adjacency
            .iter()
            .flat_map(|(&a, adj)| adj.iter().filter(move |&&b| a < b).map(move |&b| (a, b)))
            .collect()
    }

    pub fn size(&self) -> usize {
        self.cliques.len()
    }

    pub fn size_edges(&self) -> usize {
        self.adjacency.values().map(|adj| adj.len()).sum::<usize>() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.cliques.is_empty()
    }

    pub fn clear(&mut self) {
        self.cliques.clear();
        self.adjacency.clear();
    }

    pub fn cliques_containing(&self, node: NodeId) -> Vec<CliqueId> {
        self.cliques
            .iter()
            .filter(|(_, nodes)| nodes.contains(&node))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Merge `absorbed` into `into`: `into` takes over the variables and the
    /// neighbours of `absorbed`, which is then removed.
    pub fn absorb(&mut self, absorbed: CliqueId, into: CliqueId) -> Result<()> {
        if absorbed == into {
            return Err(Error::Invariant(format!("clique {into} cannot absorb itself")));
        }
        let neighbours: Vec<CliqueId> = self.neighbours(absorbed)?.iter().copied().collect();
        if !self.exists_clique(into) {
            return Err(Error::InvalidClique(into));
        }
        let nodes = self.erase_clique(absorbed)?;
        for n in neighbours {
            if n != into {
                self.add_edge(n, into)?;
            }
        }
        if let Some(target) = self.cliques.get_mut(&into) {
            target.extend(nodes);
        }
        Ok(())
    }

    /// Connected components, ordered by smallest member.
    pub fn components(&self) -> Vec<BTreeSet<CliqueId>> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for start in self.ids() {
            if !seen.insert(start) {
                continue;
            }
            let mut comp = BTreeSet::new();
            let mut queue = VecDeque::from([start]);
            while let Some(c) = queue.pop_front() {
                comp.insert(c);
                for &d in &self.adjacency[&c] {
                    if seen.insert(d) {
                        queue.push_back(d);
                    }
                }
            }
            out.push(comp);
        }
        out
    }

    /// True if the graph has no cycle.
    pub fn is_forest(&self) -> bool {
        self.size_edges() + self.components().len() == self.size()
    }

    /// Tree path between two cliques (both ends included), if connected.
    pub fn path(&self, from: CliqueId, to: CliqueId) -> Result<Option<Vec<CliqueId>>> {
        self.clique(from)?;
        self.clique(to)?;
        let mut prev: BTreeMap<CliqueId, CliqueId> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);
        let mut seen = BTreeSet::from([from]);
        while let Some(c) = queue.pop_front() {
            if c == to {
                let mut path = vec![to];
                let mut cur = to;
                while let Some(&p) = prev.get(&cur) {
                    path.push(p);
                    cur = p;
                }
                path.reverse();
                return Ok(Some(path));
            }
            for &d in &self.adjacency[&c] {
                if seen.insert(d) {
                    prev.insert(d, c);
                    queue.push_back(d);
                }
            }
        }
        Ok(None)
    }

    /// Running intersection: for every variable, the cliques containing it
    /// induce a connected subgraph. Only meaningful on forests.
    pub fn has_running_intersection(&self) -> bool {
        let mut holders: BTreeMap<NodeId, BTreeSet<CliqueId>> = BTreeMap::new();
        for (id, nodes) in &self.cliques {
            for n in nodes {
                holders.entry(*n).or_default().insert(*id);
            }
        }
        holders.values().all(|set| self.is_connected_within(set))
    }

    fn is_connected_within(&self, set: &BTreeSet<CliqueId>) -> bool {
        let Some(&start) = set.iter().next() else {
            return true;
        };
        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(c) = queue.pop_front() {
            for d in &self.adjacency[&c] {
                if set.contains(d) && seen.insert(*d) {
                    queue.push_back(*d);
                }
            }
        }
        seen.len() == set.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(v: u64) -> CliqueId {
        CliqueId::new(v)
    }

    fn set(vals: &[u64]) -> NodeSet {
        vals.iter().map(|&v| NodeId::new(v)).collect()
    }

    fn chain() -> CliqueGraph {
        let mut g = CliqueGraph::new();
        g.add_clique(c(0), set(&[1, 2])).unwrap();
        g.add_clique(c(1), set(&[2, 3])).unwrap();
        g.add_clique(c(2), set(&[3, 4])).unwrap();
        g.add_edge(c(0), c(1)).unwrap();
        g.add_edge(c(1), c(2)).unwrap();
        g
    }

    #[test]
    fn separators_and_paths() {
        let g = chain();
        assert_eq!(g.separator(c(0), c(1)).unwrap(), set(&[2]));
        assert_eq!(g.path(c(0), c(2)).unwrap(), Some(vec![c(0), c(1), c(2)]));
        assert_eq!(g.cliques_containing(NodeId::new(3)), vec![c(1), c(2)]);
        assert!(g.is_forest());
        assert!(g.has_running_intersection());
        assert_eq!(g.edges(), vec![(c(0), c(1)), (c(1), c(2))]);
    }

    #[test]
    fn running_intersection_violation_detected() {
        let mut g = chain();
        g.add_to_clique(c(2), NodeId::new(1)).unwrap();
        assert!(!g.has_running_intersection());
    }

    #[test]
    fn absorb_reconnects_neighbours() {
        let mut g = chain();
        g.absorb(c(1), c(0)).unwrap();
        assert!(!g.exists_clique(c(1)));
        assert!(g.exists_edge(c(0), c(2)));
        assert_eq!(g.clique(c(0)).unwrap(), &set(&[1, 2, 3]));
        assert_eq!(g.size_edges(), 1);
    }

    #[test]
    fn duplicate_and_missing_cliques() {
        let mut g = chain();
        assert!(matches!(
            g.add_clique(c(0), set(&[9])),
            Err(Error::DuplicateClique(_))
        ));
        assert!(matches!(g.clique(c(9)), Err(Error::InvalidClique(_))));
        assert_eq!(g.add_fresh_clique(set(&[7])), c(3));
        assert_eq!(g.components().len(), 2);
    }
}
