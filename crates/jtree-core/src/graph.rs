//! Undirected graphs over `NodeId`s.
//!
//! The graph is an index-based adjacency map: every node owns the ordered set
//! of its neighbours. There are no back-pointers, so cloning a graph is a plain
//! deep copy and iteration order is always ascending by id.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::NodeId;

/// Ordered set of node ids.
pub type NodeSet = BTreeSet<NodeId>;

/// Domain size (number of states) of each variable.
pub type DomainSizes = BTreeMap<NodeId, usize>;

/// Undirected edge, always stored with `first < second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    first: NodeId,
    second: NodeId,
}

impl Edge {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b {
            Self {
                first: a,
                second: b,
            }
        } else {
            Self {
                first: b,
                second: a,
            }
        }
    }

    pub fn first(&self) -> NodeId {
        self.first
    }

    pub fn second(&self) -> NodeId {
        self.second
    }

    pub fn contains(&self, n: NodeId) -> bool {
        self.first == n || self.second == n
    }

    /// The extremity opposite to `n`, if `n` is an extremity.
    pub fn other(&self, n: NodeId) -> Option<NodeId> {
        if n == self.first {
            Some(self.second)
        } else if n == self.second {
            Some(self.first)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.first.get(), self.second.get())
    }
}

/// Ordered set of undirected edges.
pub type EdgeSet = BTreeSet<Edge>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndiGraph {
    adjacency: BTreeMap<NodeId, NodeSet>,
}

impl UndiGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph with the given nodes and no edge.
    pub fn with_nodes<I: IntoIterator<Item = NodeId>>(nodes: I) -> Self {
        Self {
            adjacency: nodes.into_iter().map(|n| (n, NodeSet::new())).collect(),
        }
    }

    /// Build a graph from an edge list; extremities are added as needed.
    pub fn from_edges<I: IntoIterator<Item = (NodeId, NodeId)>>(edges: I) -> Result<Self> {
        let mut g = Self::new();
        for (a, b) in edges {
            g.ensure_node(a);
            g.ensure_node(b);
            g.add_edge(a, b)?;
        }
        Ok(g)
    }

    /// Add a node with a fresh id (one past the largest id in use).
    pub fn add_node(&mut self) -> NodeId {
        let id = self
            .adjacency
            .keys()
            .next_back()
            .map(|n| NodeId::new(n.get() + 1))
            .unwrap_or(NodeId::new(0));
        self.adjacency.insert(id, NodeSet::new());
        id
    }

    pub fn add_node_with_id(&mut self, id: NodeId) -> Result<()> {
        if self.adjacency.contains_key(&id) {
            return Err(Error::DuplicateNode(id));
        }
        self.adjacency.insert(id, NodeSet::new());
        Ok(())
    }

    /// Insert `id` if absent. Returns true if it was inserted.
    pub fn ensure_node(&mut self, id: NodeId) -> bool {
        if self.adjacency.contains_key(&id) {
            return false;
        }
        self.adjacency.insert(id, NodeSet::new());
        true
    }

    /// Remove a node and its incident edges; returns its former neighbours.
    pub fn erase_node(&mut self, id: NodeId) -> Result<NodeSet> {
        let neighbours = self.adjacency.remove(&id).ok_or(Error::InvalidNode(id))?;
        for n in &neighbours {
            if let Some(adj) = self.adjacency.get_mut(n) {
                adj.remove(&id);
            }
        }
        Ok(neighbours)
    }

    /// Add edge `a - b`. Returns false if it already existed.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) -> Result<bool> {
        if a == b {
            return Err(Error::InvalidEdge(a, b, "self loops are not allowed".into()));
        }
        if !self.adjacency.contains_key(&a) {
            return Err(Error::InvalidNode(a));
        }
        if !self.adjacency.contains_key(&b) {
            return Err(Error::InvalidNode(b));
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

    /// Remove edge `a - b`. Returns true if it existed.
    pub fn erase_edge(&mut self, a: NodeId, b: NodeId) -> bool {
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

    pub fn exists_node(&self, id: NodeId) -> bool {
        self.adjacency.contains_key(&id)
    }

    pub fn exists_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.adjacency
            .get(&a)
            .map(|adj| adj.contains(&b))
            .unwrap_or(false)
    }

    pub fn neighbours(&self, id: NodeId) -> Result<&NodeSet> {
        self.adjacency.get(&id).ok_or(Error::InvalidNode(id))
    }

    pub fn degree(&self, id: NodeId) -> Result<usize> {
        Ok(self.neighbours(id)?.len())
    }

    /// Nodes in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn node_set(&self) -> NodeSet {
        self.adjacency.keys().copied().collect()
    }

    /// Each edge exactly once, in ascending `(first, second)` order.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.adjacency.iter().flat_map(|(&a, adj)| {
            adj.range((std::ops::Bound::Excluded(a), std::ops::Bound::Unbounded))
                .map(move |&b| Edge::new(a, b))
        })
    }

    pub fn edge_set(&self) -> EdgeSet {
        self.edges().collect()
    }

    pub fn size(&self) -> usize {
        self.adjacency.len()
    }

    pub fn size_edges(&self) -> usize {
        self.adjacency.values().map(|adj| adj.len()).sum::<usize>() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn clear(&mut self) {
        self.adjacency.clear();
    }

    /// Pairs of `nodes` that are not adjacent, i.e. the edges needed to make
    /// `nodes` a clique.
    pub fn missing_edges_among(&self, nodes: &NodeSet) -> Vec<Edge> {
        let mut missing = Vec::new();
        for (i, &a) in nodes.iter().enumerate() {
            for &b in nodes.iter().skip(i + 1) {
                if !self.exists_edge(a, b) {
                    missing.push(Edge::new(a, b));
                }
            }
        }
        missing
    }

    /// Connected components, each as a node set, ordered by smallest member.
    pub fn components(&self) -> Vec<NodeSet> {
        let mut seen = NodeSet::new();
        let mut out = Vec::new();
        for start in self.nodes() {
            if seen.contains(&start) {
                continue;
            }
            let mut comp = NodeSet::new();
            let mut stack = vec![start];
            seen.insert(start);
            while let Some(n) = stack.pop() {
                comp.insert(n);
                for &m in &self.adjacency[&n] {
                    if seen.insert(m) {
                        stack.push(m);
                    }
                }
            }
            out.push(comp);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: u64) -> NodeId {
        NodeId::new(v)
    }

    #[test]
    fn edges_are_normalised() {
        let e = Edge::new(n(5), n(2));
        assert_eq!(e.first(), n(2));
        assert_eq!(e.second(), n(5));
        assert_eq!(e, Edge::new(n(2), n(5)));
        assert_eq!(e.other(n(2)), Some(n(5)));
        assert_eq!(e.other(n(3)), None);
    }

    #[test]
    fn add_and_erase() {
        let mut g = UndiGraph::with_nodes((1..=4).map(n));
        assert!(g.add_edge(n(1), n(2)).unwrap());
        assert!(!g.add_edge(n(2), n(1)).unwrap());
        g.add_edge(n(2), n(3)).unwrap();
        g.add_edge(n(3), n(4)).unwrap();
        assert_eq!(g.size(), 4);
        assert_eq!(g.size_edges(), 3);

        let former = g.erase_node(n(2)).unwrap();
        assert_eq!(former, [n(1), n(3)].into_iter().collect());
        assert!(!g.exists_edge(n(1), n(2)));
        assert_eq!(g.size_edges(), 1);
        assert!(g.erase_edge(n(3), n(4)));
        assert!(!g.erase_edge(n(3), n(4)));
    }

    #[test]
    fn rejects_unknown_nodes_and_loops() {
        let mut g = UndiGraph::with_nodes([n(1)]);
        assert!(matches!(g.add_edge(n(1), n(9)), Err(Error::InvalidNode(x)) if x == n(9)));
        assert!(matches!(g.add_edge(n(1), n(1)), Err(Error::InvalidEdge(..))));
        assert!(matches!(g.neighbours(n(7)), Err(Error::InvalidNode(_))));
        assert!(matches!(g.add_node_with_id(n(1)), Err(Error::DuplicateNode(_))));
    }

    #[test]
    fn edge_iteration_is_ordered() {
        let g = UndiGraph::from_edges([(n(3), n(1)), (n(2), n(1)), (n(3), n(2))]).unwrap();
        let edges: Vec<_> = g.edges().collect();
        assert_eq!(
            edges,
            vec![
                Edge::new(n(1), n(2)),
                Edge::new(n(1), n(3)),
                Edge::new(n(2), n(3))
            ]
        );
    }

    #[test]
    fn missing_edges_and_components() {
        let mut g = UndiGraph::from_edges([(n(1), n(2)), (n(2), n(3))]).unwrap();
        g.ensure_node(n(7));
        let set: NodeSet = [n(1), n(2), n(3)].into_iter().collect();
        assert_eq!(g.missing_edges_among(&set), vec![Edge::new(n(1), n(3))]);
        let comps = g.components();
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[1], [n(7)].into_iter().collect());
        assert_eq!(g.add_node(), n(8));
    }
}
