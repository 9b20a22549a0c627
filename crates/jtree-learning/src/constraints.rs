//! Structural constraints restricting which graph changes a search may try.

use jtree_core::{Edge, EdgeSet, UndiGraph};

use crate::changes::GraphChange;

pub trait StructuralConstraint: Sync {
    /// True if `change` may be applied to `graph`.
    fn check_modification(&self, graph: &UndiGraph, change: &GraphChange) -> bool;
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConstraint;

impl StructuralConstraint for NoConstraint {
    fn check_modification(&self, _graph: &UndiGraph, _change: &GraphChange) -> bool {
        true
    }
}

/// Caps the number of neighbours of every node. Deletions are always allowed.
#[derive(Debug, Clone, Copy)]
pub struct MaxNeighbours {
    pub max: usize,
}

impl MaxNeighbours {
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl StructuralConstraint for MaxNeighbours {
    fn check_modification(&self, graph: &UndiGraph, change: &GraphChange) -> bool {
        match change {
            GraphChange::EdgeDeletion(_) => true,
            GraphChange::EdgeAddition(e) => [e.first(), e.second()]
                .iter()
                .all(|n| graph.degree(*n).map_or(false, |d| d < self.max)),
        }
    }
}

/// Edges that may never be added.
#[derive(Debug, Clone, Default)]
pub struct ForbiddenEdges {
    edges: EdgeSet,
}

impl ForbiddenEdges {
    pub fn new<I: IntoIterator<Item = Edge>>(edges: I) -> Self {
        Self {
            edges: edges.into_iter().collect(),
        }
    }

    pub fn forbid(&mut self, edge: Edge) -> bool {
        self.edges.insert(edge)
    }

    pub fn edges(&self) -> &EdgeSet {
        &self.edges
    }
}

impl StructuralConstraint for ForbiddenEdges {
    fn check_modification(&self, _graph: &UndiGraph, change: &GraphChange) -> bool {
        match change {
            GraphChange::EdgeAddition(e) => !self.edges.contains(e),
            GraphChange::EdgeDeletion(_) => true,
        }
    }
}

/// Both constraints must accept.
impl<A: StructuralConstraint, B: StructuralConstraint> StructuralConstraint for (A, B) {
    fn check_modification(&self, graph: &UndiGraph, change: &GraphChange) -> bool {
        self.0.check_modification(graph, change) && self.1.check_modification(graph, change)
    }
}
