//! Elementary modifications of an undirected graph.

use std::fmt;

use jtree_core::{Edge, NodeId, UndiGraph};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GraphChange {
    EdgeAddition(Edge),
    EdgeDeletion(Edge),
}

impl GraphChange {
    pub fn addition(a: NodeId, b: NodeId) -> Self {
        Self::EdgeAddition(Edge::new(a, b))
    }

    pub fn deletion(a: NodeId, b: NodeId) -> Self {
        Self::EdgeDeletion(Edge::new(a, b))
    }

    pub fn edge(&self) -> Edge {
        match self {
            Self::EdgeAddition(e) | Self::EdgeDeletion(e) => *e,
        }
    }

    pub fn is_addition(&self) -> bool {
        matches!(self, Self::EdgeAddition(_))
    }

    /// Apply the change in place. Adding an existing edge or removing a
    /// missing one is an error.
    pub fn apply(&self, graph: &mut UndiGraph) -> Result<()> {
        let e = self.edge();
        match self {
            Self::EdgeAddition(_) => {
                if !graph.add_edge(e.first(), e.second())? {
                    return Err(Error::InvalidChange(format!("{self}: edge already present")));
                }
            }
            Self::EdgeDeletion(_) => {
                if !graph.erase_edge(e.first(), e.second()) {
                    return Err(Error::InvalidChange(format!("{self}: no such edge")));
                }
            }
        }
        Ok(())
    }

    /// Copy of `graph` with the change applied.
    pub fn applied_to(&self, graph: &UndiGraph) -> Result<UndiGraph> {
        let mut g = graph.clone();
        self.apply(&mut g)?;
        Ok(g)
    }
}

impl fmt::Display for GraphChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EdgeAddition(e) => write!(f, "+{e}"),
            Self::EdgeDeletion(e) => write!(f, "-{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: u64) -> NodeId {
        NodeId::new(v)
    }

    #[test]
    fn apply_and_revert() {
        let mut g = UndiGraph::from_edges([(n(1), n(2))]).unwrap();
        g.ensure_node(n(3));

        let add = GraphChange::addition(n(3), n(1));
        assert_eq!(add.edge(), Edge::new(n(1), n(3)));
        assert_eq!(add.to_string(), "+1-3");
        add.apply(&mut g).unwrap();
        assert!(g.exists_edge(n(1), n(3)));
        assert!(matches!(add.apply(&mut g), Err(Error::InvalidChange(_))));

        let del = GraphChange::deletion(n(1), n(3));
        let h = del.applied_to(&g).unwrap();
        assert!(!h.exists_edge(n(1), n(3)));
        assert!(g.exists_edge(n(1), n(3)));
        assert!(del.applied_to(&h).is_err());
    }
}
