//! Greedy strategy minimising the weight of the created clique.
//!
//! At every step the node with the smallest log10 product of domain sizes
//! over itself and its remaining neighbours is eliminated. Ties (within
//! [`WEIGHT_EPSILON`](super::WEIGHT_EPSILON)) go to the node creating the
//! fewest fill-ins, then to the smallest node id.

use jtree_core::{DomainSizes, EdgeSet, NodeId, UndiGraph};
use tracing::trace;

use super::{EliminationSequenceStrategy, EliminationState, ScoreCache};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct DefaultEliminationSequenceStrategy {
    state: EliminationState,
    scores: ScoreCache,
}

impl DefaultEliminationSequenceStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_empty(&self) -> Self {
        let mut s = Self::new();
        s.state.set_record_fill_ins(self.state.records_fill_ins());
        s
    }
}

impl EliminationSequenceStrategy for DefaultEliminationSequenceStrategy {
    fn set_graph(&mut self, graph: &UndiGraph, domain_sizes: &DomainSizes) -> Result<bool> {
        self.scores.clear();
        self.state.bind(graph, domain_sizes)
    }

    fn next_node_to_eliminate(&mut self) -> Result<NodeId> {
        let candidates: Vec<NodeId> = self.state.graph().nodes().collect();
        let best = self.scores.best(&self.state, candidates)?;
        best.ok_or(Error::Exhausted)
    }

    fn elimination_update(&mut self, node: NodeId) -> Result<()> {
        if !self.state.graph().exists_node(node) {
            return Err(Error::InvalidNode(node));
        }
        self.scores.invalidate_around(&self.state, node)?;
        let added = self.state.eliminate(node)?;
        trace!(node = node.get(), fill_ins = added.len(), "greedy elimination");
        Ok(())
    }

    fn ask_fill_ins(&mut self, do_it: bool) {
        self.state.set_record_fill_ins(do_it);
    }

    fn provides_fill_ins(&self) -> bool {
        self.state.records_fill_ins()
    }

    fn fill_ins(&self) -> &EdgeSet {
        self.state.fill_ins()
    }

    fn working_graph(&self) -> &UndiGraph {
        self.state.graph()
    }

    fn clear(&mut self) {
        self.state.clear();
        self.scores.clear();
    }
}
