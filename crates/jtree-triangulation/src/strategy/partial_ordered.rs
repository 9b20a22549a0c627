//! Greedy strategy constrained by an ordered list of disjoint node subsets.

use jtree_core::{DomainSizes, EdgeSet, NodeId, NodeSet, UndiGraph};
use tracing::trace;

use super::{EliminationSequenceStrategy, EliminationState, ScoreCache};
use crate::error::{Error, Result};

/// Eliminates every node of subset `i` before any node of subset `i + 1`.
/// Within the current subset the greedy rule of
/// [`DefaultEliminationSequenceStrategy`](super::DefaultEliminationSequenceStrategy)
/// applies.
#[derive(Debug, Clone, Default)]
pub struct PartialOrderedEliminationSequenceStrategy {
    state: EliminationState,
    scores: ScoreCache,
    subsets: Option<Vec<NodeSet>>,
    subset_index: usize,
    eligible: NodeSet,
}

impl PartialOrderedEliminationSequenceStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partial_order(subsets: Vec<NodeSet>) -> Result<Self> {
        check_disjoint(&subsets)?;
        Ok(Self {
            subsets: Some(subsets),
            ..Default::default()
        })
    }

    pub fn new_empty(&self) -> Self {
        let mut s = Self {
            subsets: self.subsets.clone(),
            ..Default::default()
        };
        s.state.set_record_fill_ins(self.state.records_fill_ins());
        s
    }

    pub fn partial_order(&self) -> Option<&[NodeSet]> {
        self.subsets.as_deref()
    }

    /// Index of the subset nodes are currently drawn from.
    pub fn subset_index(&self) -> usize {
        self.subset_index
    }

    /// Replace the partial order. Returns true if it differs from the previous
    /// one. With a bound graph, elimination restarts at the first subset that
    /// still has nodes in the working graph.
    pub fn set_partial_order(&mut self, subsets: Vec<NodeSet>) -> Result<bool> {
        check_disjoint(&subsets)?;
        let changed = self.subsets.as_deref() != Some(subsets.as_slice());
        self.subsets = Some(subsets);
        self.subset_index = 0;
        self.eligible.clear();
        if let Some(nodes) = self.state.bound_nodes() {
            self.check_coverage(&nodes)?;
            self.refresh_eligible();
        }
        Ok(changed)
    }

    fn check_coverage(&self, nodes: &NodeSet) -> Result<()> {
        let subsets = self
            .subsets
            .as_ref()
            .ok_or_else(|| Error::OrderMismatch("no partial order supplied".into()))?;
        if let Some(missing) = nodes
            .iter()
            .find(|n| !subsets.iter().any(|s| s.contains(n)))
        {
            return Err(Error::OrderMismatch(format!(
                "node {missing} of the graph belongs to no subset of the partial order"
            )));
        }
        Ok(())
    }

    /// Move to the first subset, from the current one on, that still has
    /// nodes in the working graph.
    fn refresh_eligible(&mut self) {
        let Some(subsets) = &self.subsets else {
            return;
        };
        let graph = self.state.graph();
        self.eligible.retain(|n| graph.exists_node(*n));
        while self.eligible.is_empty() && self.subset_index < subsets.len() {
            self.eligible = subsets[self.subset_index]
                .iter()
                .copied()
                .filter(|n| graph.exists_node(*n))
                .collect();
            if self.eligible.is_empty() {
                self.subset_index += 1;
            }
        }
    }
}

fn check_disjoint(subsets: &[NodeSet]) -> Result<()> {
    let mut seen = NodeSet::new();
    for (i, subset) in subsets.iter().enumerate() {
        for n in subset {
            if !seen.insert(*n) {
                return Err(Error::OrderMismatch(format!(
                    "node {n} appears more than once in the partial order (subset {i})"
                )));
            }
        }
    }
    Ok(())
}

impl EliminationSequenceStrategy for PartialOrderedEliminationSequenceStrategy {
    fn set_graph(&mut self, graph: &UndiGraph, domain_sizes: &DomainSizes) -> Result<bool> {
        let changed = self.state.bind(graph, domain_sizes)?;
        self.scores.clear();
        self.subset_index = 0;
        self.eligible.clear();
        self.check_coverage(&graph.node_set())?;
        self.refresh_eligible();
        Ok(changed)
    }

    fn next_node_to_eliminate(&mut self) -> Result<NodeId> {
        let candidates: Vec<NodeId> = self.eligible.iter().copied().collect();
        let best = self.scores.best(&self.state, candidates)?;
        best.ok_or(Error::Exhausted)
    }

    fn elimination_update(&mut self, node: NodeId) -> Result<()> {
        if !self.state.graph().exists_node(node) {
            return Err(Error::InvalidNode(node));
        }
        self.scores.invalidate_around(&self.state, node)?;
        self.state.eliminate(node)?;
        self.eligible.remove(&node);
        self.refresh_eligible();
        trace!(
            node = node.get(),
            subset = self.subset_index,
            "partial-ordered elimination"
        );
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
        self.subset_index = 0;
        self.eligible.clear();
    }
}
