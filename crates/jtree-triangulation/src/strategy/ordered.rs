//! Strategy following a caller-supplied total order.

use jtree_core::{DomainSizes, EdgeSet, NodeId, NodeSet, UndiGraph};

use super::{EliminationSequenceStrategy, EliminationState};
use crate::error::{Error, Result};

/// Eliminates nodes in the order given by the caller.
///
/// Order entries that are not in the graph are skipped. Every graph node must
/// appear in the order; otherwise binding fails with `OrderMismatch`.
#[derive(Debug, Clone, Default)]
pub struct OrderedEliminationSequenceStrategy {
    state: EliminationState,
    order: Option<Vec<NodeId>>,
    position: usize,
}

impl OrderedEliminationSequenceStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(order: Vec<NodeId>) -> Self {
        Self {
            order: Some(order),
            ..Default::default()
        }
    }

    pub fn new_empty(&self) -> Self {
        let mut s = Self {
            order: self.order.clone(),
            ..Default::default()
        };
        s.state.set_record_fill_ins(self.state.records_fill_ins());
        s
    }

    pub fn order(&self) -> Option<&[NodeId]> {
        self.order.as_deref()
    }

    /// Replace the order. Returns true if it differs from the previous one.
    /// If a graph is already bound, the order is checked against it and the
    /// elimination restarts from the beginning of the order.
    pub fn set_order(&mut self, order: Vec<NodeId>) -> Result<bool> {
        let changed = self.order.as_deref() != Some(order.as_slice());
        self.order = Some(order);
        self.position = 0;
        if let Some(nodes) = self.state.bound_nodes() {
            self.check_coverage(&nodes)?;
            self.skip_eliminated();
        }
        Ok(changed)
    }

    fn check_coverage(&self, nodes: &NodeSet) -> Result<()> {
        let order = self
            .order
            .as_ref()
            .ok_or_else(|| Error::OrderMismatch("no elimination order supplied".into()))?;
        let listed: NodeSet = order.iter().copied().collect();
        if let Some(missing) = nodes.iter().find(|n| !listed.contains(n)) {
            return Err(Error::OrderMismatch(format!(
                "node {missing} of the graph is absent from the elimination order"
            )));
        }
        Ok(())
    }

    fn skip_eliminated(&mut self) {
        let Some(order) = &self.order else {
            return;
        };
        while self.position < order.len() && !self.state.graph().exists_node(order[self.position])
        {
            self.position += 1;
        }
    }
}

impl EliminationSequenceStrategy for OrderedEliminationSequenceStrategy {
    fn set_graph(&mut self, graph: &UndiGraph, domain_sizes: &DomainSizes) -> Result<bool> {
        let changed = self.state.bind(graph, domain_sizes)?;
        self.position = 0;
        self.check_coverage(&graph.node_set())?;
        self.skip_eliminated();
        Ok(changed)
    }

    fn next_node_to_eliminate(&mut self) -> Result<NodeId> {
        let order = self.order.as_ref().ok_or(Error::Exhausted)?;
        order.get(self.position).copied().ok_or(Error::Exhausted)
    }

    fn elimination_update(&mut self, node: NodeId) -> Result<()> {
        self.state.eliminate(node)?;
        self.skip_eliminated();
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
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn follows_order_and_skips_foreign_nodes() {
        let g = cycle(4);
        let mut s = OrderedEliminationSequenceStrategy::with_order(vec![n(9), n(3), n(1), n(42), n(4), n(2)]);
        s.set_graph(&g, &uniform(&g, 2)).unwrap();
        assert_eq!(drain(&mut s), vec![n(3), n(1), n(4), n(2)]);
        assert!(matches!(s.next_node_to_eliminate(), Err(Error::Exhausted)));
    }

    #[test]
    fn next_is_stable_until_update() {
        let g = cycle(4);
        let mut s = OrderedEliminationSequenceStrategy::with_order(vec![n(2), n(1), n(3), n(4)]);
        s.set_graph(&g, &uniform(&g, 2)).unwrap();
        assert_eq!(s.next_node_to_eliminate().unwrap(), n(2));
        assert_eq!(s.next_node_to_eliminate().unwrap(), n(2));
    }

    #[test]
    fn missing_node_is_an_order_mismatch() {
        let g = cycle(4);
        let mut s = OrderedEliminationSequenceStrategy::with_order(vec![n(1), n(2), n(3)]);
        assert!(matches!(
            s.set_graph(&g, &uniform(&g, 2)),
            Err(Error::OrderMismatch(_))
        ));
    }

    #[test]
    fn set_order_reports_change_and_restarts() {
        let g = cycle(4);
        let mut s = OrderedEliminationSequenceStrategy::with_order(vec![n(1), n(2), n(3), n(4)]);
        s.set_graph(&g, &uniform(&g, 2)).unwrap();
        assert!(!s.set_order(vec![n(1), n(2), n(3), n(4)]).unwrap());
        assert!(s.set_order(vec![n(4), n(3), n(2), n(1)]).unwrap());
        assert_eq!(s.next_node_to_eliminate().unwrap(), n(4));
        assert!(s.set_order(vec![n(4)]).is_err());
    }

    #[test]
    fn records_fill_ins_when_asked() {
        let g = cycle(4);
        let mut s = OrderedEliminationSequenceStrategy::with_order(vec![n(1), n(2), n(3), n(4)]);
        s.ask_fill_ins(true);
        assert!(s.provides_fill_ins());
        s.set_graph(&g, &uniform(&g, 2)).unwrap();
        drain(&mut s);
        assert_eq!(s.fill_ins().len(), 1);
    }
}
