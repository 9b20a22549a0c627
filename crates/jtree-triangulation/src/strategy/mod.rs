//! Elimination sequence strategies.
//!
//! A strategy owns the working graph of one triangulation run. The
//! triangulation asks it for the next node, reads that node's remaining
//! neighbours, then calls `elimination_update`, which removes the node and
//! connects its neighbours pairwise (the fill-ins).
//!
//! The known strategies are gathered in the closed sum type
//! [`EliminationStrategy`]; `new_empty` clones a strategy's configuration
//! without its graph.

mod default;
mod ordered;
mod partial_ordered;

use std::collections::BTreeMap;

use jtree_core::{DomainSizes, Edge, EdgeSet, NodeId, NodeSet, UndiGraph};

use crate::error::{Error, Result};

pub use default::DefaultEliminationSequenceStrategy;
pub use ordered::OrderedEliminationSequenceStrategy;
pub use partial_ordered::PartialOrderedEliminationSequenceStrategy;

/// Log10 weights closer than this are considered equal.
pub const WEIGHT_EPSILON: f64 = 1e-9;

/// Capability set a triangulation drives.
pub trait EliminationSequenceStrategy {
    /// Bind a fresh copy of `graph`. Returns true if the graph or the domain
    /// sizes of its nodes differ from the previously bound ones.
    fn set_graph(&mut self, graph: &UndiGraph, domain_sizes: &DomainSizes) -> Result<bool>;

    /// Node to eliminate next. Does not modify the working graph.
    fn next_node_to_eliminate(&mut self) -> Result<NodeId>;

    /// Remove `node` from the working graph and connect its neighbours.
    fn elimination_update(&mut self, node: NodeId) -> Result<()>;

    /// Ask the strategy to record the fill-ins it creates.
    fn ask_fill_ins(&mut self, do_it: bool);

    fn provides_fill_ins(&self) -> bool;

    /// Fill-ins created since `set_graph` (empty unless asked for).
    fn fill_ins(&self) -> &EdgeSet;

    fn working_graph(&self) -> &UndiGraph;

    /// Drop the bound graph and every derived structure.
    fn clear(&mut self);

    fn is_empty(&self) -> bool {
        self.working_graph().is_empty()
    }
}

/// Working graph plus the bookkeeping every strategy shares.
#[derive(Debug, Clone, Default)]
pub(crate) struct EliminationState {
    graph: UndiGraph,
    log_domain: BTreeMap<NodeId, f64>,
    bound: Option<(UndiGraph, DomainSizes)>,
    fill_ins: EdgeSet,
    record_fill_ins: bool,
}

impl EliminationState {
    pub(crate) fn bind(&mut self, graph: &UndiGraph, domain_sizes: &DomainSizes) -> Result<bool> {
        let mut relevant = DomainSizes::new();
        for n in graph.nodes() {
            match domain_sizes.get(&n) {
                Some(&d) if d > 0 => {
                    relevant.insert(n, d);
                }
                _ => return Err(Error::InvalidDomainSize(n)),
            }
        }

        let changed = match &self.bound {
            Some((g, d)) => g != graph || *d != relevant,
            None => true,
        };

        self.log_domain = relevant
            .iter()
            .map(|(n, d)| (*n, (*d as f64).log10()))
            .collect();
        self.graph = graph.clone();
        self.fill_ins.clear();
        self.bound = Some((graph.clone(), relevant));
        Ok(changed)
    }

    pub(crate) fn graph(&self) -> &UndiGraph {
        &self.graph
    }

    /// Nodes of the originally bound graph.
    pub(crate) fn bound_nodes(&self) -> Option<NodeSet> {
        self.bound.as_ref().map(|(g, _)| g.node_set())
    }

    fn log_domain(&self, node: NodeId) -> Result<f64> {
        self.log_domain
            .get(&node)
            .copied()
            .ok_or(Error::InvalidDomainSize(node))
    }

    /// Log10 of the domain size of `node` and its remaining neighbours.
    pub(crate) fn score(&self, node: NodeId) -> Result<Score> {
        let neighbours = self.graph.neighbours(node)?;
        let mut log_weight = self.log_domain(node)?;
        for n in neighbours {
            log_weight += self.log_domain(*n)?;
        }
        let fill_ins = self.graph.missing_edges_among(neighbours).len();
        Ok(Score {
            log_weight,
            fill_ins,
        })
    }

    pub(crate) fn eliminate(&mut self, node: NodeId) -> Result<Vec<Edge>> {
        if !self.graph.exists_node(node) {
            return Err(Error::InvalidNode(node));
        }
        let neighbours = self.graph.neighbours(node)?.clone();
        let missing = self.graph.missing_edges_among(&neighbours);
        for e in &missing {
            self.graph.add_edge(e.first(), e.second())?;
        }
        self.graph.erase_node(node)?;
        if self.record_fill_ins {
            self.fill_ins.extend(missing.iter().copied());
        }
        Ok(missing)
    }

    pub(crate) fn set_record_fill_ins(&mut self, do_it: bool) {
        self.record_fill_ins = do_it;
    }

    pub(crate) fn records_fill_ins(&self) -> bool {
        self.record_fill_ins
    }

    pub(crate) fn fill_ins(&self) -> &EdgeSet {
        &self.fill_ins
    }

    pub(crate) fn clear(&mut self) {
        let record_fill_ins = self.record_fill_ins;
        *self = Self {
            record_fill_ins,
            ..Default::default()
        };
    }
}

/// Greedy elimination cost of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Score {
    pub log_weight: f64,
    pub fill_ins: usize,
}

impl Score {
    /// Lower weight wins, then fewer fill-ins. Equal scores are not better,
    /// so scanning candidates in ascending id keeps the smallest id.
    pub(crate) fn better_than(&self, other: &Score) -> bool {
        if self.log_weight < other.log_weight - WEIGHT_EPSILON {
            return true;
        }
        if self.log_weight > other.log_weight + WEIGHT_EPSILON {
            return false;
        }
        self.fill_ins < other.fill_ins
    }
}

/// Scores reused across steps; only the neighbourhood of an eliminated node
/// is invalidated.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScoreCache {
    scores: BTreeMap<NodeId, Score>,
}

impl ScoreCache {
    pub(crate) fn best<I>(&mut self, state: &EliminationState, candidates: I) -> Result<Option<NodeId>>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut best: Option<(NodeId, Score)> = None;
        for node in candidates {
            let score = match self.scores.get(&node) {
                Some(s) => *s,
                None => {
                    let s = state.score(node)?;
                    self.scores.insert(node, s);
                    s
                }
            };
            let replace = match &best {
                Some((_, b)) => score.better_than(b),
                None => true,
            };
            if replace {
                best = Some((node, score));
            }
        }
        Ok(best.map(|(n, _)| n))
    }

    /// Must run before `node` is eliminated: fill-in counts change for every
    /// node within distance two of it.
    pub(crate) fn invalidate_around(&mut self, state: &EliminationState, node: NodeId) -> Result<()> {
        self.scores.remove(&node);
        for n in state.graph().neighbours(node)? {
            self.scores.remove(n);
            for m in state.graph().neighbours(*n)? {
                self.scores.remove(m);
            }
        }
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.scores.clear();
    }
}

/// The strategies a triangulation can be configured with.
#[derive(Debug, Clone)]
pub enum EliminationStrategy {
    Default(DefaultEliminationSequenceStrategy),
    Ordered(OrderedEliminationSequenceStrategy),
    PartialOrdered(PartialOrderedEliminationSequenceStrategy),
}

impl Default for EliminationStrategy {
    fn default() -> Self {
        Self::greedy()
    }
}

impl EliminationStrategy {
    pub fn greedy() -> Self {
        Self::Default(DefaultEliminationSequenceStrategy::new())
    }

    pub fn ordered(order: Vec<NodeId>) -> Self {
        Self::Ordered(OrderedEliminationSequenceStrategy::with_order(order))
    }

    pub fn partial_ordered(subsets: Vec<NodeSet>) -> Result<Self> {
        Ok(Self::PartialOrdered(
            PartialOrderedEliminationSequenceStrategy::with_partial_order(subsets)?,
        ))
    }

    /// Same kind and configuration (order, partial order, fill-in recording),
    /// without any bound graph.
    pub fn new_empty(&self) -> Self {
        match self {
            Self::Default(s) => Self::Default(s.new_empty()),
            Self::Ordered(s) => Self::Ordered(s.new_empty()),
            Self::PartialOrdered(s) => Self::PartialOrdered(s.new_empty()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Default(_) => "default",
            Self::Ordered(_) => "ordered",
            Self::PartialOrdered(_) => "partial-ordered",
        }
    }
}

macro_rules! delegate {
    ($self:ident, $s:ident => $e:expr) => {
        match $self {
            EliminationStrategy::Default($s) => $e,
            EliminationStrategy::Ordered($s) => $e,
            EliminationStrategy::PartialOrdered($s) => $e,
        }
    };
}

impl EliminationSequenceStrategy for EliminationStrategy {
    fn set_graph(&mut self, graph: &UndiGraph, domain_sizes: &DomainSizes) -> Result<bool> {
        delegate!(self, s => s.set_graph(graph, domain_sizes))
    }

    fn next_node_to_eliminate(&mut self) -> Result<NodeId> {
        delegate!(self, s => s.next_node_to_eliminate())
    }

    fn elimination_update(&mut self, node: NodeId) -> Result<()> {
        delegate!(self, s => s.elimination_update(node))
    }

    fn ask_fill_ins(&mut self, do_it: bool) {
        delegate!(self, s => s.ask_fill_ins(do_it))
    }

    fn provides_fill_ins(&self) -> bool {
        delegate!(self, s => s.provides_fill_ins())
    }

    fn fill_ins(&self) -> &EdgeSet {
        delegate!(self, s => s.fill_ins())
    }

    fn working_graph(&self) -> &UndiGraph {
        delegate!(self, s => s.working_graph())
    }

    fn clear(&mut self) {
        delegate!(self, s => s.clear())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn n(v: u64) -> NodeId {
        NodeId::new(v)
    }

    pub fn cycle(len: u64) -> UndiGraph {
        UndiGraph::from_edges((1..=len).map(|i| (n(i), n(i % len + 1)))).unwrap()
    }

    pub fn uniform(g: &UndiGraph, size: usize) -> DomainSizes {
        g.nodes().map(|v| (v, size)).collect()
    }

    /// Drive a strategy to exhaustion, returning the elimination order.
    pub fn drain<S: EliminationSequenceStrategy>(s: &mut S) -> Vec<NodeId> {
        let mut order = Vec::new();
        while !s.is_empty() {
            let v = s.next_node_to_eliminate().unwrap();
            s.elimination_update(v).unwrap();
            order.push(v);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn score_ties_within_epsilon() {
        let a = Score {
            log_weight: 1.0,
            fill_ins: 2,
        };
        let b = Score {
            log_weight: 1.0 + WEIGHT_EPSILON / 2.0,
            fill_ins: 1,
        };
        assert!(b.better_than(&a));
        assert!(!a.better_than(&b));
        assert!(!a.better_than(&a));
    }

    #[test]
    fn state_records_fill_ins_on_request() {
        let g = cycle(4);
        let mut state = EliminationState::default();
        state.set_record_fill_ins(true);
        assert!(state.bind(&g, &uniform(&g, 2)).unwrap());
        let added = state.eliminate(n(1)).unwrap();
        assert_eq!(added, vec![Edge::new(n(2), n(4))]);
        assert!(state.fill_ins().contains(&Edge::new(n(2), n(4))));
        assert!(!state.graph().exists_node(n(1)));
        assert!(matches!(state.eliminate(n(1)), Err(Error::InvalidNode(_))));
    }

    #[test]
    fn rebinding_reports_changes() {
        let g = cycle(4);
        let d = uniform(&g, 2);
        let mut state = EliminationState::default();
        assert!(state.bind(&g, &d).unwrap());
        assert!(!state.bind(&g, &d).unwrap());
        assert!(state.bind(&g, &uniform(&g, 3)).unwrap());
    }

    #[test]
    fn missing_domain_size_is_rejected() {
        let g = cycle(3);
        let mut d = uniform(&g, 2);
        d.remove(&n(2));
        let mut state = EliminationState::default();
        assert!(matches!(
            state.bind(&g, &d),
            Err(Error::InvalidDomainSize(x)) if x == n(2)
        ));
    }

    #[test]
    fn new_empty_keeps_configuration() {
        let g = cycle(4);
        let mut s = EliminationStrategy::ordered(vec![n(4), n(3), n(2), n(1)]);
        s.set_graph(&g, &uniform(&g, 2)).unwrap();
        let mut fresh = s.new_empty();
        assert!(fresh.is_empty());
        assert_eq!(fresh.name(), "ordered");
        fresh.set_graph(&g, &uniform(&g, 2)).unwrap();
        assert_eq!(drain(&mut fresh), vec![n(4), n(3), n(2), n(1)]);
    }
}
