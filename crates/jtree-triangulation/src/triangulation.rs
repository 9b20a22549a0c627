//! Triangulation driver.
//!
//! `Triangulation` owns a graph, its domain sizes and a strategy. The first
//! query runs the whole elimination and caches a [`Triangulated`] value;
//! later queries borrow from it until the graph or the strategy changes.

use std::collections::BTreeMap;

use jtree_core::{hash_serde, CliqueGraph, CliqueId, DomainSizes, EdgeSet, Hash256, NodeId, NodeSet, UndiGraph};
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::junction::{build_elimination_tree, contract_elimination_tree};
use crate::strategy::{EliminationSequenceStrategy, EliminationStrategy};

/// Everything one elimination run produces.
#[derive(Debug, Clone, Serialize)]
pub struct Triangulated {
    elimination_order: Vec<NodeId>,
    positions: BTreeMap<NodeId, usize>,
    fill_ins: EdgeSet,
    triangulated_graph: UndiGraph,
    elimination_tree: CliqueGraph,
    elimination_tree_parents: BTreeMap<CliqueId, CliqueId>,
    junction_tree: CliqueGraph,
    created_clique: BTreeMap<NodeId, CliqueId>,
    max_log10_clique_domain_size: f64,
}

impl Triangulated {
    pub fn elimination_order(&self) -> &[NodeId] {
        &self.elimination_order
    }

    /// Index of `node` in the elimination order.
    pub fn elimination_position(&self, node: NodeId) -> Result<usize> {
        self.positions.get(&node).copied().ok_or(Error::InvalidNode(node))
    }

    pub fn fill_ins(&self) -> &EdgeSet {
        &self.fill_ins
    }

    /// Original graph plus fill-ins.
    pub fn triangulated_graph(&self) -> &UndiGraph {
        &self.triangulated_graph
    }

    pub fn elimination_tree(&self) -> &CliqueGraph {
        &self.elimination_tree
    }

    /// Child → parent links of the elimination tree.
    pub fn elimination_tree_parents(&self) -> &BTreeMap<CliqueId, CliqueId> {
        &self.elimination_tree_parents
    }

    pub fn junction_tree(&self) -> &CliqueGraph {
        &self.junction_tree
    }

    /// Junction-tree clique holding the clique `node` created on elimination.
    pub fn created_clique(&self, node: NodeId) -> Result<CliqueId> {
        self.created_clique.get(&node).copied().ok_or(Error::InvalidNode(node))
    }

    /// Elimination-tree clique created by `node`.
    pub fn created_elimination_clique(&self, node: NodeId) -> Result<CliqueId> {
        Ok(CliqueId::new(self.elimination_position(node)? as u64))
    }

    pub fn max_log10_clique_domain_size(&self) -> f64 {
        self.max_log10_clique_domain_size
    }

    /// Largest clique size minus one.
    pub fn induced_width(&self) -> usize {
        self.junction_tree
            .cliques()
            .map(|(_, nodes)| nodes.len())
            .max()
            .unwrap_or(0)
            .saturating_sub(1)
    }

    /// blake3 digest of the whole output; equal inputs give equal digests.
    pub fn fingerprint(&self) -> Result<Hash256> {
        Ok(hash_serde(self)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Triangulation {
    strategy: EliminationStrategy,
    graph: Option<UndiGraph>,
    domain_sizes: DomainSizes,
    output: Option<Triangulated>,
}

impl Triangulation {
    pub fn new(strategy: EliminationStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    /// Greedy strategy, no graph yet.
    pub fn with_default_strategy() -> Self {
        Self::default()
    }

    pub fn with_graph(
        strategy: EliminationStrategy,
        graph: &UndiGraph,
        domain_sizes: &DomainSizes,
    ) -> Self {
        let mut t = Self::new(strategy);
        t.set_graph(graph, domain_sizes);
        t
    }

    /// Bind a new graph. Returns true (and drops cached results) if the graph
    /// or its domain sizes differ from the current ones.
    pub fn set_graph(&mut self, graph: &UndiGraph, domain_sizes: &DomainSizes) -> bool {
        let changed = self.graph.as_ref() != Some(graph) || self.domain_sizes != *domain_sizes;
        if changed {
            self.graph = Some(graph.clone());
            self.domain_sizes = domain_sizes.clone();
            self.output = None;
        }
        changed
    }

    pub fn set_strategy(&mut self, strategy: EliminationStrategy) {
        self.strategy = strategy;
        self.output = None;
    }

    pub fn strategy(&self) -> &EliminationStrategy {
        &self.strategy
    }

    pub fn graph(&self) -> Option<&UndiGraph> {
        self.graph.as_ref()
    }

    pub fn domain_sizes(&self) -> &DomainSizes {
        &self.domain_sizes
    }

    pub fn is_triangulated(&self) -> bool {
        self.output.is_some()
    }

    /// Drop the graph and every cached result; the strategy is kept.
    pub fn clear(&mut self) {
        self.graph = None;
        self.domain_sizes.clear();
        self.output = None;
        self.strategy.clear();
    }

    /// Run the elimination if needed and return its results.
    pub fn triangulate(&mut self) -> Result<&Triangulated> {
        if self.output.is_none() {
            let out = self.run()?;
            self.output = Some(out);
        }
        self.output
            .as_ref()
            .ok_or_else(|| Error::Invariant("triangulation produced no output".into()))
    }

    pub fn fill_ins(&mut self) -> Result<&EdgeSet> {
        Ok(self.triangulate()?.fill_ins())
    }

    pub fn elimination_order(&mut self) -> Result<&[NodeId]> {
        Ok(self.triangulate()?.elimination_order())
    }

    pub fn triangulated_graph(&mut self) -> Result<&UndiGraph> {
        Ok(self.triangulate()?.triangulated_graph())
    }

    pub fn elimination_tree(&mut self) -> Result<&CliqueGraph> {
        Ok(self.triangulate()?.elimination_tree())
    }

    pub fn junction_tree(&mut self) -> Result<&CliqueGraph> {
        Ok(self.triangulate()?.junction_tree())
    }

    pub fn created_clique(&mut self, node: NodeId) -> Result<CliqueId> {
        self.triangulate()?.created_clique(node)
    }

    pub fn max_log10_clique_domain_size(&mut self) -> Result<f64> {
        Ok(self.triangulate()?.max_log10_clique_domain_size())
    }

    fn run(&mut self) -> Result<Triangulated> {
        let graph = self
            .graph
            .as_ref()
            .ok_or_else(|| Error::InvalidGraph("no graph to triangulate".into()))?;
        if graph.is_empty() {
            return Err(Error::InvalidGraph("the graph has no node".into()));
        }

        self.strategy.set_graph(graph, &self.domain_sizes)?;

        let total = graph.size();
        let mut order = Vec::with_capacity(total);
        let mut cliques: Vec<NodeSet> = Vec::with_capacity(total);
        let mut fill_ins = EdgeSet::new();
        let mut max_log10 = 0.0_f64;

        for _ in 0..total {
            let node = self.strategy.next_node_to_eliminate()?;
            let working = self.strategy.working_graph();
            if !working.exists_node(node) {
                return Err(Error::InvalidNode(node));
            }
            let neighbours = working.neighbours(node)?;
            fill_ins.extend(working.missing_edges_among(neighbours));

            let mut clique = neighbours.clone();
            clique.insert(node);
            let weight = log10_domain(&clique, &self.domain_sizes)?;
            max_log10 = max_log10.max(weight);
            trace!(
                node = node.get(),
                clique_size = clique.len(),
                log10_weight = weight,
                "eliminating"
            );

            self.strategy.elimination_update(node)?;
            order.push(node);
            cliques.push(clique);
        }
        if !self.strategy.is_empty() {
            return Err(Error::Invariant(
                "nodes remain after every node was eliminated".into(),
            ));
        }
        self.strategy.clear();

        let mut triangulated_graph = graph.clone();
        for e in &fill_ins {
            triangulated_graph.add_edge(e.first(), e.second())?;
        }

        let elimination = build_elimination_tree(&order, &cliques)?;
        let contraction = contract_elimination_tree(&elimination.tree)?;
        let positions: BTreeMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let created_clique = positions
            .iter()
            .map(|(n, i)| (*n, contraction.representative(CliqueId::new(*i as u64))))
            .collect();

        debug!(
            strategy = self.strategy.name(),
            nodes = total,
            fill_ins = fill_ins.len(),
            cliques = contraction.tree.size(),
            max_log10_clique = max_log10,
            "triangulation complete"
        );

        Ok(Triangulated {
            elimination_order: order,
            positions,
            fill_ins,
            triangulated_graph,
            elimination_tree: elimination.tree,
            elimination_tree_parents: elimination.parents,
            junction_tree: contraction.tree,
            created_clique,
            max_log10_clique_domain_size: max_log10,
        })
    }
}

/// Log10 of the product of the domain sizes of `nodes`.
pub fn log10_domain(nodes: &NodeSet, domain_sizes: &DomainSizes) -> Result<f64> {
    let mut sum = 0.0;
    for n in nodes {
        match domain_sizes.get(n) {
            Some(&d) if d > 0 => sum += (d as f64).log10(),
            _ => return Err(Error::InvalidDomainSize(*n)),
        }
    }
    Ok(sum)
}
