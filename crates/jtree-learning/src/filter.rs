//! Rejects candidate changes that would make inference too expensive.

use jtree_core::config::EngineConfig;
use jtree_core::{DomainSizes, UndiGraph};
use jtree_triangulation::{EliminationStrategy, Triangulation};

use crate::changes::GraphChange;
use crate::error::Result;

/// Accepts a change if the greedy triangulation of the changed graph has no
/// clique whose log10 domain size exceeds `max_log10_clique_domain_size`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InducedWidthFilter {
    max_log10_clique_domain_size: f64,
}

impl InducedWidthFilter {
    pub fn new(max_log10_clique_domain_size: f64) -> Self {
        Self {
            max_log10_clique_domain_size,
        }
    }

    /// `None` when the configuration sets no limit.
    pub fn from_config(cfg: &EngineConfig) -> Option<Self> {
        cfg.max_log10_clique_domain_size.map(Self::new)
    }

    pub fn limit(&self) -> f64 {
        self.max_log10_clique_domain_size
    }

    /// Largest log10 clique domain size of the greedy triangulation of `graph`.
    pub fn width_of(graph: &UndiGraph, domain_sizes: &DomainSizes) -> Result<f64> {
        let mut t = Triangulation::with_graph(EliminationStrategy::greedy(), graph, domain_sizes);
        Ok(t.max_log10_clique_domain_size()?)
    }

    pub fn accepts(
        &self,
        graph: &UndiGraph,
        domain_sizes: &DomainSizes,
        change: &GraphChange,
    ) -> Result<bool> {
        let changed = change.applied_to(graph)?;
        let width = Self::width_of(&changed, domain_sizes)?;
        tracing::trace!(%change, width, limit = self.max_log10_clique_domain_size, "induced width");
        Ok(width <= self.max_log10_clique_domain_size)
    }

    /// The changes of `changes` that [`accepts`](Self::accepts) keeps, in
    /// input order.
    pub fn filter(
        &self,
        graph: &UndiGraph,
        domain_sizes: &DomainSizes,
        changes: &[GraphChange],
    ) -> Result<Vec<GraphChange>> {
        let mut kept = Vec::with_capacity(changes.len());
        for change in changes {
            if self.accepts(graph, domain_sizes, change)? {
                kept.push(*change);
            }
        }
        tracing::debug!(
            candidates = changes.len(),
            kept = kept.len(),
            limit = self.max_log10_clique_domain_size,
            "induced-width filter"
        );
        Ok(kept)
    }
}
