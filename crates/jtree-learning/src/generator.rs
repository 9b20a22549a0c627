//! Candidate changes for a local search over undirected graphs.

use jtree_core::config::EngineConfig;
use jtree_core::{NodeId, UndiGraph};

use crate::changes::GraphChange;
use crate::constraints::StructuralConstraint;
use crate::error::Result;
use crate::parallel::parallel_partition_map;

/// Proposes, for every pair of nodes, the deletion of their edge if it exists
/// and its addition otherwise, keeping only what the constraint accepts.
#[derive(Debug, Clone)]
pub struct GraphChangesGenerator<C> {
    constraint: C,
    threads: usize,
}

impl<C: StructuralConstraint> GraphChangesGenerator<C> {
    pub fn new(constraint: C, threads: usize) -> Self {
        Self {
            constraint,
            threads: threads.max(1),
        }
    }

    pub fn from_config(constraint: C, cfg: &EngineConfig) -> Self {
        Self::new(constraint, cfg.learning_threads)
    }

    pub fn constraint(&self) -> &C {
        &self.constraint
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Candidates for `graph`. Nodes are partitioned round-robin over the
    /// workers by position; each worker proposes the changes between its nodes
    /// and every larger node. The result is deterministic for a given thread
    /// count.
    pub fn generate(&self, graph: &UndiGraph) -> Result<Vec<GraphChange>> {
        let nodes: Vec<NodeId> = graph.nodes().collect();
        let indices: Vec<usize> = (0..nodes.len()).collect();

        let changes = parallel_partition_map(&indices, self.threads, |&i| {
            let u = nodes[i];
            nodes[i + 1..]
                .iter()
                .map(|&v| {
                    if graph.exists_edge(u, v) {
                        GraphChange::deletion(u, v)
                    } else {
                        GraphChange::addition(u, v)
                    }
                })
                .filter(|change| self.constraint.check_modification(graph, change))
                .collect()
        })?;

        tracing::debug!(
            nodes = nodes.len(),
            threads = self.threads,
            candidates = changes.len(),
            "generated graph changes"
        );
        Ok(changes)
    }
}
