//! YAML/JSON graph documents.
//!
//! Example:
//! ```yaml
//! config: { max_log10_clique_domain_size: 3.0 }
//! nodes: { 1: 2, 2: 2, 3: 3 }
//! edges: [[1, 2], [2, 3]]
//! order: [3, 2, 1]                 # optional total order
//! partial_order: [[3], [1, 2]]     # optional, used when `order` is absent
//! ```

use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;

use jtree_core::config::EngineConfig;
use jtree_core::{DomainSizes, NodeId, NodeSet, UndiGraph};
use jtree_triangulation::EliminationStrategy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub config: Option<DocumentConfig>,
    /// Node id → domain size.
    pub nodes: BTreeMap<u64, usize>,
    #[serde(default)]
    pub edges: Vec<(u64, u64)>,
    #[serde(default)]
    pub order: Option<Vec<u64>>,
    #[serde(default)]
    pub partial_order: Option<Vec<Vec<u64>>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub max_memory_mb: Option<f64>,
    pub learning_threads: Option<usize>,
    pub max_log10_clique_domain_size: Option<f64>,
}

/// Which elimination strategy to build from a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyChoice {
    /// `order` if present, else `partial_order`, else greedy.
    Auto,
    Greedy,
    Ordered,
    Partial,
}

/// Parse `src`; `.json` files are read as JSON, anything else as YAML.
pub fn parse_document(src: &str, path: &Path) -> Result<GraphDocument, Box<dyn Error>> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let doc = if is_json {
        serde_json::from_str(src)?
    } else {
        serde_yaml::from_str(src)?
    };
    Ok(doc)
}

pub fn apply_document_config(cfg: &mut EngineConfig, doc: &DocumentConfig) {
    if let Some(mb) = doc.max_memory_mb {
        cfg.max_memory_mb = mb;
    }
    if let Some(threads) = doc.learning_threads {
        cfg.learning_threads = threads;
    }
    if let Some(limit) = doc.max_log10_clique_domain_size {
        cfg.max_log10_clique_domain_size = Some(limit);
    }
}

fn node_set(ids: &[u64]) -> NodeSet {
    ids.iter().map(|&v| NodeId::new(v)).collect()
}

impl GraphDocument {
    /// Graph and domain sizes. Edges must join declared nodes.
    pub fn to_graph(&self) -> Result<(UndiGraph, DomainSizes), jtree_core::Error> {
        let mut graph = UndiGraph::with_nodes(self.nodes.keys().map(|&v| NodeId::new(v)));
        for &(a, b) in &self.edges {
            graph.add_edge(NodeId::new(a), NodeId::new(b))?;
        }
        let domain_sizes = self
            .nodes
            .iter()
            .map(|(&v, &size)| (NodeId::new(v), size))
            .collect();
        Ok((graph, domain_sizes))
    }

    pub fn strategy(&self, choice: StrategyChoice) -> Result<EliminationStrategy, Box<dyn Error>> {
        let order = || -> Result<Vec<NodeId>, Box<dyn Error>> {
            let order = self
                .order
                .as_ref()
                .ok_or("the document has no `order`")?;
            Ok(order.iter().map(|&v| NodeId::new(v)).collect())
        };
        let partial = || -> Result<EliminationStrategy, Box<dyn Error>> {
            let subsets = self
                .partial_order
                .as_ref()
                .ok_or("the document has no `partial_order`")?;
            let subsets = subsets.iter().map(|s| node_set(s)).collect();
            Ok(EliminationStrategy::partial_ordered(subsets)?)
        };

        match choice {
            StrategyChoice::Greedy => Ok(EliminationStrategy::greedy()),
            StrategyChoice::Ordered => Ok(EliminationStrategy::ordered(order()?)),
            StrategyChoice::Partial => partial(),
            StrategyChoice::Auto if self.order.is_some() => {
                Ok(EliminationStrategy::ordered(order()?))
            }
            StrategyChoice::Auto if self.partial_order.is_some() => partial(),
            StrategyChoice::Auto => Ok(EliminationStrategy::greedy()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
config:
  max_log10_clique_domain_size: 1.5
nodes: { 1: 2, 2: 2, 3: 3 }
edges: [[1, 2], [2, 3]]
partial_order: [[3], [1, 2]]
"#;

    #[test]
    fn yaml_document_builds_graph_and_strategy() {
        let doc = parse_document(YAML, Path::new("g.yaml")).unwrap();
        let (g, ds) = doc.to_graph().unwrap();
        assert_eq!(g.size(), 3);
        assert_eq!(g.size_edges(), 2);
        assert_eq!(ds[&NodeId::new(3)], 3);

        let s = doc.strategy(StrategyChoice::Auto).unwrap();
        assert_eq!(s.name(), "partial-ordered");
        assert!(doc.strategy(StrategyChoice::Ordered).is_err());

        let mut cfg = EngineConfig::default();
        apply_document_config(&mut cfg, doc.config.as_ref().unwrap());
        assert_eq!(cfg.max_log10_clique_domain_size, Some(1.5));
    }

    #[test]
    fn json_document_and_unknown_edge_endpoint() {
        let src = r#"{ "nodes": { "1": 2, "2": 2 }, "edges": [[1, 3]] }"#;
        let doc = parse_document(src, Path::new("g.json")).unwrap();
        assert!(doc.to_graph().is_err());
    }
}
