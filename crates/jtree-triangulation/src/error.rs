use jtree_core::NodeId;
use thiserror::Error;

/// Result type local to jtree-triangulation.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Graph(#[from] jtree_core::Error),

    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    #[error("node {0} is not part of the graph being triangulated")]
    InvalidNode(NodeId),

    #[error("node {0} has no positive domain size")]
    InvalidDomainSize(NodeId),

    #[error("no node left to eliminate")]
    Exhausted,

    #[error("elimination order mismatch: {0}")]
    OrderMismatch(String),

    #[error("internal invariant failed: {0}")]
    Invariant(String),
}
