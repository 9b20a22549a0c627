use thiserror::Error;

use crate::id::{CliqueId, NodeId};

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("node {0} does not belong to the graph")]
    InvalidNode(NodeId),

    #[error("node {0} already belongs to the graph")]
    DuplicateNode(NodeId),

    #[error("invalid edge ({0}, {1}): {2}")]
    InvalidEdge(NodeId, NodeId, String),

    #[error("clique {0} does not belong to the clique graph")]
    InvalidClique(CliqueId),

    #[error("clique {0} already belongs to the clique graph")]
    DuplicateClique(CliqueId),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Hashing error: {0}")]
    Hash(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Hash(e.to_string())
    }
}
