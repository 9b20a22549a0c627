//! Convenience re-exports for downstream crates.

pub use crate::clique::CliqueGraph;
pub use crate::config::EngineConfig;
pub use crate::error::{Error, Result};
pub use crate::graph::{DomainSizes, Edge, EdgeSet, NodeSet, UndiGraph};
pub use crate::hash::{hash_serde, Hash256};
pub use crate::id::{CliqueId, NodeId, OpId, TableId};
