#![forbid(unsafe_code)]
//! jtree-core: shared vocabulary for triangulation and schedule execution.
//!
//! - Strongly-typed ids (`NodeId`, `CliqueId`, `OpId`, `TableId`).
//! - Index-based undirected graphs and clique graphs (no pointers, ordered
//!   containers so every traversal is deterministic).
//! - Engine configuration and stable hashing.
//!
//! **No threads, no I/O** here.

pub mod clique;
pub mod config;
pub mod error;
pub mod graph;
pub mod hash;
pub mod id;
pub mod prelude;

pub use clique::CliqueGraph;
pub use error::{Error, Result};
pub use graph::{DomainSizes, Edge, EdgeSet, NodeSet, UndiGraph};
pub use hash::{hash_serde, Hash256};
pub use id::{CliqueId, NodeId, OpId, TableId};

/// Crate version, recorded in reports.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
