#![forbid(unsafe_code)]
//! jtree: triangulation, junction trees and memory-budgeted schedule
//! execution.
//!
//! This crate re-exports the workspace members:
//! - [`jtree_core`]: ids, graphs, clique graphs, configuration, hashing;
//! - [`jtree_triangulation`]: elimination strategies, triangulation, junction
//!   and binary join trees;
//! - [`jtree_exec`]: schedules of table operations and the sequential
//!   scheduler;
//! - [`jtree_learning`]: candidate graph changes for structure search.

pub use jtree_core;
pub use jtree_exec;
pub use jtree_learning;
pub use jtree_triangulation;

pub use jtree_core::config::EngineConfig;
pub use jtree_core::{
    CliqueGraph, CliqueId, DomainSizes, Edge, NodeId, NodeSet, OpId, TableId, UndiGraph,
};
pub use jtree_exec::{Schedule, Scheduler, SequentialScheduler};
pub use jtree_triangulation::{EliminationStrategy, Triangulation};
