#![forbid(unsafe_code)]
//! jtree-triangulation: from an undirected graph to a junction tree.
//!
//! Responsibilities:
//! - Pick an elimination sequence (`strategy`): greedy, total order, or
//!   partial order.
//! - Eliminate nodes, record fill-ins and cliques (`triangulation`).
//! - Build the elimination tree and contract it into a junction tree
//!   (`junction`), optionally reshaped into a binary join tree
//!   (`binary_join`).
//! - Provide verification helpers for chordality and running intersection
//!   (`verify`).
//!
//! Everything here is single-threaded and runs to completion synchronously.

pub mod binary_join;
pub mod error;
pub mod junction;
pub mod strategy;
pub mod triangulation;
pub mod verify;

pub use binary_join::{BinaryJoinTree, BinaryJoinTreeConverter};
pub use error::{Error, Result};
pub use strategy::{
    DefaultEliminationSequenceStrategy, EliminationSequenceStrategy, EliminationStrategy,
    OrderedEliminationSequenceStrategy, PartialOrderedEliminationSequenceStrategy,
};
pub use triangulation::{Triangulated, Triangulation};
