#![forbid(unsafe_code)]
//! jtree-learning: candidate graph changes for structure search.
//!
//! - `parallel`: the fork-join map used to spread candidate generation over
//!   a fixed number of workers.
//! - `changes` / `constraints` / `generator`: propose edge additions and
//!   deletions allowed by a structural constraint.
//! - `filter`: drop candidates whose triangulation would be too wide.

pub mod changes;
pub mod constraints;
pub mod error;
pub mod filter;
pub mod generator;
pub mod parallel;

pub use changes::GraphChange;
pub use constraints::{ForbiddenEdges, MaxNeighbours, NoConstraint, StructuralConstraint};
pub use error::{Error, Result};
pub use filter::InducedWidthFilter;
pub use generator::GraphChangesGenerator;
pub use parallel::parallel_partition_map;
