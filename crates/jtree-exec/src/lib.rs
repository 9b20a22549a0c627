#![forbid(unsafe_code)]
//! jtree-exec: schedules of table operations and their execution.
//!
//! A [`Schedule`] is a DAG of combinations, projections, stores and
//! deletions over tables. The [`SequentialScheduler`] runs it one operation
//! at a time under a memory budget, or dry-runs it to estimate work and peak
//! memory.

pub mod error;
pub mod metrics;
pub mod operation;
pub mod schedule;
pub mod scheduler;
pub mod table;
pub mod verify;

pub use error::{Result, ScheduleError};
pub use operation::ScheduleOperation;
pub use schedule::Schedule;
pub use scheduler::{ExecutionReport, Scheduler, SchedulerState, SequentialScheduler};
pub use table::{MemoryModel, OperatorRegistry, Table};
