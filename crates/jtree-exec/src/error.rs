use jtree_core::{OpId, TableId};
use thiserror::Error;

/// Result type local to jtree-exec.
pub type Result<T> = std::result::Result<T, ScheduleError>;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation {0} does not belong to the schedule")]
    InvalidNode(OpId),

    #[error("size mismatch: {0}")]
    SizeError(String),

    #[error(
        "memory budget deadlock: {pending} operation(s) pending, the smallest needs {required_mb:.3} MB \
         but only {available_mb:.3} MB are free"
    )]
    BudgetDeadlock {
        required_mb: f64,
        available_mb: f64,
        pending: usize,
    },

    #[error("dependency {dependent} -> {dependency} would create a cycle")]
    Cycle { dependent: OpId, dependency: OpId },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("kernel '{kernel}' failed on table {table}: {message}")]
    Kernel {
        kernel: String,
        table: TableId,
        message: String,
    },

    #[error(transparent)]
    Core(#[from] jtree_core::Error),
}
