//! Operations a schedule is made of.

use jtree_core::TableId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleOperation {
    /// `result = kernel(left, right)`.
    Combine {
        left: TableId,
        right: TableId,
        result: TableId,
        kernel: String,
    },
    /// `result = kernel(input, variables(result))`.
    Project {
        input: TableId,
        result: TableId,
        kernel: String,
    },
    /// Keep `table` alive once its readers are done.
    Store { table: TableId },
    /// Free `table`.
    Delete { table: TableId },
}

impl ScheduleOperation {
    /// Tables read by the operation.
    pub fn inputs(&self) -> Vec<TableId> {
        match self {
            Self::Combine { left, right, .. } => vec![*left, *right],
            Self::Project { input, .. } => vec![*input],
            Self::Store { table } => vec![*table],
            Self::Delete { .. } => Vec::new(),
        }
    }

    /// Table created by the operation.
    pub fn output(&self) -> Option<TableId> {
        match self {
            Self::Combine { result, .. } | Self::Project { result, .. } => Some(*result),
            Self::Store { .. } | Self::Delete { .. } => None,
        }
    }

    pub fn deleted_table(&self) -> Option<TableId> {
        match self {
            Self::Delete { table } => Some(*table),
            _ => None,
        }
    }

    pub fn stored_table(&self) -> Option<TableId> {
        match self {
            Self::Store { table } => Some(*table),
            _ => None,
        }
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Combine { .. } => "combine",
            Self::Project { .. } => "project",
            Self::Store { .. } => "store",
            Self::Delete { .. } => "delete",
        }
    }
}

impl std::fmt::Display for ScheduleOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Combine {
                left,
                right,
                result,
                kernel,
            } => write!(f, "{result} = {kernel}({left}, {right})"),
            Self::Project {
                input,
                result,
                kernel,
            } => write!(f, "{result} = {kernel}({input})"),
            Self::Store { table } => write!(f, "store {table}"),
            Self::Delete { table } => write!(f, "delete {table}"),
        }
    }
}
