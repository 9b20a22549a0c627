//! Tables, their memory footprint, and the kernels that operate on them.
//!
//! The numeric content of a table is opaque here: a schedule only needs its
//! domain size. Combination and projection kernels are registered by name in
//! an [`OperatorRegistry`] built once by the caller.

use std::collections::BTreeMap;
use std::fmt;

use jtree_core::config::EngineConfig;
use jtree_core::NodeSet;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};

/// A materialised multidimensional table.
pub trait Table {
    /// Number of entries (product of the domain sizes of its variables).
    fn domain_size(&self) -> usize;
}

/// Coarse memory model for a table of a given domain size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryModel {
    pub bytes_per_entry: u64,
    pub overhead_bytes: u64,
}

impl Default for MemoryModel {
    fn default() -> Self {
        Self {
            bytes_per_entry: std::mem::size_of::<f64>() as u64,
            overhead_bytes: 0,
        }
    }
}

impl MemoryModel {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            bytes_per_entry: cfg.bytes_per_entry as u64,
            overhead_bytes: cfg.table_overhead_bytes as u64,
        }
    }

    /// Bytes held by a table with `domain_size` entries.
    pub fn estimate_bytes(&self, domain_size: usize) -> u64 {
        self.overhead_bytes
            .saturating_add(self.bytes_per_entry.saturating_mul(domain_size as u64))
    }
}

/// Combination of two tables.
pub type CombineFn<T> = Box<dyn Fn(&T, &T) -> std::result::Result<T, String> + Send + Sync>;

/// Projection of a table onto the given variables.
pub type ProjectFn<T> = Box<dyn Fn(&T, &NodeSet) -> std::result::Result<T, String> + Send + Sync>;

/// Named combine/project kernels.
pub struct OperatorRegistry<T> {
    combines: BTreeMap<String, CombineFn<T>>,
    projects: BTreeMap<String, ProjectFn<T>>,
}

impl<T> Default for OperatorRegistry<T> {
    fn default() -> Self {
        Self {
            combines: BTreeMap::new(),
            projects: BTreeMap::new(),
        }
    }
}

impl<T> OperatorRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_combine<F>(&mut self, name: impl Into<String>, kernel: F) -> &mut Self
    where
        F: Fn(&T, &T) -> std::result::Result<T, String> + Send + Sync + 'static,
    {
        self.combines.insert(name.into(), Box::new(kernel));
        self
    }

    pub fn register_project<F>(&mut self, name: impl Into<String>, kernel: F) -> &mut Self
    where
        F: Fn(&T, &NodeSet) -> std::result::Result<T, String> + Send + Sync + 'static,
    {
        self.projects.insert(name.into(), Box::new(kernel));
        self
    }

    pub fn combine(&self, name: &str) -> Result<&CombineFn<T>> {
        self.combines
            .get(name)
            .ok_or_else(|| ScheduleError::NotFound(format!("combine kernel '{name}'")))
    }

    pub fn project(&self, name: &str) -> Result<&ProjectFn<T>> {
        self.projects
            .get(name)
            .ok_or_else(|| ScheduleError::NotFound(format!("project kernel '{name}'")))
    }

    pub fn has_combine(&self, name: &str) -> bool {
        self.combines.contains_key(name)
    }

    pub fn has_project(&self, name: &str) -> bool {
        self.projects.contains_key(name)
    }
}

impl<T> fmt::Debug for OperatorRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("combines", &self.combines.keys().collect::<Vec<_>>())
            .field("projects", &self.projects.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Cells(usize);

    impl Table for Cells {
        fn domain_size(&self) -> usize {
            self.0
        }
    }

    #[test]
    fn footprint_from_config() {
        let cfg = EngineConfig {
            bytes_per_entry: 4,
            table_overhead_bytes: 100,
            ..Default::default()
        };
        let model = MemoryModel::from_config(&cfg);
        assert_eq!(model.estimate_bytes(10), 140);
        assert_eq!(MemoryModel::default().estimate_bytes(3), 24);
    }

    #[test]
    fn kernels_are_looked_up_by_name() {
        let mut reg = OperatorRegistry::<Cells>::new();
        reg.register_combine("mul", |a, b| Ok(Cells(a.0 * b.0)))
            .register_project("first", |a, _| Ok(Cells(a.0 / 2)));
        let mul = reg.combine("mul").unwrap();
        assert_eq!(mul(&Cells(2), &Cells(3)).unwrap(), Cells(6));
        assert!(reg.has_project("first"));
        assert!(matches!(reg.combine("add"), Err(ScheduleError::NotFound(_))));
        assert!(format!("{reg:?}").contains("mul"));
    }
}
