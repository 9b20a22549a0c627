//! Schedules: DAGs of table operations.
//!
//! A schedule is built by an inference engine and consumed by a scheduler.
//! Tables are declared by their variable set. Source tables come with data;
//! every other table is the result of exactly one combine or project
//! operation and is materialised when that operation runs.
//!
//! Dependencies are derived while building (an operation depends on the
//! producers of the tables it reads, a deletion on the producer and every
//! reader of its table) and can be added explicitly with
//! [`Schedule::add_dependency`].
//!
//! Every structural change bumps [`Schedule::version`]; schedulers key their
//! caches on `(id, version)`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use jtree_core::{DomainSizes, NodeSet, OpId, TableId};

use crate::error::{Result, ScheduleError};
use crate::operation::ScheduleOperation;
use crate::table::{MemoryModel, OperatorRegistry, Table};

static NEXT_SCHEDULE_ID: AtomicU64 = AtomicU64::new(1);

fn fresh_schedule_id() -> u64 {
    NEXT_SCHEDULE_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone)]
struct TableSlot<T> {
    variables: NodeSet,
    domain_size: usize,
    data: Option<T>,
    source: bool,
}

#[derive(Debug)]
pub struct Schedule<T> {
    id: u64,
    version: u64,
    domain_sizes: DomainSizes,
    tables: BTreeMap<TableId, TableSlot<T>>,
    operations: BTreeMap<OpId, ScheduleOperation>,
    dependencies: BTreeMap<OpId, BTreeSet<OpId>>,
    dependents: BTreeMap<OpId, BTreeSet<OpId>>,
    executed: BTreeSet<OpId>,
    producer: BTreeMap<TableId, OpId>,
    readers: BTreeMap<TableId, BTreeSet<OpId>>,
    deletion: BTreeMap<TableId, OpId>,
    stores: BTreeMap<TableId, OpId>,
    next_table: u64,
    next_op: u64,
}

/// A clone is a different schedule: it gets its own id.
impl<T: Clone> Clone for Schedule<T> {
    fn clone(&self) -> Self {
        Self {
            id: fresh_schedule_id(),
            version: self.version,
            domain_sizes: self.domain_sizes.clone(),
            tables: self.tables.clone(),
            operations: self.operations.clone(),
            dependencies: self.dependencies.clone(),
            dependents: self.dependents.clone(),
            executed: self.executed.clone(),
            producer: self.producer.clone(),
            readers: self.readers.clone(),
            deletion: self.deletion.clone(),
            stores: self.stores.clone(),
            next_table: self.next_table,
            next_op: self.next_op,
        }
    }
}

impl<T: Table> Schedule<T> {
    /// Empty schedule over variables with the given domain sizes.
    pub fn new(domain_sizes: DomainSizes) -> Self {
        Self {
            id: fresh_schedule_id(),
            version: 0,
            domain_sizes,
            tables: BTreeMap::new(),
            operations: BTreeMap::new(),
            dependencies: BTreeMap::new(),
            dependents: BTreeMap::new(),
            executed: BTreeSet::new(),
            producer: BTreeMap::new(),
            readers: BTreeMap::new(),
            deletion: BTreeMap::new(),
            stores: BTreeMap::new(),
            next_table: 0,
            next_op: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn domain_sizes(&self) -> &DomainSizes {
        &self.domain_sizes
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    /// Number of entries of a table over `variables`.
    pub fn domain_size_of(&self, variables: &NodeSet) -> Result<usize> {
        let mut size: usize = 1;
        for v in variables {
            let d = self
                .domain_sizes
                .get(v)
                .copied()
                .ok_or_else(|| ScheduleError::NotFound(format!("domain size of {v}")))?;
            size = size.checked_mul(d).ok_or_else(|| {
                ScheduleError::SizeError(format!("domain of {variables:?} overflows usize"))
            })?;
        }
        Ok(size)
    }

    // ---- building ----

    /// Add a source table. Its data must match the declared variables.
    pub fn insert_table(&mut self, variables: NodeSet, data: T) -> Result<TableId> {
        let domain_size = self.domain_size_of(&variables)?;
        if data.domain_size() != domain_size {
            return Err(ScheduleError::SizeError(format!(
                "table over {variables:?} should have {domain_size} entries, got {}",
                data.domain_size()
            )));
        }
        Ok(self.push_table(variables, domain_size, Some(data), true))
    }

    /// `left ⊗ right` over the union of their variables.
    pub fn combine(
        &mut self,
        left: TableId,
        right: TableId,
        kernel: impl Into<String>,
    ) -> Result<(OpId, TableId)> {
        let variables: NodeSet = self
            .table_variables(left)?
            .union(self.table_variables(right)?)
            .copied()
            .collect();
        self.insert_combination(left, right, variables, kernel)
    }

    /// Combination with an explicitly declared result table.
    pub fn insert_combination(
        &mut self,
        left: TableId,
        right: TableId,
        result_variables: NodeSet,
        kernel: impl Into<String>,
    ) -> Result<(OpId, TableId)> {
        self.check_readable(left)?;
        self.check_readable(right)?;
        let union: NodeSet = self
            .table_variables(left)?
            .union(self.table_variables(right)?)
            .copied()
            .collect();
        if union != result_variables {
            return Err(ScheduleError::SizeError(format!(
                "combination of {left} and {right} spans {union:?}, declared {result_variables:?}"
            )));
        }
        let domain_size = self.domain_size_of(&result_variables)?;
        let result = self.push_table(result_variables, domain_size, None, false);
        let op = self.push_operation(ScheduleOperation::Combine {
            left,
            right,
            result,
            kernel: kernel.into(),
        });
        Ok((op, result))
    }

    /// Projection of `input` onto `keep`.
    pub fn project(
        &mut self,
        input: TableId,
        keep: NodeSet,
        kernel: impl Into<String>,
    ) -> Result<(OpId, TableId)> {
        self.insert_projection(input, keep, kernel)
    }

    /// Projection with an explicitly declared result table, whose variables
    /// must be a subset of the input's.
    pub fn insert_projection(
        &mut self,
        input: TableId,
        result_variables: NodeSet,
        kernel: impl Into<String>,
    ) -> Result<(OpId, TableId)> {
        self.check_readable(input)?;
        if !result_variables.is_subset(self.table_variables(input)?) {
            return Err(ScheduleError::SizeError(format!(
                "projection of {input} onto {result_variables:?} keeps variables it does not have"
            )));
        }
        let domain_size = self.domain_size_of(&result_variables)?;
        let result = self.push_table(result_variables, domain_size, None, false);
        let op = self.push_operation(ScheduleOperation::Project {
            input,
            result,
            kernel: kernel.into(),
        });
        Ok((op, result))
    }

    /// Keep `table` once its readers are done.
    pub fn store(&mut self, table: TableId) -> Result<OpId> {
        self.check_readable(table)?;
        if let Some(existing) = self.stores.get(&table) {
            return Err(ScheduleError::InvalidOperation(format!(
                "{table} is already stored by {existing}"
            )));
        }
        let op = self.push_operation(ScheduleOperation::Store { table });
        self.stores.insert(table, op);
        Ok(op)
    }

    /// Free `table` after its producer and every reader scheduled so far.
    /// The table cannot be read by operations added afterwards.
    pub fn delete(&mut self, table: TableId) -> Result<OpId> {
        self.check_readable(table)?;
        let op = self.push_operation(ScheduleOperation::Delete { table });
        self.deletion.insert(table, op);
        Ok(op)
    }

    /// Make `op` wait for `depends_on`. Returns false if the dependency
    /// already existed.
    pub fn add_dependency(&mut self, op: OpId, depends_on: OpId) -> Result<bool> {
        self.operation(op)?;
        self.operation(depends_on)?;
        if op == depends_on || self.depends_on_transitively(depends_on, op) {
            return Err(ScheduleError::Cycle {
                dependent: op,
                dependency: depends_on,
            });
        }
        if self.executed.contains(&op) && !self.executed.contains(&depends_on) {
            return Err(ScheduleError::InvalidOperation(format!(
                "{op} already ran and cannot wait for {depends_on}"
            )));
        }
        let inserted = self.dependencies.entry(op).or_default().insert(depends_on);
        self.dependents.entry(depends_on).or_default().insert(op);
        if inserted {
            self.touch();
        }
        Ok(inserted)
    }

    fn depends_on_transitively(&self, from: OpId, target: OpId) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(cur) = stack.pop() {
            if cur == target {
                return true;
            }
            if !seen.insert(cur) {
                continue;
            }
            if let Some(deps) = self.dependencies.get(&cur) {
                stack.extend(deps.iter().copied());
            }
        }
        false
    }

    fn check_readable(&self, table: TableId) -> Result<()> {
        if !self.tables.contains_key(&table) {
            return Err(ScheduleError::NotFound(format!("{table}")));
        }
        if let Some(op) = self.deletion.get(&table) {
            return Err(ScheduleError::InvalidOperation(format!(
                "{table} is already scheduled for deletion by {op}"
            )));
        }
        Ok(())
    }

    fn push_table(
        &mut self,
        variables: NodeSet,
        domain_size: usize,
        data: Option<T>,
        source: bool,
    ) -> TableId {
        let id = TableId::new(self.next_table);
        self.next_table += 1;
        self.tables.insert(
            id,
            TableSlot {
                variables,
                domain_size,
                data,
                source,
            },
        );
        self.touch();
        id
    }

    fn push_operation(&mut self, operation: ScheduleOperation) -> OpId {
        let id = OpId::new(self.next_op);
        self.next_op += 1;

        let mut deps = BTreeSet::new();
        for t in operation.inputs() {
            if let Some(p) = self.producer.get(&t) {
                deps.insert(*p);
            }
            self.readers.entry(t).or_default().insert(id);
        }
        if let Some(t) = operation.deleted_table() {
            if let Some(p) = self.producer.get(&t) {
                deps.insert(*p);
            }
            if let Some(readers) = self.readers.get(&t) {
                deps.extend(readers.iter().copied());
            }
        }
        if let Some(t) = operation.output() {
            self.producer.insert(t, id);
        }

        for d in &deps {
            self.dependents.entry(*d).or_default().insert(id);
        }
        self.dependencies.insert(id, deps);
        self.dependents.entry(id).or_default();
        self.operations.insert(id, operation);
        self.touch();
        id
    }

    // ---- queries ----

    pub fn operation(&self, op: OpId) -> Result<&ScheduleOperation> {
        self.operations.get(&op).ok_or(ScheduleError::InvalidNode(op))
    }

    /// Operations in ascending id order.
    pub fn operations(&self) -> impl Iterator<Item = (OpId, &ScheduleOperation)> + '_ {
        self.operations.iter().map(|(id, op)| (*id, op))
    }

    pub fn dependencies(&self, op: OpId) -> Result<&BTreeSet<OpId>> {
        self.dependencies.get(&op).ok_or(ScheduleError::InvalidNode(op))
    }

    pub fn dependents(&self, op: OpId) -> Result<&BTreeSet<OpId>> {
        self.dependents.get(&op).ok_or(ScheduleError::InvalidNode(op))
    }

    pub fn is_executed(&self, op: OpId) -> bool {
        self.executed.contains(&op)
    }

    pub fn executed_operations(&self) -> &BTreeSet<OpId> {
        &self.executed
    }

    /// Unexecuted operations whose dependencies have all run.
    pub fn available_operations(&self) -> Vec<OpId> {
        self.operations
            .keys()
            .filter(|op| !self.executed.contains(op))
            .filter(|op| {
                self.dependencies
                    .get(op)
                    .map_or(true, |deps| deps.iter().all(|d| self.executed.contains(d)))
            })
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn nb_tables(&self) -> usize {
        self.tables.len()
    }

    pub fn table_ids(&self) -> impl Iterator<Item = TableId> + '_ {
        self.tables.keys().copied()
    }

    fn slot(&self, table: TableId) -> Result<&TableSlot<T>> {
        self.tables
            .get(&table)
            .ok_or_else(|| ScheduleError::NotFound(format!("{table}")))
    }

    pub fn table_variables(&self, table: TableId) -> Result<&NodeSet> {
        Ok(&self.slot(table)?.variables)
    }

    pub fn table_domain_size(&self, table: TableId) -> Result<usize> {
        Ok(self.slot(table)?.domain_size)
    }

    pub fn is_source(&self, table: TableId) -> bool {
        self.tables.get(&table).is_some_and(|s| s.source)
    }

    pub fn is_materialized(&self, table: TableId) -> bool {
        self.tables.get(&table).is_some_and(|s| s.data.is_some())
    }

    pub fn is_stored(&self, table: TableId) -> bool {
        self.stores.contains_key(&table)
    }

    pub fn producer(&self, table: TableId) -> Option<OpId> {
        self.producer.get(&table).copied()
    }

    pub fn readers(&self, table: TableId) -> impl Iterator<Item = OpId> + '_ {
        self.readers.get(&table).into_iter().flatten().copied()
    }

    pub fn pending_deletion(&self, table: TableId) -> Option<OpId> {
        self.deletion
            .get(&table)
            .copied()
            .filter(|op| !self.executed.contains(op))
    }

    /// Materialised content of `table`.
    pub fn table(&self, table: TableId) -> Result<&T> {
        self.slot(table)?
            .data
            .as_ref()
            .ok_or_else(|| ScheduleError::NotFound(format!("data of {table}")))
    }

    // ---- estimates ----

    /// Elementary operations `op` performs.
    pub fn nb_operations(&self, op: OpId) -> Result<f64> {
        Ok(match self.operation(op)? {
            ScheduleOperation::Combine { result, .. } => self.table_domain_size(*result)? as f64,
            ScheduleOperation::Project { input, .. } => self.table_domain_size(*input)? as f64,
            ScheduleOperation::Store { .. } | ScheduleOperation::Delete { .. } => 1.0,
        })
    }

    /// `(peak, after)` bytes `op` adds while and after running, not counting
    /// implicit frees. Source tables are not counted.
    pub fn memory_usage(&self, op: OpId, model: &MemoryModel) -> Result<(u64, i64)> {
        Ok(match self.operation(op)? {
            ScheduleOperation::Combine { result, .. } | ScheduleOperation::Project { result, .. } => {
                let bytes = model.estimate_bytes(self.table_domain_size(*result)?);
                (bytes, bytes as i64)
            }
            ScheduleOperation::Store { .. } => (0, 0),
            ScheduleOperation::Delete { table } => {
                if self.is_source(*table) {
                    (0, 0)
                } else {
                    let bytes = model.estimate_bytes(self.table_domain_size(*table)?);
                    (0, -(bytes as i64))
                }
            }
        })
    }

    // ---- execution ----

    /// Run `op` against real data and mark it executed.
    pub(crate) fn run_operation(&mut self, op: OpId, registry: &OperatorRegistry<T>) -> Result<()> {
        if self.executed.contains(&op) {
            return Err(ScheduleError::InvalidOperation(format!("{op} already ran")));
        }
        if let Some(d) = self
            .dependencies(op)?
            .iter()
            .find(|d| !self.executed.contains(d))
        {
            return Err(ScheduleError::InvalidOperation(format!(
                "{op} scheduled before its dependency {d}"
            )));
        }

        let operation = self.operation(op)?.clone();
        match &operation {
            ScheduleOperation::Combine {
                left,
                right,
                result,
                kernel,
            } => {
                let f = registry.combine(kernel)?;
                let out = f(self.table(*left)?, self.table(*right)?).map_err(|message| {
                    ScheduleError::Kernel {
                        kernel: kernel.clone(),
                        table: *result,
                        message,
                    }
                })?;
                self.materialize(*result, out)?;
            }
            ScheduleOperation::Project {
                input,
                result,
                kernel,
            } => {
                let f = registry.project(kernel)?;
                let keep = self.table_variables(*result)?;
                let out = f(self.table(*input)?, keep).map_err(|message| ScheduleError::Kernel {
                    kernel: kernel.clone(),
                    table: *result,
                    message,
                })?;
                self.materialize(*result, out)?;
            }
            ScheduleOperation::Store { table } => {
                self.table(*table)?;
            }
            ScheduleOperation::Delete { table } => {
                self.release_table(*table);
            }
        }
        self.executed.insert(op);
        self.touch();
        Ok(())
    }

    fn materialize(&mut self, table: TableId, data: T) -> Result<()> {
        let slot = self
            .tables
            .get_mut(&table)
            .ok_or_else(|| ScheduleError::NotFound(format!("{table}")))?;
        if data.domain_size() != slot.domain_size {
            return Err(ScheduleError::SizeError(format!(
                "kernel produced {} entries for {table}, expected {}",
                data.domain_size(),
                slot.domain_size
            )));
        }
        slot.data = Some(data);
        Ok(())
    }

    pub(crate) fn release_table(&mut self, table: TableId) {
        if let Some(slot) = self.tables.get_mut(&table) {
            slot.data = None;
        }
    }
}
