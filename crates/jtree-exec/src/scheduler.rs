//! Memory-aware sequential scheduler.
//!
//! The scheduler snapshots the unexecuted part of a schedule into a [`Plan`]
//! (ids, byte estimates, dependency counts) and walks it with a single loop:
//!
//! - available operations run deletions first, then by ascending id;
//! - an operation runs if `used + output <= max` (or the budget is 0);
//!   otherwise it is deferred;
//! - once nothing is available, deferred operations are retried sorted by
//!   (peak, deletions first, id); if none fits the run fails with
//!   `BudgetDeadlock`.
//!
//! The dry run (`simulate_execution`) and the real run share that loop. A
//! table that is neither stored nor explicitly deleted is freed as soon as its
//! last reader has run. Source tables are not counted.

use std::collections::{BTreeMap, BTreeSet};

use jtree_core::config::EngineConfig;
use jtree_core::{OpId, TableId};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{Result, ScheduleError};
use crate::metrics::emit_span;
use crate::schedule::Schedule;
use crate::table::{MemoryModel, OperatorRegistry, Table};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

fn to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Outcome of a (real or simulated) run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Operations in the order they ran.
    pub order: Vec<OpId>,
    pub nb_operations: f64,
    pub peak_memory_mb: f64,
    pub final_memory_mb: f64,
    /// Times an operation was put aside for lack of memory.
    pub deferrals: usize,
}

pub trait Scheduler {
    /// Budget in megabytes; `0` means unbounded.
    fn set_max_memory(&mut self, megabytes: f64);

    fn max_memory(&self) -> f64;

    /// Run every unexecuted operation of `schedule`.
    fn execute<T: Table>(
        &mut self,
        schedule: &mut Schedule<T>,
        registry: &OperatorRegistry<T>,
    ) -> Result<ExecutionReport>;

    /// Elementary operations the unexecuted part of `schedule` performs.
    fn nb_operations<T: Table>(&mut self, schedule: &Schedule<T>) -> Result<f64>;

    /// `(peak, final)` memory in megabytes of running `schedule` now.
    fn memory_usage<T: Table>(&mut self, schedule: &Schedule<T>) -> Result<(f64, f64)>;
}

/// Lifecycle of a [`SequentialScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Idle,
    /// A schedule (id, version) is bound; nothing computed yet.
    GraphBound,
    /// The plan and the dry run of the bound schedule are cached.
    OperationsCached,
    Executing,
    Done,
}

#[derive(Debug, Clone)]
pub struct SequentialScheduler {
    max_memory_mb: f64,
    model: MemoryModel,
    state: SchedulerState,
    bound: Option<(u64, u64)>,
    plan: Option<Plan>,
    simulation: Option<ExecutionReport>,
}

impl Default for SequentialScheduler {
    fn default() -> Self {
        Self::new(MemoryModel::default())
    }
}

impl SequentialScheduler {
    pub fn new(model: MemoryModel) -> Self {
        Self {
            max_memory_mb: 0.0,
            model,
            state: SchedulerState::Idle,
            bound: None,
            plan: None,
            simulation: None,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Result<Self> {
        cfg.validate()?;
        let mut s = Self::new(MemoryModel::from_config(cfg));
        s.max_memory_mb = cfg.max_memory_mb;
        Ok(s)
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn model(&self) -> &MemoryModel {
        &self.model
    }

    fn max_bytes(&self) -> Option<u64> {
        (self.max_memory_mb > 0.0).then(|| (self.max_memory_mb * BYTES_PER_MB) as u64)
    }

    fn bind<T: Table>(&mut self, schedule: &Schedule<T>) {
        let key = (schedule.id(), schedule.version());
        if self.bound != Some(key) {
            self.bound = Some(key);
            self.plan = None;
            self.simulation = None;
            self.state = SchedulerState::GraphBound;
        }
    }

    fn plan<T: Table>(&mut self, schedule: &Schedule<T>) -> Result<&Plan> {
        self.bind(schedule);
        if self.plan.is_none() {
            self.plan = Some(Plan::build(schedule, &self.model)?);
        }
        self.plan
            .as_ref()
            .ok_or_else(|| ScheduleError::InvalidOperation("no plan for the bound schedule".into()))
    }

    /// Dry run: same bookkeeping as `execute`, no kernel runs. Cached until
    /// the schedule or the budget changes.
    pub fn simulate_execution<T: Table>(&mut self, schedule: &Schedule<T>) -> Result<&ExecutionReport> {
        self.bind(schedule);
        if self.simulation.is_none() {
            let max = self.max_bytes();
            let report = self.plan(schedule)?.run(max, |_| Ok(()))?;
            self.simulation = Some(report);
            self.state = SchedulerState::OperationsCached;
        }
        self.simulation
            .as_ref()
            .ok_or_else(|| ScheduleError::InvalidOperation("no cached dry run".into()))
    }
}

impl Scheduler for SequentialScheduler {
    fn set_max_memory(&mut self, megabytes: f64) {
        let megabytes = if megabytes.is_finite() { megabytes.max(0.0) } else { 0.0 };
        if megabytes != self.max_memory_mb {
            self.max_memory_mb = megabytes;
            self.simulation = None;
            if self.state == SchedulerState::OperationsCached {
                self.state = SchedulerState::GraphBound;
            }
        }
    }

    fn max_memory(&self) -> f64 {
        self.max_memory_mb
    }

    fn execute<T: Table>(
        &mut self,
        schedule: &mut Schedule<T>,
        registry: &OperatorRegistry<T>,
    ) -> Result<ExecutionReport> {
        self.bind(schedule);
        let plan = match self.plan.take() {
            Some(p) => p,
            None => Plan::build(schedule, &self.model)?,
        };
        let max = self.max_bytes();
        self.state = SchedulerState::Executing;

        let result = plan.run(max, |step| {
            schedule.run_operation(step.op, registry)?;
            for t in &step.freed {
                schedule.release_table(*t);
            }
            Ok(())
        });

        // The schedule moved on; nothing cached applies to it any more.
        self.bound = None;
        self.simulation = None;
        match result {
            Ok(report) => {
                self.state = SchedulerState::Done;
                debug!(
                    schedule = schedule.id(),
                    executed = report.order.len(),
                    peak_mb = report.peak_memory_mb,
                    final_mb = report.final_memory_mb,
                    deferrals = report.deferrals,
                    "schedule executed"
                );
                emit_span(
                    "scheduler.execute",
                    &[
                        ("operations", report.order.len().to_string()),
                        ("peak_mb", format!("{:.3}", report.peak_memory_mb)),
                        ("deferrals", report.deferrals.to_string()),
                    ],
                );
                Ok(report)
            }
            Err(e) => {
                self.state = SchedulerState::Idle;
                Err(e)
            }
        }
    }

    fn nb_operations<T: Table>(&mut self, schedule: &Schedule<T>) -> Result<f64> {
        Ok(self.plan(schedule)?.total_work())
    }

    fn memory_usage<T: Table>(&mut self, schedule: &Schedule<T>) -> Result<(f64, f64)> {
        let report = self.simulate_execution(schedule)?;
        Ok((report.peak_memory_mb, report.final_memory_mb))
    }
}

// ---- plan ----

#[derive(Debug, Clone)]
struct PlannedOp {
    dependents: BTreeSet<OpId>,
    waiting_on: usize,
    reads: Vec<TableId>,
    output: Option<TableId>,
    deletes: Option<TableId>,
    peak: u64,
    work: f64,
    deletion: bool,
}

/// Snapshot of the unexecuted part of a schedule.
#[derive(Debug, Clone, Default)]
struct Plan {
    ops: BTreeMap<OpId, PlannedOp>,
    /// Bytes of every counted (non-source) table.
    bytes: BTreeMap<TableId, u64>,
    live: BTreeSet<TableId>,
    readers: BTreeMap<TableId, usize>,
    pending_deletes: BTreeSet<TableId>,
    stored: BTreeSet<TableId>,
}

/// One executed operation and the tables freed right after it.
#[derive(Debug, Clone)]
struct Step {
    op: OpId,
    freed: Vec<TableId>,
}

impl Plan {
    fn build<T: Table>(schedule: &Schedule<T>, model: &MemoryModel) -> Result<Self> {
        let mut plan = Plan::default();

        for table in schedule.table_ids() {
            if schedule.is_source(table) {
                continue;
            }
            plan.bytes
                .insert(table, model.estimate_bytes(schedule.table_domain_size(table)?));
            if schedule.is_materialized(table) {
                plan.live.insert(table);
            }
            if schedule.is_stored(table) {
                plan.stored.insert(table);
            }
        }

        for (id, operation) in schedule.operations() {
            if schedule.is_executed(id) {
                continue;
            }
            let waiting_on = schedule
                .dependencies(id)?
                .iter()
                .filter(|d| !schedule.is_executed(**d))
                .count();
            let dependents = schedule
                .dependents(id)?
                .iter()
                .copied()
                .filter(|d| !schedule.is_executed(*d))
                .collect();
            let reads = operation.inputs();
            for t in &reads {
                *plan.readers.entry(*t).or_default() += 1;
            }
            if let Some(t) = operation.deleted_table() {
                plan.pending_deletes.insert(t);
            }
            let (peak, _) = schedule.memory_usage(id, model)?;
            plan.ops.insert(
                id,
                PlannedOp {
                    dependents,
                    waiting_on,
                    reads,
                    output: operation.output(),
                    deletes: operation.deleted_table(),
                    peak,
                    work: schedule.nb_operations(id)?,
                    deletion: operation.is_deletion(),
                },
            );
        }
        Ok(plan)
    }

    fn total_work(&self) -> f64 {
        self.ops.values().map(|op| op.work).sum()
    }

    fn op(&self, id: OpId) -> Result<&PlannedOp> {
        self.ops.get(&id).ok_or(ScheduleError::InvalidNode(id))
    }

    /// Walk the plan under `max` bytes, calling `on_execute` for every
    /// operation in execution order.
    fn run<F>(&self, max: Option<u64>, mut on_execute: F) -> Result<ExecutionReport>
    where
        F: FnMut(&Step) -> Result<()>,
    {
        let mut run = RunState::new(self);
        let fits = |used: u64, need: u64| max.map_or(true, |m| used.saturating_add(need) <= m);

        loop {
            let next = run
                .available_deletions
                .pop_first()
                .or_else(|| run.available_ops.pop_first());

            if let Some(id) = next {
                let op = self.op(id)?;
                if fits(run.used, op.peak) {
                    let step = run.apply(self, id)?;
                    on_execute(&step)?;
                } else {
                    trace!(op = id.get(), need = op.peak, used = run.used, "deferred");
                    run.deferrals += 1;
                    if op.deletion {
                        run.unexecuted_deletions.insert(id);
                    } else {
                        run.unexecuted_operations.insert(id);
                    }
                }
                continue;
            }

            if run.unexecuted_operations.is_empty() && run.unexecuted_deletions.is_empty() {
                break;
            }

            let mut candidates = Vec::new();
            for &id in run.unexecuted_deletions.iter().chain(&run.unexecuted_operations) {
                let op = self.op(id)?;
                candidates.push((op.peak, !op.deletion, id));
            }
            candidates.sort();

            match candidates.iter().find(|(peak, _, _)| fits(run.used, *peak)) {
                Some(&(_, _, id)) => {
                    run.unexecuted_deletions.remove(&id);
                    run.unexecuted_operations.remove(&id);
                    let step = run.apply(self, id)?;
                    on_execute(&step)?;
                }
                None => {
                    let (need, _, _) = candidates[0];
                    let available = max.map_or(0, |m| m.saturating_sub(run.used));
                    warn!(
                        pending = candidates.len(),
                        required_bytes = need,
                        available_bytes = available,
                        "memory budget deadlock"
                    );
                    return Err(ScheduleError::BudgetDeadlock {
                        required_mb: to_mb(need),
                        available_mb: to_mb(available),
                        pending: candidates.len(),
                    });
                }
            }
        }

        if run.order.len() != self.ops.len() {
            return Err(ScheduleError::InvalidOperation(format!(
                "{} operation(s) can never run: their dependencies are unsatisfiable",
                self.ops.len() - run.order.len()
            )));
        }

        Ok(ExecutionReport {
            order: run.order,
            nb_operations: run.work,
            peak_memory_mb: to_mb(run.peak),
            final_memory_mb: to_mb(run.used),
            deferrals: run.deferrals,
        })
    }
}

struct RunState {
    used: u64,
    peak: u64,
    live: BTreeSet<TableId>,
    readers: BTreeMap<TableId, usize>,
    pending_deletes: BTreeSet<TableId>,
    waiting: BTreeMap<OpId, usize>,
    available_ops: BTreeSet<OpId>,
    available_deletions: BTreeSet<OpId>,
    unexecuted_operations: BTreeSet<OpId>,
    unexecuted_deletions: BTreeSet<OpId>,
    order: Vec<OpId>,
    work: f64,
    deferrals: usize,
}

impl RunState {
    fn new(plan: &Plan) -> Self {
        let used = plan
            .live
            .iter()
            .filter_map(|t| plan.bytes.get(t))
            .sum::<u64>();
        let mut state = Self {
            used,
            peak: used,
            live: plan.live.clone(),
            readers: plan.readers.clone(),
            pending_deletes: plan.pending_deletes.clone(),
            waiting: BTreeMap::new(),
            available_ops: BTreeSet::new(),
            available_deletions: BTreeSet::new(),
            unexecuted_operations: BTreeSet::new(),
            unexecuted_deletions: BTreeSet::new(),
            order: Vec::with_capacity(plan.ops.len()),
            work: 0.0,
            deferrals: 0,
        };
        for (id, op) in &plan.ops {
            if op.waiting_on == 0 {
                state.make_available(*id, op.deletion);
            } else {
                state.waiting.insert(*id, op.waiting_on);
            }
        }
        state
    }

    fn make_available(&mut self, id: OpId, deletion: bool) {
        if deletion {
            self.available_deletions.insert(id);
        } else {
            self.available_ops.insert(id);
        }
    }

    fn free(&mut self, plan: &Plan, table: TableId, freed: &mut Vec<TableId>) {
        if self.live.remove(&table) {
            self.used = self
                .used
                .saturating_sub(plan.bytes.get(&table).copied().unwrap_or(0));
            freed.push(table);
        }
    }

    fn apply(&mut self, plan: &Plan, id: OpId) -> Result<Step> {
        let op = plan.op(id)?;
        let mut freed = Vec::new();

        if let Some(out) = op.output {
            if let Some(bytes) = plan.bytes.get(&out) {
                if self.live.insert(out) {
                    self.used += bytes;
                }
            }
        }
        self.peak = self.peak.max(self.used);

        if let Some(t) = op.deletes {
            self.pending_deletes.remove(&t);
            self.free(plan, t, &mut freed);
        }
        for t in &op.reads {
            let Some(count) = self.readers.get_mut(t) else {
                continue;
            };
            *count = count.saturating_sub(1);
            if *count == 0 && !plan.stored.contains(t) && !self.pending_deletes.contains(t) {
                self.free(plan, *t, &mut freed);
            }
        }

        for d in &op.dependents {
            if let Some(w) = self.waiting.get_mut(d) {
                *w -= 1;
                if *w == 0 {
                    self.waiting.remove(d);
                    self.make_available(*d, plan.op(*d)?.deletion);
                }
            }
        }

        trace!(
            op = id.get(),
            used = self.used,
            freed = freed.len(),
            "executed"
        );
        self.order.push(id);
        self.work += op.work;
        Ok(Step { op: id, freed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jtree_core::{NodeId, NodeSet};

    /// Table over binary variables; only its scope matters.
    #[derive(Debug, Clone, PartialEq)]
    struct Binary(NodeSet);

    impl Table for Binary {
        fn domain_size(&self) -> usize {
            1 << self.0.len()
        }
    }

    fn vars(vals: &[u64]) -> NodeSet {
        vals.iter().map(|&v| NodeId::new(v)).collect()
    }

    fn schedule(nb_vars: u64) -> Schedule<Binary> {
        Schedule::new((1..=nb_vars).map(|v| (NodeId::new(v), 2)).collect())
    }

    fn source(s: &mut Schedule<Binary>, vals: &[u64]) -> TableId {
        s.insert_table(vars(vals), Binary(vars(vals))).unwrap()
    }

    fn registry() -> OperatorRegistry<Binary> {
        let mut reg = OperatorRegistry::new();
        reg.register_combine("mul", |a: &Binary, b: &Binary| {
            Ok(Binary(a.0.union(&b.0).copied().collect()))
        })
        .register_project("sum", |_: &Binary, keep: &NodeSet| Ok(Binary(keep.clone())));
        reg
    }

    /// One byte per entry so budgets are easy to read.
    fn scheduler(max_bytes: u64) -> SequentialScheduler {
        let mut s = SequentialScheduler::new(MemoryModel {
            bytes_per_entry: 1,
            overhead_bytes: 0,
        });
        s.set_max_memory(max_bytes as f64 / BYTES_PER_MB);
        s
    }

    fn bytes(mb: f64) -> f64 {
        mb * BYTES_PER_MB
    }

    #[test]
    fn runs_in_dependency_order_and_frees_intermediates() {
        let mut s = schedule(3);
        let a = source(&mut s, &[1, 2]);
        let b = source(&mut s, &[2, 3]);
        let (c_op, c) = s.combine(a, b, "mul").unwrap();
        let (p_op, p) = s.project(c, vars(&[3]), "sum").unwrap();

        let mut sched = scheduler(0);
        let report = sched.execute(&mut s, &registry()).unwrap();
        assert_eq!(report.order, vec![c_op, p_op]);
        assert_eq!(report.nb_operations, 16.0);
        assert_eq!(bytes(report.peak_memory_mb), 10.0);
        assert_eq!(bytes(report.final_memory_mb), 2.0);
        assert!(!s.is_materialized(c));
        assert_eq!(s.table(p).unwrap(), &Binary(vars(&[3])));
        assert_eq!(sched.state(), SchedulerState::Done);
    }

    #[test]
    fn dry_run_matches_execution_and_is_cached() {
        let mut s = schedule(3);
        let a = source(&mut s, &[1, 2]);
        let b = source(&mut s, &[3]);
        let (_, c) = s.combine(a, b, "mul").unwrap();
        s.store(c).unwrap();

        let mut sched = scheduler(0);
        let dry = sched.simulate_execution(&s).unwrap().clone();
        assert_eq!(sched.state(), SchedulerState::OperationsCached);
        assert_eq!(sched.nb_operations(&s).unwrap(), 9.0);
        let (peak, fin) = sched.memory_usage(&s).unwrap();
        assert_eq!((peak, fin), (dry.peak_memory_mb, dry.final_memory_mb));
        assert_eq!(bytes(fin), 8.0);

        let real = sched.execute(&mut s, &registry()).unwrap();
        assert_eq!(real, dry);
        assert!(s.is_materialized(c));
    }

    #[test]
    fn deferred_work_waits_for_deletions() {
        let mut s = schedule(4);
        let a = source(&mut s, &[1, 2]);
        let b = source(&mut s, &[3, 4]);
        let (x_op, x) = s.project(a, vars(&[1, 2]), "sum").unwrap();
        let (z_op, _) = s.project(b, vars(&[3, 4]), "sum").unwrap();
        let (y_op, y) = s.project(x, vars(&[1]), "sum").unwrap();
        let store = s.store(y).unwrap();
        let del = s.delete(x).unwrap();

        // x (4) and y (2) fill the budget; z (4) has to wait for x's deletion.
        let mut sched = scheduler(6);
        let report = sched.execute(&mut s, &registry()).unwrap();
        assert_eq!(report.order, vec![x_op, y_op, del, store, z_op]);
        assert_eq!(report.deferrals, 1);
        crate::verify::assert_topological(&s, &report.order);
        crate::verify::assert_fully_executed(&s);
        assert_eq!(bytes(report.peak_memory_mb), 6.0);
        assert!(!s.is_materialized(x));
        assert!(s.is_materialized(y));
    }

    #[test]
    fn oversized_operation_deadlocks() {
        let mut s = schedule(3);
        let a = source(&mut s, &[1, 2, 3]);
        s.project(a, vars(&[1, 2, 3]), "sum").unwrap();
        let mut sched = scheduler(4);
        assert!(matches!(
            sched.simulate_execution(&s),
            Err(ScheduleError::BudgetDeadlock { pending: 1, .. })
        ));
        assert!(matches!(
            sched.execute(&mut s, &registry()),
            Err(ScheduleError::BudgetDeadlock { .. })
        ));
        assert_eq!(sched.state(), SchedulerState::Idle);
    }

    #[test]
    fn budget_change_drops_the_cached_dry_run() {
        let mut s = schedule(2);
        let a = source(&mut s, &[1, 2]);
        s.project(a, vars(&[1]), "sum").unwrap();
        let mut sched = scheduler(0);
        sched.simulate_execution(&s).unwrap();
        sched.set_max_memory(1.0 / BYTES_PER_MB);
        assert_eq!(sched.state(), SchedulerState::GraphBound);
        assert!(sched.simulate_execution(&s).is_err());
    }

    #[test]
    fn missing_kernel_is_not_found() {
        let mut s = schedule(2);
        let a = source(&mut s, &[1, 2]);
        s.project(a, vars(&[1]), "max").unwrap();
        let mut sched = scheduler(0);
        assert!(matches!(
            sched.execute(&mut s, &registry()),
            Err(ScheduleError::NotFound(_))
        ));
    }
}
