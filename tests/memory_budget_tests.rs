//! Memory budget enforcement in the sequential scheduler


use jtree::jtree_exec::verify::assert_topological;
use jtree::jtree_exec::{MemoryModel, ScheduleError, SchedulerState};
use jtree::{EliminationStrategy, EngineConfig, Schedule, Scheduler, SequentialScheduler, Triangulation};
use test_graphs::*;

const MB: f64 = 1024.0 * 1024.0;

fn scheduler(max_bytes: u64) -> SequentialScheduler {
    let mut s = SequentialScheduler::new(MemoryModel {
        bytes_per_entry: 1,
        overhead_bytes: 0,
    });
    s.set_max_memory(max_bytes as f64 / MB);
    s
}

/// Collect schedule over the greedy junction tree of a 3x3 grid.
fn grid_schedule(size: usize) -> (Schedule<Factor>, jtree::DomainSizes) {
    let g = grid(3);
    let ds = uniform(&g, size);
    let mut t = Triangulation::with_graph(EliminationStrategy::greedy(), &g, &ds);
    let jt = t.junction_tree().unwrap().clone();
    let root = jt.ids().next().unwrap();
    let mut s = Schedule::new(ds.clone());
    collect_schedule(&mut s, &jt, &ds, root);
    (s, ds)
}

#[test]
fn test_peak_never_exceeds_budget() {
    let (s, _) = grid_schedule(3);
    let unbounded = scheduler(0).simulate_execution(&s).unwrap().clone();
    let peak = (unbounded.peak_memory_mb * MB) as u64;

    // Largest single output: a 4-variable clique.
    let largest = 81;
    for budget in [largest + 9, peak / 2 + largest, peak, peak * 2] {
        let mut sched = scheduler(budget);
        match sched.simulate_execution(&s) {
            Ok(report) => {
                assert!(report.peak_memory_mb * MB <= budget as f64);
                assert_eq!(report.order.len(), s.len());
                assert_topological(&s, &report.order);
            }
            Err(ScheduleError::BudgetDeadlock { .. }) => assert!(budget < peak),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}

#[test]
fn test_unbounded_budget_matches_budget_at_peak() {
    let (s, _) = grid_schedule(2);
    let free = scheduler(0).simulate_execution(&s).unwrap().clone();
    let at_peak = scheduler((free.peak_memory_mb * MB) as u64)
        .simulate_execution(&s)
        .unwrap()
        .clone();
    assert_eq!(free.order, at_peak.order);
    assert_eq!(at_peak.deferrals, 0);
}

#[test]
fn test_budget_too_small_deadlocks() {
    let (mut s, ds) = grid_schedule(2);
    let mut sched = scheduler(4);
    let err = sched.simulate_execution(&s).unwrap_err();
    match err {
        ScheduleError::BudgetDeadlock {
            required_mb,
            available_mb,
            pending,
        } => {
            assert!(required_mb > available_mb);
            assert!(pending >= 1);
        }
        other => panic!("expected a deadlock, got {other}"),
    }
    assert!(sched.execute(&mut s, &factor_registry(&ds)).is_err());
    assert_eq!(sched.state(), SchedulerState::Idle);
    // Operations that fitted before the deadlock did run.
    assert!(s.executed_operations().len() < s.len());
}

#[test]
fn test_budget_from_config() {
    let cfg = EngineConfig {
        max_memory_mb: 2.0,
        bytes_per_entry: 4,
        table_overhead_bytes: 64,
        ..Default::default()
    };
    let sched = SequentialScheduler::from_config(&cfg).unwrap();
    assert_eq!(sched.max_memory(), 2.0);
    assert_eq!(sched.model().estimate_bytes(10), 104);

    let bad = EngineConfig {
        max_memory_mb: -1.0,
        ..Default::default()
    };
    assert!(SequentialScheduler::from_config(&bad).is_err());
}

#[test]
fn test_real_execution_respects_budget() {
    let (mut s, ds) = grid_schedule(2);
    let peak = scheduler(0).simulate_execution(&s).unwrap().peak_memory_mb;
    let mut sched = scheduler((peak * MB) as u64);
    let report = sched.execute(&mut s, &factor_registry(&ds)).unwrap();
    assert!(report.peak_memory_mb <= peak);
    assert_topological(&s, &report.order);
}
