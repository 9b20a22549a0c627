//! Checks on execution orders, used by tests and debug assertions.

use std::collections::BTreeSet;

use jtree_core::OpId;

use crate::schedule::Schedule;
use crate::table::Table;

/// Panics unless `order` runs every operation of `schedule` exactly once,
/// each after all of its dependencies.
pub fn assert_topological<T: Table>(schedule: &Schedule<T>, order: &[OpId]) {
    let mut seen = BTreeSet::new();
    for op in order {
        assert!(seen.insert(*op), "{op} runs twice");
        let deps = schedule
            .dependencies(*op)
            .unwrap_or_else(|e| panic!("{op}: {e}"));
        for d in deps {
            assert!(seen.contains(d), "{op} runs before its dependency {d}");
        }
    }
    let all: BTreeSet<OpId> = schedule.operations().map(|(id, _)| id).collect();
    assert_eq!(seen, all, "order does not cover the schedule");
}

/// Panics unless every operation of `schedule` has been executed.
pub fn assert_fully_executed<T: Table>(schedule: &Schedule<T>) {
    for (id, op) in schedule.operations() {
        assert!(schedule.is_executed(id), "{id} ({op}) never ran");
    }
}
