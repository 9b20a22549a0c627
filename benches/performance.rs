use criterion::{criterion_group, criterion_main, Criterion};
use jtree::jtree_exec::MemoryModel;
use jtree::{
    DomainSizes, EliminationStrategy, NodeId, Schedule, SequentialScheduler, Triangulation,
    UndiGraph,
};

fn make_grid(side: u64) -> (UndiGraph, DomainSizes) {
    let id = |r: u64, c: u64| NodeId::new(r * side + c + 1);
    let mut g = UndiGraph::with_nodes((1..=side * side).map(NodeId::new));
    for r in 0..side {
        for c in 0..side {
            if c + 1 < side {
                g.add_edge(id(r, c), id(r, c + 1)).unwrap();
            }
            if r + 1 < side {
                g.add_edge(id(r, c), id(r + 1, c)).unwrap();
            }
        }
    }
    let ds = g.nodes().map(|v| (v, 2 + (v.get() % 3) as usize)).collect();
    (g, ds)
}

fn bench_greedy_triangulation(c: &mut Criterion) {
    let (g, ds) = make_grid(8);
    c.bench_function("greedy_triangulation_grid8", |b| {
        b.iter(|| {
            let mut t = Triangulation::with_graph(EliminationStrategy::greedy(), &g, &ds);
            let _ = t.junction_tree().unwrap().size();
        })
    });
}

#[derive(Debug, Clone)]
struct Entries(usize);

impl jtree::jtree_exec::Table for Entries {
    fn domain_size(&self) -> usize {
        self.0
    }
}

fn bench_scheduler_dry_run(c: &mut Criterion) {
    let (g, ds) = make_grid(6);
    let mut t = Triangulation::with_graph(EliminationStrategy::greedy(), &g, &ds);
    let jt = t.junction_tree().unwrap().clone();

    // Every clique is marginalised onto its smallest node, then folded into a
    // running two-variable table.
    let mut s: Schedule<Entries> = Schedule::new(ds.clone());
    let mut acc = None;
    for (_, clique) in jt.cliques() {
        let size = s.domain_size_of(clique).unwrap();
        let src = s.insert_table(clique.clone(), Entries(size)).unwrap();
        let keep: jtree::NodeSet = clique.iter().take(1).copied().collect();
        let (_, msg) = s.project(src, keep.clone(), "marginal").unwrap();
        acc = Some(match acc {
            None => msg,
            Some(prev) => {
                let (_, joined) = s.combine(prev, msg, "product").unwrap();
                s.project(joined, keep, "marginal").unwrap().1
            }
        });
    }

    c.bench_function("scheduler_dry_run_grid6", |b| {
        b.iter(|| {
            let mut sched = SequentialScheduler::new(MemoryModel::default());
            let _ = sched.simulate_execution(&s).unwrap().peak_memory_mb;
        })
    });
}

criterion_group!(benches, bench_greedy_triangulation, bench_scheduler_dry_run);
criterion_main!(benches);
