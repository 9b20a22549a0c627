//! Fork-join map over a slice.
//!
//! Items are dealt round-robin to `threads` partitions (`index % threads`).
//! Every partition runs on its own worker of a dedicated rayon pool and fills
//! a private accumulator; the caller concatenates the partials in partition
//! order once all workers are done. Nothing is shared mutably while the
//! workers run.

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rayon::ThreadPoolBuilder;

use crate::error::{Error, Result};

pub fn parallel_partition_map<I, R, F>(items: &[I], threads: usize, f: F) -> Result<Vec<R>>
where
    I: Sync,
    R: Send,
    F: Fn(&I) -> Vec<R> + Sync,
{
    let threads = threads.max(1);
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("jtree-learning-{i}"))
        .build()
        .map_err(|e| Error::ThreadPool {
            threads,
            message: e.to_string(),
        })?;

    let partials: Vec<Vec<R>> = pool.install(|| {
        (0..threads)
            .into_par_iter()
            .map(|partition| {
                let mut acc = Vec::new();
                for item in items.iter().skip(partition).step_by(threads) {
                    acc.extend(f(item));
                }
                acc
            })
            .collect()
    });

    tracing::trace!(threads, items = items.len(), "parallel map done");
    Ok(partials.into_iter().flatten().collect())
}
