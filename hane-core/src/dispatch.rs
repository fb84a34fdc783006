//! Order-preserving fan-out of per-unit gradient work.
//!
//! One unit is one node, one community, or one decoder row. All units of
//! a coordinate block evaluate against the same shared snapshot, so the
//! sequential and pooled paths return identical results; only wall-clock
//! concurrency differs. A failed unit aborts the whole block.

use anyhow::Context;
use rayon::prelude::*;

/// One schedulable unit of work: its index plus the frozen state it must
/// be evaluated against.
pub struct Task<'a, S> {
    /// Unit index within the block (node, community, or attribute row).
    pub unit: usize,
    /// The block's frozen snapshot, shared read-only by every unit.
    pub shared: &'a S,
}

/// Worker pool handle, acquired once for the whole training run.
pub enum Dispatcher {
    /// In-place loop on the calling thread.
    Sequential,
    /// Dedicated rayon pool of a fixed size.
    Pool(rayon::ThreadPool),
}

impl Dispatcher {
    /// 0 or 1 workers run sequentially; anything larger builds a pool.
    pub fn new(num_threads: usize) -> anyhow::Result<Dispatcher> {
        if num_threads <= 1 {
            Ok(Dispatcher::Sequential)
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build()
                .context("failed to build worker pool")?;
            Ok(Dispatcher::Pool(pool))
        }
    }

    /// Number of workers the dispatcher will use.
    pub fn num_workers(&self) -> usize {
        match self {
            Dispatcher::Sequential => 1,
            Dispatcher::Pool(pool) => pool.current_num_threads(),
        }
    }

    /// Map `routine` over `num_units` tasks sharing one snapshot,
    /// returning the results in unit order.
    pub fn dispatch<S, T, F>(
        &self,
        shared: &S,
        num_units: usize,
        routine: F,
    ) -> anyhow::Result<Vec<T>>
    where
        S: Sync,
        T: Send,
        F: Fn(Task<'_, S>) -> anyhow::Result<T> + Sync,
    {
        match self {
            Dispatcher::Sequential => (0..num_units)
                .map(|unit| routine(Task { unit, shared }))
                .collect(),
            Dispatcher::Pool(pool) => pool.install(|| {
                (0..num_units)
                    .into_par_iter()
                    .map(|unit| routine(Task { unit, shared }))
                    .collect()
            }),
        }
    }
}
