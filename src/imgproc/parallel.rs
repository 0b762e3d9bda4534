// ============================================================================
// PARALLEL DISPATCHER: bounded fan-out / fan-in over index ranges (rayon)
// ============================================================================
//
// Every call is a full barrier: it returns only once all units of work have
// finished. Units run on a dedicated rayon pool of exactly `workers` threads,
// so at most `min(workers, n)` of them are ever in flight.
//
// Failures are collected rather than fail-fast: a unit that returns `Err` or
// panics does not stop its siblings. Once the round settles, the failure with
// the lowest index is returned and the rest are logged.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{FilterError, Result};
use crate::logger;

/// Worker ceiling from the OS, falling back to 1.
pub fn available_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Bounded-concurrency executor. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct Dispatcher {
    workers: usize,
    pool: Arc<rayon::ThreadPool>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("workers", &self.workers).finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher with a fixed ceiling of `workers` concurrent units.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(FilterError::InvalidWorkers(workers));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("fftblur-worker-{}", i))
            .build()
            .map_err(|e| FilterError::ThreadPool(e.to_string()))?;
        Ok(Self {
            workers,
            pool: Arc::new(pool),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `f(i)` for every `i` in `0..n`. Each unit is responsible for its own
    /// output slot; the dispatcher aggregates nothing.
    pub fn run<F>(&self, n: usize, f: F) -> Result<()>
    where
        F: Fn(usize) -> Result<()> + Sync,
    {
        if n == 0 {
            return Ok(());
        }
        let failures: Vec<FilterError> = self.pool.install(|| {
            (0..n)
                .into_par_iter()
                .filter_map(|i| guarded(i, || f(i)).err())
                .collect()
        });
        settle(failures)
    }

    /// Run `f(i)` for every `i` in `0..n` and return the results in index order.
    pub fn map<R, F>(&self, n: usize, f: F) -> Result<Vec<R>>
    where
        R: Send,
        F: Fn(usize) -> Result<R> + Sync,
    {
        if n == 0 {
            return Ok(Vec::new());
        }
        let results: Vec<Result<R>> = self.pool.install(|| {
            (0..n).into_par_iter().map(|i| guarded(i, || f(i))).collect()
        });

        let mut values = Vec::with_capacity(n);
        let mut failures = Vec::new();
        for r in results {
            match r {
                Ok(v) => values.push(v),
                Err(e) => failures.push(e),
            }
        }
        settle(failures)?;
        Ok(values)
    }

    /// Split `data` into `width`-long rows and run `f(y, row)` on each one.
    /// Rows are disjoint `&mut` slices, so units never alias each other.
    pub fn for_each_row<T, F>(&self, data: &mut [T], width: usize, f: F) -> Result<()>
    where
        T: Send,
        F: Fn(usize, &mut [T]) -> Result<()> + Sync,
    {
        if width == 0 || data.is_empty() {
            return Ok(());
        }
        let failures: Vec<FilterError> = self.pool.install(|| {
            data.par_chunks_mut(width)
                .enumerate()
                .filter_map(|(y, row)| guarded(y, || f(y, row)).err())
                .collect()
        });
        settle(failures)
    }
}

/// Execute one unit, turning a panic into [`FilterError::TaskFailed`].
/// The unit runs tagged with its index so the session log can name it.
fn guarded<R>(index: usize, unit: impl FnOnce() -> Result<R>) -> Result<R> {
    match panic::catch_unwind(AssertUnwindSafe(|| logger::in_unit(index, unit))) {
        Ok(r) => r,
        Err(payload) => Err(FilterError::TaskFailed {
            index,
            message: logger::panic_message(payload.as_ref()),
        }),
    }
}

/// Report the first failure (lowest index, since collection preserves order).
fn settle(failures: Vec<FilterError>) -> Result<()> {
    let mut iter = failures.into_iter();
    match iter.next() {
        None => Ok(()),
        Some(first) => {
            let rest = iter.count();
            if rest > 0 {
                log_warn!("dispatch round had {} further failure(s) after: {}", rest, first);
            }
            Err(first)
        }
    }
}
