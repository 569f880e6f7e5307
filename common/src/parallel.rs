//! Concurrency-limited parallel iteration utilities.
//!
//! Items are processed in contiguous batches. Every item of a batch runs in
//! parallel; the next batch does not start until the previous one has been
//! handed to the consumer. This caps how much per-item state is alive at once.

use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::cancel::CancellationToken;

/// One drained batch: `offset` is the index of the batch's first item in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<R> {
    pub index: usize,
    pub offset: usize,
    pub results: Vec<R>,
}

/// Lazy batched parallel map.
///
/// Pull-based: a batch is computed only when the consumer asks for it, so the
/// work of batch `k + 1` never overlaps with the draining of batch `k`.
/// Finite and not restartable.
pub struct ParBatches<T, F> {
    items: std::vec::IntoIter<T>,
    batch_size: usize,
    f: F,
    pool: Option<Arc<ThreadPool>>,
    cancellation: Option<CancellationToken>,
    next_index: usize,
    next_offset: usize,
}

impl<T, R, F> ParBatches<T, F>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync + Send,
{
    /// # Panics
    ///
    /// Panics if `batch_size` is 0.
    pub fn new(items: Vec<T>, batch_size: usize, f: F) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");

        Self {
            items: items.into_iter(),
            batch_size,
            f,
            pool: None,
            cancellation: None,
            next_index: 0,
            next_offset: 0,
        }
    }

    /// Runs batches on `pool` instead of the global rayon pool.
    pub fn with_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Items not yet started when `cancellation` fires are dropped unprocessed.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    pub fn remaining(&self) -> usize {
        self.items.len()
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn run_batch(&self, batch: Vec<T>) -> Vec<R> {
        let f = &self.f;
        let cancellation = self.cancellation.as_ref();
        let work = move || -> Vec<R> {
            batch
                .into_par_iter()
                .filter_map(|item| {
                    if cancellation.is_some_and(CancellationToken::is_cancelled) {
                        None
                    } else {
                        Some(f(item))
                    }
                })
                .collect()
        };

        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }
}

impl<T, R, F> Iterator for ParBatches<T, F>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync + Send,
{
    type Item = Batch<R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_cancelled() {
            return None;
        }

        let batch: Vec<T> = self.items.by_ref().take(self.batch_size).collect();
        if batch.is_empty() {
            return None;
        }

        let index = self.next_index;
        let offset = self.next_offset;
        self.next_index += 1;
        self.next_offset += batch.len();

        let results = self.run_batch(batch);
        Some(Batch {
            index,
            offset,
            results,
        })
    }
}

/// Maps `f` over `items` in parallel, with at most `max_concurrent` items in flight.
///
/// Semantically equivalent to `items.into_par_iter().map(f).collect()`, but
/// processes items in batches of `max_concurrent`.
pub fn par_map_limited<T, R, F>(items: Vec<T>, max_concurrent: usize, f: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync + Send,
{
    ParBatches::new(items, max_concurrent, f)
        .flat_map(|batch| batch.results)
        .collect()
}

/// Like [`par_map_limited`], but the closure returns `Result<R, E>`.
///
/// Stops at the first batch that contains an error and returns it.
/// Items within the failing batch may still be processed in parallel.
pub fn try_par_map_limited<T, R, E, F>(items: Vec<T>, max_concurrent: usize, f: F) -> Result<Vec<R>, E>
where
    T: Send,
    R: Send,
    E: Send,
    F: Fn(T) -> Result<R, E> + Sync + Send,
{
    let mut results = Vec::with_capacity(items.len());
    for batch in ParBatches::new(items, max_concurrent, f) {
        let batch: Result<Vec<R>, E> = batch.results.into_iter().collect();
        results.extend(batch?);
    }
    Ok(results)
}
