//! Batched parallel execution of detections.
//!
//! Parameter sets are split into contiguous batches. All detections of a batch
//! run concurrently and the whole batch is handed to the consumer before the
//! next batch starts, which bounds how many native detector instances are
//! alive at once. Results stream lazily: nothing runs until the consumer pulls.
//!
//! Within a batch the result order is unspecified. Across batches it is
//! strictly sequential.

use std::sync::Arc;

use common::cancel::CancellationToken;
use common::parallel::{Batch, ParBatches};
use rayon::ThreadPool;
use strum_macros::{Display, EnumString};

use crate::detection::{DetectionCapability, DetectionError, DetectionResult};

pub const DEFAULT_BATCH_SIZE: usize = 10;

pub type DetectionOutcome = Result<DetectionResult, DetectionError>;

/// What a failing parameter set does to the rest of the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum FailurePolicy {
    /// The failing batch is discarded and the stream ends with the error.
    #[default]
    Abort,
    /// Failures are yielded next to successes and the stream continues.
    Skip,
}

#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    pub batch_size: usize,
    pub failure_policy: FailurePolicy,
    pub cancellation: CancellationToken,
    /// Rayon pool detections run on; the global pool when `None`.
    pub pool: Option<Arc<ThreadPool>>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            failure_policy: FailurePolicy::default(),
            cancellation: CancellationToken::default(),
            pool: None,
        }
    }
}

impl ExecutionOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }
}

type DetectFn<'a, P> = Box<dyn Fn(P) -> DetectionOutcome + Send + Sync + 'a>;

/// Lazy, finite, non-restartable stream of detection outcomes.
pub struct BatchedExecution<'a, P> {
    batches: ParBatches<P, DetectFn<'a, P>>,
    failure_policy: FailurePolicy,
    current: std::vec::IntoIter<DetectionOutcome>,
    failed: usize,
    finished: bool,
}

/// Starts a sweep of `params` through `capability`.
///
/// # Panics
///
/// Panics if `options.batch_size` is 0.
pub fn execute<'a, C: DetectionCapability>(
    params: Vec<C::Params>,
    capability: &'a C,
    options: ExecutionOptions,
) -> BatchedExecution<'a, C::Params>
where
    C::Params: 'a,
{
    let detect: DetectFn<'a, C::Params> = Box::new(move |params| capability.perform_detection(&params));

    let mut batches =
        ParBatches::new(params, options.batch_size, detect).with_cancellation(options.cancellation);
    if let Some(pool) = options.pool {
        batches = batches.with_pool(pool);
    }

    BatchedExecution {
        batches,
        failure_policy: options.failure_policy,
        current: Vec::new().into_iter(),
        failed: 0,
        finished: false,
    }
}

impl<P: Send> BatchedExecution<'_, P> {
    /// Runs and returns the next whole batch.
    ///
    /// With [`FailurePolicy::Abort`] a batch containing a failure yields that
    /// failure instead and the stream ends.
    pub fn next_batch(&mut self) -> Option<Result<Batch<DetectionOutcome>, DetectionError>> {
        if self.finished {
            return None;
        }

        let Some(batch) = self.batches.next() else {
            self.finished = true;
            return None;
        };

        self.failed += batch.results.iter().filter(|outcome| outcome.is_err()).count();

        if self.failure_policy == FailurePolicy::Abort {
            if let Some(error) = batch.results.iter().find_map(|outcome| outcome.as_ref().err()) {
                self.finished = true;
                return Some(Err(error.clone()));
            }
        }

        Some(Ok(batch))
    }

    /// Failed parameter sets across every batch run so far, including the
    /// ones an aborted batch swallowed.
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Parameter sets not yet started.
    pub fn remaining(&self) -> usize {
        self.batches.remaining()
    }
}

impl<P: Send> Iterator for BatchedExecution<'_, P> {
    type Item = DetectionOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(outcome) = self.current.next() {
                return Some(outcome);
            }

            match self.next_batch()? {
                Ok(batch) => self.current = batch.results.into_iter(),
                Err(error) => return Some(Err(error)),
            }
        }
    }
}
