//! Bounded-concurrency execution of deferred jobs.
//!
//! Jobs are split into consecutive waves of at most `concurrency` jobs. Each
//! wave is spawned onto the tokio runtime and joined before the next wave is
//! started, so no more than `concurrency` jobs of a batch are ever in flight.

use crate::error::{BoxError, LedgerError, Result};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, warn};

/// Outcome of a single job.
pub type JobResult = std::result::Result<(), BoxError>;

/// A unit of asynchronous work that has not started yet.
///
/// The wrapped closure is called exactly once, when the executor starts the
/// job's wave. Inputs must be captured by value.
pub struct Job {
    start: Box<dyn FnOnce() -> BoxFuture<'static, JobResult> + Send>,
}

impl Job {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = JobResult> + Send + 'static,
    {
        Self {
            start: Box::new(move || Box::pin(f())),
        }
    }

    fn start(self) -> BoxFuture<'static, JobResult> {
        (self.start)()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").finish_non_exhaustive()
    }
}

/// What the executor does when a job fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// The first failure fails the running wave and no later wave is started.
    /// Jobs already running in the failed wave are left to finish on their own.
    #[default]
    FailFast,
    /// Every wave runs to completion; failures are reported together at the end.
    CollectAll,
}

/// Jobs a fail-fast run left running when it returned its error.
///
/// The jobs are not cancelled: they keep running on the runtime whether or not
/// anyone waits for them. `wait` lets a caller that is about to shut the
/// runtime down let them finish first. `Clone` shares the same set.
#[derive(Debug, Clone, Default)]
pub struct InFlightJobs {
    inner: Arc<Detached>,
}

#[derive(Debug, Default)]
struct Detached {
    waves: Mutex<Vec<JoinSet<JobResult>>>,
}

// A `JoinSet` aborts its tasks when dropped; detach them instead.
impl Drop for Detached {
    fn drop(&mut self) {
        for wave in self.waves.get_mut().iter_mut() {
            wave.detach_all();
        }
    }
}

impl InFlightJobs {
    pub fn new() -> Self {
        Self::default()
    }

    async fn hold(&self, wave: JoinSet<JobResult>) {
        if !wave.is_empty() {
            self.inner.waves.lock().await.push(wave);
        }
    }

    /// Waits until every job left running by a failed wave has settled.
    ///
    /// Outcomes of those jobs are not reported; the run already failed.
    pub async fn wait(&self) {
        let waves = std::mem::take(&mut *self.inner.waves.lock().await);
        for mut wave in waves {
            let remaining = wave.len();
            while wave.join_next().await.is_some() {}
            debug!(remaining, "In-flight jobs settled");
        }
    }
}

/// Runs jobs in sequential waves of bounded size.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    concurrency: NonZeroUsize,
    policy: FailurePolicy,
    in_flight: InFlightJobs,
}

impl BatchExecutor {
    /// Creates an executor with the fail-fast policy.
    ///
    /// Returns a `UsageError` if `concurrency` is zero.
    pub fn new(concurrency: usize) -> Result<Self> {
        let concurrency = NonZeroUsize::new(concurrency).ok_or_else(|| {
            LedgerError::UsageError("concurrency must be a positive integer".to_string())
        })?;
        Ok(Self {
            concurrency,
            policy: FailurePolicy::default(),
            in_flight: InFlightJobs::new(),
        })
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Where jobs left running by a failed wave are handed over.
    pub fn with_in_flight(mut self, in_flight: InFlightJobs) -> Self {
        self.in_flight = in_flight;
        self
    }

    /// Sizes of the waves `job_count` jobs are split into.
    pub fn wave_sizes(&self, job_count: usize) -> Vec<usize> {
        let size = self.concurrency.get();
        (0..job_count)
            .step_by(size)
            .map(|start| size.min(job_count - start))
            .collect()
    }

    /// Executes `jobs` in input order, one wave at a time.
    pub async fn run(&self, jobs: Vec<Job>) -> Result<()> {
        let total = jobs.len();
        let waves = self.wave_sizes(total);
        debug!(
            total,
            concurrency = self.concurrency.get(),
            waves = waves.len(),
            "Running batch"
        );

        let mut pending = jobs.into_iter().enumerate();
        let mut failures = Vec::new();

        for (wave, size) in waves.into_iter().enumerate() {
            let mut running = JoinSet::new();
            let mut indexes: HashMap<Id, usize> = HashMap::with_capacity(size);
            for (index, job) in pending.by_ref().take(size) {
                let handle = running.spawn(job.start());
                indexes.insert(handle.id(), index);
            }
            debug!(wave, size, "Wave started");

            while let Some(joined) = running.join_next_with_id().await {
                let error = match settle(&indexes, joined) {
                    Ok(()) => continue,
                    Err(error) => error,
                };
                match self.policy {
                    FailurePolicy::FailFast => {
                        warn!(wave, %error, "Wave failed, aborting remaining waves");
                        self.in_flight.hold(running).await;
                        return Err(error);
                    }
                    FailurePolicy::CollectAll => {
                        warn!(wave, %error, "Job failed");
                        failures.push(error);
                    }
                }
            }
            debug!(wave, "Wave settled");
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::PartialFailure { total, failures })
        }
    }
}

/// Convenience wrapper: fail-fast execution of `jobs` with the given bound.
pub async fn run_bounded(jobs: Vec<Job>, concurrency: usize) -> Result<()> {
    BatchExecutor::new(concurrency)?.run(jobs).await
}

fn settle(
    indexes: &HashMap<Id, usize>,
    joined: std::result::Result<(Id, JobResult), JoinError>,
) -> Result<()> {
    match joined {
        Ok((_, Ok(()))) => Ok(()),
        Ok((id, Err(source))) => Err(LedgerError::JobFailure {
            index: indexes[&id],
            source,
        }),
        // A panicking job surfaces as a failure of that job.
        Err(join_error) => Err(LedgerError::JobFailure {
            index: indexes[&join_error.id()],
            source: Box::new(join_error),
        }),
    }
}
