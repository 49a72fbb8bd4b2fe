//! Concurrency-bounded fan-out of transfer jobs.
//!
//! [`DownloadScheduler`] admits at most `concurrency` units at once through a semaphore.
//! Each admitted unit runs on its own Tokio task, registers itself with the session's
//! [`Cancellation`] and hands its job to a [`FileTransfer`]. Permit acquisition races
//! the stop signal, so a stop while the scheduler is saturated stops admission at once.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use batchdown_core::Cancellation;
//! use batchdown_core::download::{
//!     DownloadScheduler, HttpClient, ResumableTransfer, TracingObserver, TransferJob,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = DownloadScheduler::new(3, Cancellation::new())?;
//! let transfer = Arc::new(ResumableTransfer::with_defaults(HttpClient::new()?));
//! let jobs = vec![TransferJob::new("https://example.com/a.zip", "mirror/a.zip", 0)];
//! let stats = scheduler.download_all(jobs, transfer, Arc::new(TracingObserver)).await?;
//! println!("completed {}, failed {}", stats.completed(), stats.failed());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::observer::{TransferObserver, TransferReport};
use super::transfer::{FileTransfer, TransferJob, TransferOutcome};
use crate::cancel::Cancellation;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default number of simultaneous transfers.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Error type for scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// `download_all` was called with no jobs.
    #[error("nothing to download")]
    NothingToDownload,

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Counters from one `download_all` run.
///
/// Updated atomically by the worker tasks.
#[derive(Debug, Default)]
pub struct DownloadStats {
    completed: AtomicUsize,
    already_present: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
    retried: AtomicUsize,
    bytes: AtomicU64,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files downloaded in this run.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Files skipped because the local copy was already complete.
    #[must_use]
    pub fn already_present(&self) -> usize {
        self.already_present.load(Ordering::SeqCst)
    }

    /// Files that gave up.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Units stopped by cancellation, including those never admitted.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Extra attempts beyond the first, summed over all files.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    /// Bytes fetched over the network in this run (resumed prefixes excluded).
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }

    /// Every job accounted for.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.already_present() + self.failed() + self.cancelled()
    }

    fn record(&self, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Completed {
                bytes,
                attempts,
                resumed_from,
            } => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                self.add_retries(*attempts);
                self.bytes
                    .fetch_add(bytes.saturating_sub(*resumed_from), Ordering::SeqCst);
            }
            TransferOutcome::AlreadyComplete { .. } => {
                self.already_present.fetch_add(1, Ordering::SeqCst);
            }
            TransferOutcome::Cancelled { .. } => {
                self.cancelled.fetch_add(1, Ordering::SeqCst);
            }
            TransferOutcome::Failed { attempts, .. } => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                self.add_retries(*attempts);
            }
        }
    }

    fn add_retries(&self, attempts: u32) {
        let extra = usize::try_from(attempts.saturating_sub(1)).unwrap_or(usize::MAX);
        self.retried.fetch_add(extra, Ordering::SeqCst);
    }

    fn add_cancelled(&self, count: usize) {
        self.cancelled.fetch_add(count, Ordering::SeqCst);
    }
}

/// Runs transfer jobs with bounded concurrency under a shared stop signal.
#[derive(Debug)]
pub struct DownloadScheduler {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    cancellation: Cancellation,
}

impl DownloadScheduler {
    /// Creates a scheduler admitting at most `concurrency` units at once.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConcurrency`] if the value is outside 1-100.
    ///
    /// ```
    /// use batchdown_core::Cancellation;
    /// use batchdown_core::download::DownloadScheduler;
    ///
    /// assert!(DownloadScheduler::new(3, Cancellation::new()).is_ok());
    /// assert!(DownloadScheduler::new(0, Cancellation::new()).is_err());
    /// ```
    #[instrument(level = "debug", skip(cancellation))]
    pub fn new(concurrency: usize, cancellation: Cancellation) -> Result<Self, SchedulerError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(SchedulerError::InvalidConcurrency { value: concurrency });
        }
        debug!(concurrency, "creating download scheduler");
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            cancellation,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the session's cancellation handle.
    #[must_use]
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    /// Signals stop: no new admissions, running units cancel at their next checkpoint.
    pub fn stop(&self) {
        self.cancellation.stop();
    }

    /// Runs every job and returns once each one completed, was skipped, was cancelled
    /// or exhausted its retries.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NothingToDownload`] for an empty job list and
    /// [`SchedulerError::SemaphoreClosed`] if permit acquisition fails. Individual
    /// transfer failures never fail the batch; they are counted in the stats.
    #[instrument(skip(self, jobs, transfer, observer), fields(jobs = jobs.len(), concurrency = self.concurrency))]
    pub async fn download_all(
        &self,
        jobs: Vec<TransferJob>,
        transfer: Arc<dyn FileTransfer>,
        observer: Arc<dyn TransferObserver>,
    ) -> Result<DownloadStats, SchedulerError> {
        if jobs.is_empty() {
            return Err(SchedulerError::NothingToDownload);
        }

        let total = jobs.len();
        let stats = Arc::new(DownloadStats::new());
        let mut handles = Vec::with_capacity(total);
        info!(total, "starting downloads");

        let mut pending = jobs.into_iter();
        while let Some(job) = pending.next() {
            // Race the permit against stop so a saturated scheduler still halts at once.
            let permit = tokio::select! {
                biased;
                () = self.cancellation.stopped() => None,
                result = Arc::clone(&self.semaphore).acquire_owned() => {
                    Some(result.map_err(|_| SchedulerError::SemaphoreClosed)?)
                }
            };
            let Some(permit) = permit else {
                let skipped = 1 + pending.len();
                debug!(skipped, "stop requested, not admitting remaining jobs");
                stats.add_cancelled(skipped);
                break;
            };

            let guard = self.cancellation.register(&job.url);
            let stats = Arc::clone(&stats);
            let transfer = Arc::clone(&transfer);
            let observer = Arc::clone(&observer);

            handles.push(tokio::spawn(async move {
                // Permit and registration are released when this block exits (RAII)
                let _permit = permit;
                let started = Instant::now();
                let outcome = if guard.token().is_cancelled() {
                    TransferOutcome::Cancelled { bytes: 0 }
                } else {
                    observer.on_start(&job);
                    transfer
                        .transfer(&job, guard.token(), observer.as_ref())
                        .await
                };
                drop(guard);

                stats.record(&outcome);
                observer.on_complete(&TransferReport {
                    url: job.url,
                    outcome,
                    elapsed: started.elapsed(),
                });
            }));
        }

        debug!(
            task_count = handles.len(),
            "waiting for downloads to complete"
        );

        for handle in handles {
            // Ignore JoinError - task panics are logged but don't fail the batch
            if let Err(e) = handle.await {
                warn!(error = %e, "download task panicked");
                stats.failed.fetch_add(1, Ordering::SeqCst);
            }
        }

        info!(
            completed = stats.completed(),
            already_present = stats.already_present(),
            failed = stats.failed(),
            cancelled = stats.cancelled(),
            retried = stats.retried(),
            bytes = stats.bytes(),
            "downloads finished"
        );

        Ok(Arc::try_unwrap(stats).unwrap_or_else(|shared| shared.snapshot()))
    }
}

impl DownloadStats {
    fn snapshot(&self) -> Self {
        Self {
            completed: AtomicUsize::new(self.completed()),
            already_present: AtomicUsize::new(self.already_present()),
            failed: AtomicUsize::new(self.failed()),
            cancelled: AtomicUsize::new(self.cancelled()),
            retried: AtomicUsize::new(self.retried()),
            bytes: AtomicU64::new(self.bytes()),
        }
    }
}
