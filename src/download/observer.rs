//! Progress callbacks for scheduled transfers.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::transfer::{TransferJob, TransferOutcome};

/// Final record of one scheduled transfer.
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// Remote URL of the file.
    pub url: String,
    /// How the transfer ended.
    pub outcome: TransferOutcome,
    /// Wall-clock time from admission to completion.
    pub elapsed: Duration,
}

/// Receives lifecycle and byte-progress events from the scheduler and the transfers.
///
/// Every method has a no-op default. Implementations are shared across worker tasks and
/// must be cheap; they run inline on the transfer's task.
pub trait TransferObserver: Send + Sync {
    /// A unit was admitted and is about to start.
    fn on_start(&self, _job: &TransferJob) {}

    /// Bytes on disk for `url` changed. `total` is the remote size when known.
    fn on_progress(&self, _url: &str, _bytes_on_disk: u64, _total: Option<u64>) {}

    /// A unit finished, whatever the outcome.
    fn on_complete(&self, _report: &TransferReport) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}

/// Observer that forwards lifecycle events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TransferObserver for TracingObserver {
    fn on_start(&self, job: &TransferJob) {
        debug!(url = %job.url, path = %job.local_path.display(), "transfer started");
    }

    fn on_complete(&self, report: &TransferReport) {
        let elapsed_ms = report.elapsed.as_millis();
        match &report.outcome {
            TransferOutcome::Completed {
                bytes,
                attempts,
                resumed_from,
            } => info!(
                url = %report.url,
                bytes,
                attempts,
                resumed_from,
                elapsed_ms,
                "download completed"
            ),
            TransferOutcome::AlreadyComplete { bytes } => {
                info!(url = %report.url, bytes, "already downloaded, skipped");
            }
            TransferOutcome::Cancelled { bytes } => {
                info!(url = %report.url, bytes_on_disk = bytes, "download cancelled");
            }
            TransferOutcome::Failed { reason, attempts } => {
                warn!(url = %report.url, attempts, %reason, "download failed");
            }
        }
    }
}
