//! Progress bars for download runs.

use std::time::Duration;

use batchdown_core::{TransferObserver, TransferOutcome};
use batchdown_core::download::{TracingObserver, TransferJob, TransferReport};
use dashmap::DashMap;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Renders one byte bar per running transfer plus an overall file counter.
///
/// Lifecycle events are also forwarded to [`TracingObserver`] so log output stays intact.
pub(crate) struct ProgressObserver {
    multi: MultiProgress,
    overall: ProgressBar,
    bars: DashMap<String, ProgressBar>,
}

impl ProgressObserver {
    pub(crate) fn new(total_files: usize) -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total_files as u64));
        overall.set_style(
            ProgressStyle::with_template("{spinner} Files [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        overall.enable_steady_tick(Duration::from_millis(120));
        Self {
            multi,
            overall,
            bars: DashMap::new(),
        }
    }

    pub(crate) fn finish(&self) {
        self.overall.finish_and_clear();
    }

    fn byte_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "  {wide_msg} {bytes:>10}/{total_bytes:<10} {bytes_per_sec:>12} [{bar:25}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

impl TransferObserver for ProgressObserver {
    fn on_start(&self, job: &TransferJob) {
        TracingObserver.on_start(job);
        let bar = self.multi.add(ProgressBar::new(job.expected_size));
        bar.set_style(Self::byte_style());
        let name = job
            .local_path
            .file_name()
            .map_or_else(|| job.url.clone(), |n| n.to_string_lossy().into_owned());
        bar.set_message(name);
        self.bars.insert(job.url.clone(), bar);
    }

    fn on_progress(&self, url: &str, bytes_on_disk: u64, total: Option<u64>) {
        if let Some(bar) = self.bars.get(url) {
            if let Some(total) = total {
                bar.set_length(total);
            }
            bar.set_position(bytes_on_disk);
        }
    }

    fn on_complete(&self, report: &TransferReport) {
        if let Some((_, bar)) = self.bars.remove(&report.url) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        if matches!(report.outcome, TransferOutcome::Failed { .. }) {
            self.overall.set_message("(some files failed)");
        }
        self.overall.inc(1);
        TracingObserver.on_complete(report);
    }
}
