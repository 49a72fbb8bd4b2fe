//! One fetch-then-download cycle as a typed lifecycle.
//!
//! [`CrawlSession::fetch`] consumes the session and yields a [`FetchedSession`];
//! [`FetchedSession::download`] consumes that in turn. A session therefore runs at most
//! once, and a stopped session refuses to download.
//!
//! ```no_run
//! use std::sync::Arc;
//! use batchdown_core::{CrawlSession, CrawlTarget, DownloadOptions};
//! use batchdown_core::download::{HttpClient, TracingObserver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let target = CrawlTarget::new("https://mirror.example.org/pub/")?.with_extensions(["iso"]);
//! let session = CrawlSession::new(target, HttpClient::new()?);
//! let stop = session.stop_handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     stop.stop();
//! });
//!
//! let fetched = session.fetch().await?;
//! println!("{} files", fetched.candidates().len());
//! let stats = fetched
//!     .download(DownloadOptions::default(), Arc::new(TracingObserver))
//!     .await?;
//! println!("completed {}", stats.completed());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::cancel::Cancellation;
use crate::crawl::{
    CrawlError, CrawlReport, CrawlTarget, Crawler, DEFAULT_PROBE_CONCURRENCY, ExclusionRecord,
    FileCandidate, HtmlLinkSource, PageLinkSource,
};
use crate::download::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, DownloadScheduler, DownloadStats, HttpClient,
    ResumableTransfer, RetryPolicy, SchedulerError, TransferJob, TransferObserver, local_path,
};

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The crawl failed or was stopped.
    #[error(transparent)]
    Crawl(#[from] CrawlError),

    /// The download batch could not run.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Stop was signalled before downloading began.
    #[error("session was stopped")]
    Stopped,

    /// The crawl produced no downloadable files.
    #[error("no files were found to download")]
    NothingFetched,
}

/// Tuning for the download phase.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Simultaneous transfers (1-100).
    pub concurrency: usize,
    /// Largest piece written between cancellation checks.
    pub chunk_size: usize,
    /// Attempts and delay per file.
    pub retry_policy: RetryPolicy,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// A session that has not crawled yet.
pub struct CrawlSession {
    target: CrawlTarget,
    client: HttpClient,
    link_source: Arc<dyn PageLinkSource>,
    cancellation: Cancellation,
    probe_concurrency: usize,
}

impl std::fmt::Debug for CrawlSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlSession")
            .field("target", &self.target)
            .field("stopped", &self.cancellation.is_stopped())
            .finish_non_exhaustive()
    }
}

impl CrawlSession {
    /// Creates a session reading static HTML through `client`.
    #[must_use]
    pub fn new(target: CrawlTarget, client: HttpClient) -> Self {
        let link_source = Arc::new(HtmlLinkSource::new(client.clone()));
        Self {
            target,
            client,
            link_source,
            cancellation: Cancellation::new(),
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
        }
    }

    /// Replaces the link source, e.g. with a script-executing renderer.
    #[must_use]
    pub fn with_link_source(mut self, link_source: Arc<dyn PageLinkSource>) -> Self {
        self.link_source = link_source;
        self
    }

    /// Sets how many size probes run at once after the crawl.
    #[must_use]
    pub fn with_probe_concurrency(mut self, probe_concurrency: usize) -> Self {
        self.probe_concurrency = probe_concurrency;
        self
    }

    /// The crawl target.
    #[must_use]
    pub fn target(&self) -> &CrawlTarget {
        &self.target
    }

    /// Handle that stops this session from anywhere, including a signal handler.
    #[must_use]
    pub fn stop_handle(&self) -> Cancellation {
        self.cancellation.clone()
    }

    /// Crawls the target.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Crawl`] when the root page fails or stop is signalled.
    #[instrument(skip(self), fields(root = %self.target.root_url()))]
    pub async fn fetch(self) -> Result<FetchedSession, SessionError> {
        let crawler = Crawler::new(
            self.target.clone(),
            Arc::clone(&self.link_source),
            Arc::new(self.client.clone()),
        )
        .with_probe_concurrency(self.probe_concurrency);
        let report = crawler.crawl(&self.cancellation).await?;

        if report.candidates.is_empty() {
            info!("no files found");
        }
        Ok(FetchedSession {
            target: self.target,
            client: self.client,
            cancellation: self.cancellation,
            report,
        })
    }
}

/// A session holding crawl results, ready to download.
#[derive(Debug)]
pub struct FetchedSession {
    target: CrawlTarget,
    client: HttpClient,
    cancellation: Cancellation,
    report: CrawlReport,
}

impl FetchedSession {
    /// Files to download.
    #[must_use]
    pub fn candidates(&self) -> &[FileCandidate] {
        &self.report.candidates
    }

    /// Files removed by the name filter.
    #[must_use]
    pub fn exclusions(&self) -> &[ExclusionRecord] {
        &self.report.exclusions
    }

    /// Directories whose listings failed.
    #[must_use]
    pub fn skipped_directories(&self) -> &[String] {
        &self.report.skipped_directories
    }

    /// The full crawl report.
    #[must_use]
    pub fn report(&self) -> &CrawlReport {
        &self.report
    }

    /// The crawl target.
    #[must_use]
    pub fn target(&self) -> &CrawlTarget {
        &self.target
    }

    /// Handle that stops this session.
    #[must_use]
    pub fn stop_handle(&self) -> Cancellation {
        self.cancellation.clone()
    }

    /// Maps every candidate to its mirror path. Candidates with no usable file name are
    /// skipped with a warning.
    #[must_use]
    pub fn jobs(&self) -> Vec<TransferJob> {
        self.report
            .candidates
            .iter()
            .filter_map(|candidate| {
                let url = url::Url::parse(&candidate.url).ok()?;
                match local_path(self.target.store_dir(), self.target.root_prefix(), &url) {
                    Some(path) => Some(TransferJob::new(&candidate.url, path, candidate.size_bytes)),
                    None => {
                        warn!(url = %candidate.url, "no local file name, skipping");
                        None
                    }
                }
            })
            .collect()
    }

    /// Downloads every candidate.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Stopped`] if stop was already signalled,
    /// [`SessionError::NothingFetched`] if there is nothing to download and
    /// [`SessionError::Scheduler`] for invalid options.
    #[instrument(skip(self, options, observer), fields(candidates = self.report.candidates.len()))]
    pub async fn download(
        self,
        options: DownloadOptions,
        observer: Arc<dyn TransferObserver>,
    ) -> Result<DownloadStats, SessionError> {
        if self.cancellation.is_stopped() {
            return Err(SessionError::Stopped);
        }
        let jobs = self.jobs();
        if jobs.is_empty() {
            return Err(SessionError::NothingFetched);
        }

        let scheduler = DownloadScheduler::new(options.concurrency, self.cancellation.clone())?;
        let transfer = Arc::new(ResumableTransfer::new(
            self.client,
            options.retry_policy,
            options.chunk_size,
        ));
        info!(
            jobs = jobs.len(),
            store_dir = %self.target.store_dir().display(),
            "downloading"
        );
        Ok(scheduler.download_all(jobs, transfer, observer).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    use async_trait::async_trait;
    use url::Url;

    use super::*;
    use crate::crawl::LinkSourceError;
    use crate::download::NoopObserver;

    struct EmptySite;

    #[async_trait]
    impl PageLinkSource for EmptySite {
        async fn links(&self, _url: &Url) -> Result<BTreeSet<Url>, LinkSourceError> {
            Ok(BTreeSet::new())
        }
    }

    fn fetched(candidates: Vec<FileCandidate>) -> FetchedSession {
        FetchedSession {
            target: CrawlTarget::new("https://example.com/pub")
                .unwrap()
                .with_store_dir("mirror"),
            client: HttpClient::new().unwrap(),
            cancellation: Cancellation::new(),
            report: CrawlReport {
                candidates,
                ..CrawlReport::default()
            },
        }
    }

    fn candidate(url: &str) -> FileCandidate {
        FileCandidate {
            url: url.to_string(),
            display_name: url.rsplit('/').next().unwrap().to_string(),
            size_bytes: 7,
        }
    }

    #[tokio::test]
    async fn test_fetch_with_no_links_yields_empty_session() {
        let target = CrawlTarget::new("https://example.com/pub").unwrap();
        let session = CrawlSession::new(target, HttpClient::new().unwrap())
            .with_link_source(Arc::new(EmptySite));
        let fetched = session.fetch().await.unwrap();
        assert!(fetched.candidates().is_empty());
        let err = fetched
            .download(DownloadOptions::default(), Arc::new(NoopObserver))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NothingFetched));
    }

    #[tokio::test]
    async fn test_fetch_after_stop_is_cancelled() {
        let target = CrawlTarget::new("https://example.com/pub").unwrap();
        let session = CrawlSession::new(target, HttpClient::new().unwrap())
            .with_link_source(Arc::new(EmptySite));
        session.stop_handle().stop();
        let err = session.fetch().await.unwrap_err();
        assert!(matches!(err, SessionError::Crawl(CrawlError::Cancelled)));
    }

    #[tokio::test]
    async fn test_download_after_stop_is_refused() {
        let session = fetched(vec![candidate("https://example.com/pub/a.zip")]);
        session.stop_handle().stop();
        let err = session
            .download(DownloadOptions::default(), Arc::new(NoopObserver))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Stopped));
    }

    #[tokio::test]
    async fn test_download_rejects_invalid_concurrency() {
        let session = fetched(vec![candidate("https://example.com/pub/a.zip")]);
        let options = DownloadOptions {
            concurrency: 0,
            ..DownloadOptions::default()
        };
        let err = session
            .download(options, Arc::new(NoopObserver))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Scheduler(SchedulerError::InvalidConcurrency { value: 0 })
        ));
    }

    #[test]
    fn test_jobs_map_into_store_dir() {
        let session = fetched(vec![
            candidate("https://example.com/pub/iso/a.iso"),
            candidate("https://example.com/pub/b%20c.zip"),
        ]);
        let jobs = session.jobs();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].local_path, PathBuf::from("mirror/iso/a.iso"));
        assert_eq!(jobs[0].expected_size, 7);
        assert_eq!(jobs[1].local_path, PathBuf::from("mirror/b c.zip"));
    }
}
