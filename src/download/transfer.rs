//! Single-file resumable transfer with retry.
//!
//! [`ResumableTransfer`] downloads one remote file into its mirror path:
//!
//! 1. A HEAD probe learns the remote size. If the probe fails the file is left alone.
//! 2. A local file whose size already equals the remote size is reported as
//!    [`TransferOutcome::AlreadyComplete`] without issuing a GET.
//! 3. Every attempt re-reads the local size and asks for `Range: bytes=<offset>-`, whether
//!    or not the remote size is known. A `206` response is appended; a `200` response means
//!    the server ignored the range and the file is rewritten from byte 0. When the size is
//!    unknown, a `416` answer means the local file already holds everything.
//! 4. Transient failures are retried with a fixed delay. When the attempt budget runs out
//!    the partial file is deleted.
//!
//! A stop signal is honoured before every written piece, around every network await and
//! during backoff. A cancelled transfer keeps its partial file for a later resume.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::{HeadProbe, HttpClient, RemoteBody};
use super::constants::DEFAULT_CHUNK_SIZE;
use super::error::DownloadError;
use super::layout::prepare_parent;
use super::observer::TransferObserver;
use super::retry::{RetryDecision, RetryPolicy, classify_error};

/// One scheduled unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    /// Remote URL.
    pub url: String,
    /// Destination on disk.
    pub local_path: PathBuf,
    /// Size reported during the crawl, 0 when unknown. Informational only.
    pub expected_size: u64,
}

impl TransferJob {
    /// Creates a job.
    pub fn new(url: impl Into<String>, local_path: impl Into<PathBuf>, expected_size: u64) -> Self {
        Self {
            url: url.into(),
            local_path: local_path.into(),
            expected_size,
        }
    }
}

/// How a transfer ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The file was downloaded (or finished resuming).
    Completed {
        /// Final size on disk.
        bytes: u64,
        /// Attempts used, including the successful one.
        attempts: u32,
        /// Offset the successful attempt resumed from (0 for a fresh download).
        resumed_from: u64,
    },
    /// The local file already matched the remote size; nothing was fetched.
    AlreadyComplete {
        /// Size on disk.
        bytes: u64,
    },
    /// Stop was signalled. The partial file is kept.
    Cancelled {
        /// Bytes on disk when the transfer stopped.
        bytes: u64,
    },
    /// The transfer gave up. Any partial file has been removed.
    Failed {
        /// Last error, rendered.
        reason: String,
        /// GET attempts made. 0 when the size probe failed.
        attempts: u32,
    },
}

impl TransferOutcome {
    /// True for [`Completed`](Self::Completed) and [`AlreadyComplete`](Self::AlreadyComplete).
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::AlreadyComplete { .. })
    }
}

/// A strategy for moving one remote file to disk.
///
/// The scheduler only knows this trait; tests substitute instrumented fakes.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Runs the transfer to completion. Failures are folded into the outcome.
    async fn transfer(
        &self,
        job: &TransferJob,
        cancel: &CancellationToken,
        observer: &dyn TransferObserver,
    ) -> TransferOutcome;
}

/// How a single attempt ended without error.
enum AttemptEnd {
    Finished { bytes: u64, resumed_from: u64 },
    AlreadyComplete { bytes: u64 },
    Cancelled { bytes: u64 },
}

/// HTTP transfer with byte-range resume and fixed-delay retry.
#[derive(Debug, Clone)]
pub struct ResumableTransfer {
    client: HttpClient,
    retry_policy: RetryPolicy,
    chunk_size: usize,
}

impl ResumableTransfer {
    /// Creates a transfer strategy. A zero `chunk_size` is raised to one byte.
    #[must_use]
    pub fn new(client: HttpClient, retry_policy: RetryPolicy, chunk_size: usize) -> Self {
        Self {
            client,
            retry_policy,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Creates a transfer strategy with the default policy and chunk size.
    #[must_use]
    pub fn with_defaults(client: HttpClient) -> Self {
        Self::new(client, RetryPolicy::default(), DEFAULT_CHUNK_SIZE)
    }

    /// Largest piece written between cancellation checks.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The retry policy in use.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    async fn attempt(
        &self,
        job: &TransferJob,
        remote_size: Option<u64>,
        cancel: &CancellationToken,
        observer: &dyn TransferObserver,
    ) -> Result<AttemptEnd, DownloadError> {
        let path = job.local_path.as_path();
        let mut offset = existing_len(path).await?;
        if let Some(total) = remote_size.filter(|&total| offset > total) {
            debug!(offset, total, "local file larger than remote, restarting");
            remove_partial(path).await;
            offset = 0;
        }

        let range_start = (offset > 0).then_some(offset);
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(AttemptEnd::Cancelled { bytes: offset }),
            response = self.client.get(&job.url, range_start) => response,
        };
        let mut body = match response {
            // Nothing left past our offset and no size to compare against: the file is whole.
            Err(DownloadError::HttpStatus { status: 416, .. })
                if range_start.is_some() && remote_size.is_none() =>
            {
                debug!(offset, "range not satisfiable, local file already complete");
                return Ok(AttemptEnd::AlreadyComplete { bytes: offset });
            }
            response => response?,
        };

        let append = range_start.is_some() && body.is_partial();
        if range_start.is_some() && !append {
            debug!(status = body.status(), "server ignored range request, restarting");
            offset = 0;
        }

        prepare_parent(path).await?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        let mut writer = BufWriter::new(file);

        let mut written = offset;
        observer.on_progress(&job.url, written, remote_size);
        let streamed = self
            .stream_body(job, &mut body, &mut writer, &mut written, remote_size, cancel, observer)
            .await;
        let flushed = writer.flush().await.map_err(|e| DownloadError::io(path, e));
        let finished = streamed?;
        flushed?;

        if !finished {
            return Ok(AttemptEnd::Cancelled { bytes: written });
        }
        if let Some(total) = remote_size {
            if written < total {
                return Err(DownloadError::incomplete(path, total, written));
            }
        }
        Ok(AttemptEnd::Finished {
            bytes: written,
            resumed_from: offset,
        })
    }

    /// Copies the body to `writer` in pieces of at most `chunk_size`. Returns `false`
    /// when stop was signalled before the body ended.
    #[allow(clippy::too_many_arguments)]
    async fn stream_body<W: AsyncWrite + Unpin>(
        &self,
        job: &TransferJob,
        body: &mut RemoteBody,
        writer: &mut W,
        written: &mut u64,
        remote_size: Option<u64>,
        cancel: &CancellationToken,
        observer: &dyn TransferObserver,
    ) -> Result<bool, DownloadError> {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(false),
                chunk = body.next_chunk(&job.url) => chunk,
            };
            let Some(chunk) = next else {
                return Ok(true);
            };
            let chunk = chunk?;
            for piece in chunk.chunks(self.chunk_size) {
                if cancel.is_cancelled() {
                    return Ok(false);
                }
                writer
                    .write_all(piece)
                    .await
                    .map_err(|e| DownloadError::io(&job.local_path, e))?;
                *written += piece.len() as u64;
                observer.on_progress(&job.url, *written, remote_size);
            }
        }
    }
}

#[async_trait]
impl FileTransfer for ResumableTransfer {
    #[instrument(skip(self, job, cancel, observer), fields(url = %job.url))]
    async fn transfer(
        &self,
        job: &TransferJob,
        cancel: &CancellationToken,
        observer: &dyn TransferObserver,
    ) -> TransferOutcome {
        let path = job.local_path.as_path();
        if cancel.is_cancelled() {
            return TransferOutcome::Cancelled {
                bytes: existing_len(path).await.unwrap_or(0),
            };
        }

        let head = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return TransferOutcome::Cancelled {
                    bytes: existing_len(path).await.unwrap_or(0),
                };
            }
            head = self.client.head(&job.url) => head,
        };
        let remote_size = match head {
            Ok(head) => head.content_length,
            Err(e) => {
                warn!(error = %e, "size probe failed, leaving file untouched");
                return TransferOutcome::Failed {
                    reason: e.to_string(),
                    attempts: 0,
                };
            }
        };

        if let Some(total) = remote_size {
            if tokio::fs::metadata(path)
                .await
                .is_ok_and(|meta| meta.is_file() && meta.len() == total)
            {
                debug!(bytes = total, "local file already complete");
                return TransferOutcome::AlreadyComplete { bytes: total };
            }
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(attempt, ?remote_size, "attempting download");

            let error = match self.attempt(job, remote_size, cancel, observer).await {
                Ok(AttemptEnd::Finished {
                    bytes,
                    resumed_from,
                }) => {
                    return TransferOutcome::Completed {
                        bytes,
                        attempts: attempt,
                        resumed_from,
                    };
                }
                Ok(AttemptEnd::AlreadyComplete { bytes }) => {
                    return TransferOutcome::AlreadyComplete { bytes };
                }
                Ok(AttemptEnd::Cancelled { bytes }) => {
                    debug!(bytes, "transfer cancelled");
                    return TransferOutcome::Cancelled { bytes };
                }
                Err(e) => e,
            };

            match self.retry_policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    info!(
                        attempt = next_attempt,
                        max_attempts = self.retry_policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying download"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            return TransferOutcome::Cancelled {
                                bytes: existing_len(path).await.unwrap_or(0),
                            };
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::DoNotRetry { reason } => {
                    warn!(error = %error, attempts = attempt, %reason, "giving up on download");
                    remove_partial(path).await;
                    return TransferOutcome::Failed {
                        reason: error.to_string(),
                        attempts: attempt,
                    };
                }
            }
        }
    }
}

async fn existing_len(path: &Path) -> Result<u64, DownloadError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        Ok(_) => Ok(0),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(DownloadError::io(path, e)),
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial file"),
    }
}
