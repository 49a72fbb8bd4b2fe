//! Streaming, resumable downloads of crawled files.
//!
//! This module provides the HTTP plumbing shared with the crawler and the download
//! half of a session:
//!
//! - [`HttpClient`]: pooled client with a connection ceiling; HEAD probes, page fetches
//!   and ranged body streams
//! - [`ResumableTransfer`]: one file, byte-range resume, fixed-delay retry
//! - [`DownloadScheduler`]: bounded fan-out of [`TransferJob`]s under a shared stop signal
//! - [`TransferObserver`]: start/progress/completion callbacks
//!
//! # Example
//!
//! ```no_run
//! use batchdown_core::download::{
//!     FileTransfer, HttpClient, NoopObserver, ResumableTransfer, TransferJob,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transfer = ResumableTransfer::with_defaults(HttpClient::new()?);
//! let job = TransferJob::new("https://example.com/pub/disk.iso", "mirror/disk.iso", 0);
//! let outcome = transfer
//!     .transfer(&job, &CancellationToken::new(), &NoopObserver)
//!     .await;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod layout;
mod observer;
mod retry;
mod scheduler;
mod transfer;

pub use client::{ClientSettings, HeadProbe, HttpClient, PageBody, RemoteBody, ResourceHead};
pub use constants::{CONNECT_TIMEOUT, DEFAULT_CHUNK_SIZE, DEFAULT_CONNECTION_LIMIT, PROBE_TIMEOUT};
pub use error::DownloadError;
pub use layout::{local_path, prepare_parent};
pub use observer::{NoopObserver, TracingObserver, TransferObserver, TransferReport};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, FailureType, RetryDecision, RetryPolicy,
    classify_error,
};
pub use scheduler::{DEFAULT_CONCURRENCY, DownloadScheduler, DownloadStats, SchedulerError};
pub use transfer::{FileTransfer, ResumableTransfer, TransferJob, TransferOutcome};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
