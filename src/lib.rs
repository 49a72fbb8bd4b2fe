//! Batchdown Core Library
//!
//! This library mirrors the downloadable files reachable from a web directory listing.
//! It walks the listing tree to a bounded depth, decides which links are directories and
//! which are files, filters the files by extension and name, and downloads them
//! concurrently with byte-range resume, retries and cooperative cancellation.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`crawl`] - Link discovery, depth tracking, classification and filtering
//! - [`download`] - HTTP client, resumable transfers and the concurrency-bounded scheduler
//! - [`session`] - The fetch-then-download lifecycle tying both together
//! - [`cancel`] - Session stop signal and in-flight registry

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod crawl;
pub mod download;
pub mod session;
mod user_agent;

// Re-export commonly used types
pub use cancel::{Cancellation, InFlightGuard};
pub use crawl::{
    CrawlError, CrawlReport, CrawlTarget, Crawler, ExclusionRecord, FileCandidate, LinkFilter,
    PageLinkSource, TargetError,
};
pub use download::{
    DEFAULT_CONCURRENCY, DownloadError, DownloadScheduler, DownloadStats, HttpClient,
    ResumableTransfer, RetryPolicy, SchedulerError, TransferJob, TransferObserver,
    TransferOutcome,
};
pub use session::{CrawlSession, DownloadOptions, FetchedSession, SessionError};
