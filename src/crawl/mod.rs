//! Link discovery and directory descent.
//!
//! A crawl starts at the root of a [`CrawlTarget`], reads the links on each listing page
//! through a [`PageLinkSource`], classifies every link one level below the current
//! directory with a [`DepthClassifier`], and descends breadth-first until the depth limit.
//! The surviving files are name-filtered by a [`LinkFilter`] and their sizes resolved
//! with HEAD probes.

mod classify;
mod crawler;
mod depth;
mod error;
mod filter;
mod links;
mod target;

pub use classify::{DepthClassifier, LinkKind};
pub use crawler::{CrawlReport, Crawler, DEFAULT_PROBE_CONCURRENCY, ExclusionRecord, FileCandidate};
pub use depth::{depth, relative_path};
pub use error::{CrawlError, LinkSourceError};
pub use filter::{ExtensionFilter, LinkFilter, is_page_url};
pub use links::{HtmlLinkSource, PageLinkSource, extract_links};
pub use target::{CrawlTarget, DEFAULT_MAX_DEPTH, TargetError};
