//! Breadth-first directory descent from the crawl root.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::classify::{DepthClassifier, LinkKind};
use super::error::CrawlError;
use super::filter::LinkFilter;
use super::links::PageLinkSource;
use super::target::CrawlTarget;
use crate::cancel::Cancellation;
use crate::download::HeadProbe;

/// Default number of simultaneous size probes after the crawl.
pub const DEFAULT_PROBE_CONCURRENCY: usize = 8;

/// A discovered file that will be downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCandidate {
    /// Absolute, fragment-free URL. Identity key.
    pub url: String,
    /// Percent-decoded last path segment.
    pub display_name: String,
    /// Remote size in bytes, 0 when unknown.
    pub size_bytes: u64,
}

/// A discovered file dropped by the name filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExclusionRecord {
    /// Name that matched the filter.
    pub display_name: String,
    /// URL of the excluded file.
    pub url: String,
}

/// Result of a completed crawl.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlReport {
    /// Files to download, ordered by URL.
    pub candidates: Vec<FileCandidate>,
    /// Files removed by the name filter.
    pub exclusions: Vec<ExclusionRecord>,
    /// Directories whose listing could not be fetched. Their subtrees were skipped.
    pub skipped_directories: Vec<String>,
}

/// Walks the directory tree under a [`CrawlTarget`] and collects file candidates.
pub struct Crawler {
    target: CrawlTarget,
    links: Arc<dyn PageLinkSource>,
    probe: Arc<dyn HeadProbe>,
    classifier: DepthClassifier,
    probe_concurrency: usize,
}

impl std::fmt::Debug for Crawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crawler")
            .field("target", &self.target)
            .field("probe_concurrency", &self.probe_concurrency)
            .finish_non_exhaustive()
    }
}

/// Mutable state of one crawl.
#[derive(Default)]
struct Walk {
    queue: VecDeque<(Url, usize)>,
    visited: HashSet<String>,
    classified: HashSet<String>,
    found: BTreeMap<String, FileCandidate>,
    skipped: Vec<String>,
}

impl Crawler {
    /// Creates a crawler for `target`.
    #[must_use]
    pub fn new(
        target: CrawlTarget,
        links: Arc<dyn PageLinkSource>,
        probe: Arc<dyn HeadProbe>,
    ) -> Self {
        let classifier = DepthClassifier::new(&target, Arc::clone(&probe));
        Self {
            target,
            links,
            probe,
            classifier,
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
        }
    }

    /// Sets how many size probes may run at once (minimum 1).
    #[must_use]
    pub fn with_probe_concurrency(mut self, probe_concurrency: usize) -> Self {
        self.probe_concurrency = probe_concurrency.max(1);
        self
    }

    /// The crawl target.
    #[must_use]
    pub fn target(&self) -> &CrawlTarget {
        &self.target
    }

    /// Runs the crawl.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::RootPage`] when the root page cannot be read and
    /// [`CrawlError::Cancelled`] when stop is signalled. Failures below the root only
    /// skip the affected subtree.
    #[instrument(skip(self, cancel), fields(root = %self.target.root_url(), max_depth = self.target.max_depth()))]
    pub async fn crawl(&self, cancel: &Cancellation) -> Result<CrawlReport, CrawlError> {
        checkpoint(cancel)?;
        let root = self.target.root_listing_url();
        info!("crawl started");

        let root_links = self
            .links
            .links(&root)
            .await
            .map_err(|source| CrawlError::RootPage {
                url: root.to_string(),
                source,
            })?;

        let mut walk = Walk::default();
        walk.visited.insert(directory_key(&root));
        self.absorb(root_links, 0, &mut walk, cancel).await?;

        while let Some((dir, depth)) = walk.queue.pop_front() {
            if depth + 1 > self.target.max_depth() {
                debug!(url = %dir, depth, "depth limit reached, not descending");
                continue;
            }
            checkpoint(cancel)?;
            info!(url = %dir, depth, "scanning directory");

            match self.links.links(&dir).await {
                Ok(links) => self.absorb(links, depth + 1, &mut walk, cancel).await?,
                Err(e) => {
                    warn!(url = %dir, error = %e, "skipping directory");
                    walk.skipped.push(dir.to_string());
                }
            }
        }

        let filter = LinkFilter::from_target(&self.target);
        let (kept, dropped): (Vec<_>, Vec<_>) = walk
            .found
            .into_values()
            .partition(|candidate| filter.is_allowed(&candidate.display_name));
        let exclusions: Vec<ExclusionRecord> = dropped
            .into_iter()
            .map(|c| ExclusionRecord {
                display_name: c.display_name,
                url: c.url,
            })
            .collect();
        for excluded in &exclusions {
            debug!(name = %excluded.display_name, "excluded by name filter");
        }

        let candidates = self.resolve_sizes(kept, cancel).await?;
        info!(
            candidates = candidates.len(),
            excluded = exclusions.len(),
            skipped_directories = walk.skipped.len(),
            "crawl finished"
        );
        Ok(CrawlReport {
            candidates,
            exclusions,
            skipped_directories: walk.skipped,
        })
    }

    /// Classifies every link at exactly `depth` and files it into the walk.
    async fn absorb(
        &self,
        links: impl IntoIterator<Item = Url>,
        depth: usize,
        walk: &mut Walk,
        cancel: &Cancellation,
    ) -> Result<(), CrawlError> {
        for link in links {
            if self.classifier.depth(&link) != Some(depth) {
                continue;
            }
            if walk.visited.contains(&directory_key(&link))
                || !walk.classified.insert(link.to_string())
            {
                continue;
            }
            checkpoint(cancel)?;

            match self.classifier.classify(&link).await {
                LinkKind::Directory => {
                    if walk.visited.insert(directory_key(&link)) {
                        walk.queue.push_back((link, depth));
                    }
                }
                LinkKind::File => {
                    let candidate = FileCandidate {
                        url: link.to_string(),
                        display_name: display_name(&link),
                        size_bytes: 0,
                    };
                    walk.found.insert(candidate.url.clone(), candidate);
                }
                LinkKind::Rejected => debug!(url = %link, "rejected by extension filter"),
            }
        }
        Ok(())
    }

    /// Fills in unknown sizes from `Content-Length`. Probe failures leave 0.
    async fn resolve_sizes(
        &self,
        candidates: Vec<FileCandidate>,
        cancel: &Cancellation,
    ) -> Result<Vec<FileCandidate>, CrawlError> {
        checkpoint(cancel)?;
        let resolved: Vec<FileCandidate> = stream::iter(candidates)
            .map(|mut candidate| async move {
                if candidate.size_bytes == 0 && !cancel.is_stopped() {
                    match self.probe.head(&candidate.url).await {
                        Ok(head) => candidate.size_bytes = head.content_length.unwrap_or(0),
                        Err(e) => debug!(url = %candidate.url, error = %e, "size probe failed"),
                    }
                }
                candidate
            })
            .buffered(self.probe_concurrency)
            .collect()
            .await;
        checkpoint(cancel)?;
        Ok(resolved)
    }
}

fn checkpoint(cancel: &Cancellation) -> Result<(), CrawlError> {
    if cancel.is_stopped() {
        Err(CrawlError::Cancelled)
    } else {
        Ok(())
    }
}

/// Visit key for a directory: the URL with any trailing slash removed.
fn directory_key(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}

/// Percent-decoded last non-empty path segment.
fn display_name(url: &Url) -> String {
    let raw = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .unwrap_or_default();
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), std::borrow::Cow::into_owned)
}
