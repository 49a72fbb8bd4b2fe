//! Directory-versus-file classification of discovered links.

use std::sync::Arc;

use tracing::{debug, instrument};
use url::Url;

use super::depth;
use super::filter::{ExtensionFilter, is_page_url};
use super::target::CrawlTarget;
use crate::download::HeadProbe;

/// What a discovered link turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// A listing to descend into.
    Directory,
    /// A downloadable file that passed the extension filter.
    File,
    /// A file the extension filter rejected.
    Rejected,
}

/// Computes link depth and decides directory versus file.
///
/// A link is a directory when a HEAD probe reports `text/html` and the URL does not end
/// in `.html`/`.htm`. The content type counts whatever the response status. When no
/// response arrives the URL counts as a directory iff it ends in `/`.
#[derive(Clone)]
pub struct DepthClassifier {
    root: Url,
    extensions: ExtensionFilter,
    probe: Arc<dyn HeadProbe>,
}

impl std::fmt::Debug for DepthClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepthClassifier")
            .field("root", &self.root.as_str())
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

impl DepthClassifier {
    /// Creates a classifier for `target`, probing through `probe`.
    #[must_use]
    pub fn new(target: &CrawlTarget, probe: Arc<dyn HeadProbe>) -> Self {
        Self {
            root: target.root_url().clone(),
            extensions: ExtensionFilter::from_target(target),
            probe,
        }
    }

    /// Depth of `link` below the root; see [`depth`](super::depth()).
    #[must_use]
    pub fn depth(&self, link: &Url) -> Option<usize> {
        depth::depth(&self.root, link)
    }

    /// Classifies `link`, issuing one HEAD probe.
    #[instrument(level = "debug", skip(self), fields(url = %link))]
    pub async fn classify(&self, link: &Url) -> LinkKind {
        let is_dir = match self.probe.head_any_status(link.as_str()).await {
            Ok(head) => head.is_html() && !is_page_url(link),
            Err(e) => {
                debug!(error = %e, "probe failed, falling back to trailing slash");
                link.path().ends_with('/')
            }
        };

        let kind = if is_dir {
            LinkKind::Directory
        } else if self.extensions.allows(link) {
            LinkKind::File
        } else {
            LinkKind::Rejected
        };
        debug!(?kind, "classified link");
        kind
    }
}
