//! Error types for the crawl module.

use thiserror::Error;

use crate::download::DownloadError;

/// Errors from a [`PageLinkSource`](super::PageLinkSource).
#[derive(Debug, Error)]
pub enum LinkSourceError {
    /// The page could not be fetched.
    #[error("failed to fetch page {url}: {source}")]
    Fetch {
        /// Page URL.
        url: String,
        /// Transport or status error.
        #[source]
        source: DownloadError,
    },

    /// The page URL is not an absolute http(s) URL.
    #[error("invalid page URL: {url}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },
}

impl LinkSourceError {
    /// Creates a fetch error.
    pub fn fetch(url: impl Into<String>, source: DownloadError) -> Self {
        Self::Fetch {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

/// Errors that end a crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Links could not be read from the root page.
    #[error("cannot read root page {url}: {source}")]
    RootPage {
        /// Root URL.
        url: String,
        /// Underlying link-source failure.
        #[source]
        source: LinkSourceError,
    },

    /// Stop was signalled while crawling.
    #[error("crawl cancelled")]
    Cancelled,
}
