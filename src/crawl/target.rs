//! Crawl configuration: where to start, how deep to go, what to keep.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use url::Url;

/// Default recursion depth below the root.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Errors building a [`CrawlTarget`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    /// The root URL could not be parsed.
    #[error("invalid root URL {url}: {reason}")]
    InvalidUrl {
        /// The rejected input.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// The root URL uses a scheme other than http or https.
    #[error("unsupported scheme `{scheme}` in root URL {url}")]
    UnsupportedScheme {
        /// The rejected input.
        url: String,
        /// The offending scheme.
        scheme: String,
    },
}

/// Immutable description of one crawl.
///
/// ```
/// use batchdown_core::CrawlTarget;
///
/// let target = CrawlTarget::new("https://mirror.example.org/pub/")
///     .unwrap()
///     .with_max_depth(2)
///     .with_extensions(["zip", ".ISO"])
///     .with_blacklist(["beta"]);
/// assert_eq!(target.root_url().as_str(), "https://mirror.example.org/pub");
/// assert!(target.extensions().contains(".iso"));
/// ```
#[derive(Debug, Clone)]
pub struct CrawlTarget {
    root_url: Url,
    max_depth: usize,
    store_dir: PathBuf,
    extensions: BTreeSet<String>,
    whitelist: BTreeSet<String>,
    blacklist: BTreeSet<String>,
    include_html: bool,
}

impl CrawlTarget {
    /// Creates a target rooted at `root_url` with default settings.
    ///
    /// The fragment and any trailing `/` are removed from the root path. The store
    /// directory defaults to the root's host name.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError`] if the URL does not parse or is not http(s).
    pub fn new(root_url: &str) -> Result<Self, TargetError> {
        let mut url = Url::parse(root_url.trim()).map_err(|e| TargetError::InvalidUrl {
            url: root_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TargetError::UnsupportedScheme {
                url: root_url.to_string(),
                scheme: url.scheme().to_string(),
            });
        }
        url.set_fragment(None);
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);

        let store_dir = PathBuf::from(url.host_str().unwrap_or("download"));
        Ok(Self {
            root_url: url,
            max_depth: DEFAULT_MAX_DEPTH,
            store_dir,
            extensions: BTreeSet::new(),
            whitelist: BTreeSet::new(),
            blacklist: BTreeSet::new(),
            include_html: false,
        })
    }

    /// Sets the maximum recursion depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets the directory downloaded files are mirrored into.
    #[must_use]
    pub fn with_store_dir(mut self, store_dir: impl Into<PathBuf>) -> Self {
        self.store_dir = store_dir.into();
        self
    }

    /// Restricts files to these extensions. `zip`, `.zip` and `.ZIP` are equivalent.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .filter_map(|ext| normalize_extension(ext.as_ref()))
            .collect();
        self
    }

    /// Keeps only names containing one of these substrings (case-insensitive).
    #[must_use]
    pub fn with_whitelist<I, S>(mut self, substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.whitelist = normalize_substrings(substrings);
        self
    }

    /// Drops names containing any of these substrings (case-insensitive).
    #[must_use]
    pub fn with_blacklist<I, S>(mut self, substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.blacklist = normalize_substrings(substrings);
        self
    }

    /// Whether `.html`/`.htm` files are downloaded as files.
    #[must_use]
    pub fn with_include_html(mut self, include_html: bool) -> Self {
        self.include_html = include_html;
        self
    }

    /// Root URL, without fragment. The path has no trailing slash unless it is `/`.
    #[must_use]
    pub fn root_url(&self) -> &Url {
        &self.root_url
    }

    /// Root URL with a trailing slash, as requested for the root listing.
    ///
    /// Relative hrefs on the listing resolve below the root only against this form.
    #[must_use]
    pub fn root_listing_url(&self) -> Url {
        let mut url = self.root_url.clone();
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url
    }

    /// Path prefix every depth is measured against (no trailing slash).
    #[must_use]
    pub fn root_prefix(&self) -> &str {
        self.root_url.path().trim_end_matches('/')
    }

    /// Maximum recursion depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Local mirror directory.
    #[must_use]
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Normalised extension allow-set (lowercase, leading dot). Empty allows all.
    #[must_use]
    pub fn extensions(&self) -> &BTreeSet<String> {
        &self.extensions
    }

    /// Normalised whitelist substrings.
    #[must_use]
    pub fn whitelist(&self) -> &BTreeSet<String> {
        &self.whitelist
    }

    /// Normalised blacklist substrings.
    #[must_use]
    pub fn blacklist(&self) -> &BTreeSet<String> {
        &self.blacklist
    }

    /// Whether page files are kept as downloads.
    #[must_use]
    pub fn include_html(&self) -> bool {
        self.include_html
    }
}

fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().to_lowercase();
    let bare = trimmed.trim_start_matches('.');
    (!bare.is_empty()).then(|| format!(".{bare}"))
}

fn normalize_substrings<I, S>(substrings: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    substrings
        .into_iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
