//! Name-based filtering of discovered files.

use std::collections::BTreeSet;

use url::Url;

use super::target::CrawlTarget;

/// Substring allow/deny filter applied to file display names.
///
/// Matching is case-insensitive containment. The blacklist always wins; a non-empty
/// whitelist then requires at least one hit.
///
/// ```
/// use batchdown_core::crawl::LinkFilter;
///
/// let filter = LinkFilter::new(["release"], ["beta"]);
/// assert!(filter.is_allowed("Release-1.0.zip"));
/// assert!(!filter.is_allowed("release-beta.zip"));
/// assert!(!filter.is_allowed("nightly.zip"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    whitelist: BTreeSet<String>,
    blacklist: BTreeSet<String>,
}

impl LinkFilter {
    /// Creates a filter. Substrings are trimmed and lowercased; empty ones are dropped.
    pub fn new<W, B, S, T>(whitelist: W, blacklist: B) -> Self
    where
        W: IntoIterator<Item = S>,
        B: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            whitelist: normalize(whitelist),
            blacklist: normalize(blacklist),
        }
    }

    /// Builds the filter configured on `target`.
    #[must_use]
    pub fn from_target(target: &CrawlTarget) -> Self {
        Self {
            whitelist: target.whitelist().clone(),
            blacklist: target.blacklist().clone(),
        }
    }

    /// Returns true when `name` survives the filter.
    #[must_use]
    pub fn is_allowed(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        if self.blacklist.iter().any(|needle| name.contains(needle.as_str())) {
            return false;
        }
        self.whitelist.is_empty() || self.whitelist.iter().any(|needle| name.contains(needle.as_str()))
    }
}

fn normalize<I, S>(items: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Suffixes treated as rendered pages rather than files.
const PAGE_SUFFIXES: [&str; 2] = [".html", ".htm"];

/// Extension allow-set applied while classifying links.
#[derive(Debug, Clone, Default)]
pub struct ExtensionFilter {
    extensions: BTreeSet<String>,
    include_html: bool,
}

impl ExtensionFilter {
    /// Creates a filter from normalised extensions (lowercase, leading dot).
    #[must_use]
    pub fn new(extensions: BTreeSet<String>, include_html: bool) -> Self {
        Self {
            extensions,
            include_html,
        }
    }

    /// Builds the filter configured on `target`.
    #[must_use]
    pub fn from_target(target: &CrawlTarget) -> Self {
        Self::new(target.extensions().clone(), target.include_html())
    }

    /// Returns true when `url` may become a file candidate.
    ///
    /// Page files are rejected unless page inclusion is on. Otherwise an empty set admits
    /// every suffix and a non-empty one requires an exact match.
    #[must_use]
    pub fn allows(&self, url: &Url) -> bool {
        let suffix = suffix(url);
        if !self.include_html && suffix.as_deref().is_some_and(is_page_suffix) {
            return false;
        }
        if self.extensions.is_empty() {
            return true;
        }
        suffix.is_some_and(|s| self.extensions.contains(&s))
    }
}

/// True when the URL path ends in `.html` or `.htm`.
#[must_use]
pub fn is_page_url(url: &Url) -> bool {
    suffix(url).as_deref().is_some_and(is_page_suffix)
}

fn is_page_suffix(suffix: &str) -> bool {
    PAGE_SUFFIXES.contains(&suffix)
}

/// Lowercased last `.`-suffix of the last non-empty path segment, dot included.
fn suffix(url: &Url) -> Option<String> {
    let name = url.path().rsplit('/').find(|s| !s.is_empty())?;
    let dot = name.rfind('.').filter(|&i| i > 0)?;
    Some(name[dot..].to_lowercase())
}
