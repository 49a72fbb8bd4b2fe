//! Hyperlink discovery for a single page.

use std::collections::BTreeSet;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::error::LinkSourceError;
use crate::download::HttpClient;

/// Returns the absolute hyperlinks found on a page.
///
/// Implementations return fragment-free http(s) URLs only.
#[async_trait]
pub trait PageLinkSource: Send + Sync {
    /// Loads `url` and collects its links.
    ///
    /// # Errors
    ///
    /// Returns [`LinkSourceError`] when the page cannot be loaded.
    async fn links(&self, url: &Url) -> Result<BTreeSet<Url>, LinkSourceError>;
}

/// Link source that fetches static HTML and reads `a[href]` anchors. Scripts are not run.
#[derive(Debug, Clone)]
pub struct HtmlLinkSource {
    client: HttpClient,
}

impl HtmlLinkSource {
    /// Creates a link source sharing `client`'s connection pool.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageLinkSource for HtmlLinkSource {
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn links(&self, url: &Url) -> Result<BTreeSet<Url>, LinkSourceError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(LinkSourceError::invalid_url(url.as_str()));
        }
        let page = self
            .client
            .page(url.as_str())
            .await
            .map_err(|e| LinkSourceError::fetch(url.as_str(), e))?;
        let links = extract_links(&page.text, &page.final_url);
        debug!(count = links.len(), "extracted links");
        Ok(links)
    }
}

/// Extracts absolute links from `html`, resolving relative hrefs against `base`.
///
/// Honors a `<base href>` element when present.
///
/// ```
/// use url::Url;
/// use batchdown_core::crawl::extract_links;
///
/// let base = Url::parse("https://example.com/pub/").unwrap();
/// let html = r##"<a href="a.zip">a</a> <a href="#top">top</a> <a href="sub/">sub</a>"##;
/// let links: Vec<String> = extract_links(html, &base).into_iter().map(String::from).collect();
/// assert_eq!(links, vec!["https://example.com/pub/a.zip", "https://example.com/pub/sub/"]);
/// ```
#[must_use]
pub fn extract_links(html: &str, base: &Url) -> BTreeSet<Url> {
    let doc = Html::parse_document(html);

    let base = Selector::parse("base[href]")
        .ok()
        .and_then(|sel| {
            doc.select(&sel)
                .next()
                .and_then(|el| el.value().attr("href"))
                .and_then(|href| base.join(href.trim()).ok())
        })
        .unwrap_or_else(|| base.clone());

    let Ok(selector) = Selector::parse("a[href]") else {
        return BTreeSet::new();
    };
    doc.select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| resolve_href(&base, href.trim()))
        .collect()
}

fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("javascript:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved)
}
