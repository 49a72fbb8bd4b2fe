//! Depth of a link below the crawl root.
//!
//! Depth counts path segments below the root prefix, minus one: entries listed on the
//! root page are depth 0, their children depth 1. Empty segments are ignored, so a
//! trailing slash never changes depth.

use url::Url;

/// Returns the part of `path` below `root_prefix`, or `None` when `path` is outside it.
///
/// The comparison is segment-aware: `/pub` contains `/pub/a` but not `/public`.
#[must_use]
pub fn relative_path<'a>(root_prefix: &str, path: &'a str) -> Option<&'a str> {
    let prefix = root_prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// Depth of `link` below `root`.
///
/// `None` when the link is on another origin, outside the root path, or is the root
/// itself.
///
/// ```
/// use url::Url;
/// use batchdown_core::crawl::depth;
///
/// let root = Url::parse("https://example.com/pub").unwrap();
/// let link = |s: &str| Url::parse(s).unwrap();
/// assert_eq!(depth(&root, &link("https://example.com/pub/a.zip")), Some(0));
/// assert_eq!(depth(&root, &link("https://example.com/pub/iso/")), Some(0));
/// assert_eq!(depth(&root, &link("https://example.com/pub/iso/b.iso")), Some(1));
/// assert_eq!(depth(&root, &link("https://example.com/other/c.zip")), None);
/// ```
#[must_use]
pub fn depth(root: &Url, link: &Url) -> Option<usize> {
    if root.origin() != link.origin() {
        return None;
    }
    let rest = relative_path(root.path(), link.path())?;
    let segments = rest.split('/').filter(|s| !s.is_empty()).count();
    segments.checked_sub(1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_relative_path_segment_aware() {
        assert_eq!(relative_path("/pub", "/pub/a"), Some("/a"));
        assert_eq!(relative_path("/pub/", "/pub/a"), Some("/a"));
        assert_eq!(relative_path("/pub", "/pub"), Some(""));
        assert_eq!(relative_path("/pub", "/public/a"), None);
        assert_eq!(relative_path("", "/x/y"), Some("/x/y"));
    }

    #[test]
    fn test_depth_relative_to_prefix_not_absolute_path() {
        let root = url("https://example.com/a/b/c");
        assert_eq!(depth(&root, &url("https://example.com/a/b/c/file.zip")), Some(0));
        assert_eq!(depth(&root, &url("https://example.com/a/b/c/d/e/f.zip")), Some(2));
    }

    #[test]
    fn test_depth_ignores_trailing_and_duplicate_slashes() {
        let root = url("https://example.com/pub");
        assert_eq!(depth(&root, &url("https://example.com/pub/dir/")), Some(0));
        assert_eq!(depth(&root, &url("https://example.com/pub//dir//x")), Some(1));
    }

    #[test]
    fn test_depth_of_root_itself_is_none() {
        let root = url("https://example.com/pub");
        assert_eq!(depth(&root, &url("https://example.com/pub/")), None);
        assert_eq!(depth(&root, &url("https://example.com/pub")), None);
    }

    #[test]
    fn test_depth_parent_and_other_origin_are_none() {
        let root = url("https://example.com/pub/linux");
        assert_eq!(depth(&root, &url("https://example.com/pub/")), None);
        assert_eq!(depth(&root, &url("https://mirror.example.com/pub/linux/a")), None);
        assert_eq!(depth(&root, &url("http://example.com/pub/linux/a")), None);
    }

    #[test]
    fn test_depth_host_root() {
        let root = url("https://example.com");
        assert_eq!(depth(&root, &url("https://example.com/a.zip")), Some(0));
        assert_eq!(depth(&root, &url("https://example.com/x/a.zip")), Some(1));
    }
}
