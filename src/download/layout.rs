//! Mapping remote URLs onto the local mirror directory.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use url::Url;

use super::error::DownloadError;

/// Returns the local path for `url` under `store_dir`.
///
/// The URL path is percent-decoded and the root prefix is stripped when the path lies
/// under it. `.`, `..` and empty segments are dropped, so the result never escapes
/// `store_dir`. Returns `None` when nothing is left to name a file.
///
/// ```
/// use std::path::Path;
/// use url::Url;
/// use batchdown_core::download::local_path;
///
/// let url = Url::parse("https://example.com/pub/iso/disk%201.iso").unwrap();
/// let path = local_path(Path::new("mirror"), "/pub", &url).unwrap();
/// assert_eq!(path, Path::new("mirror/iso/disk 1.iso"));
/// ```
#[must_use]
pub fn local_path(store_dir: &Path, root_prefix: &str, url: &Url) -> Option<PathBuf> {
    let raw_path = url.path();
    let prefix = root_prefix.trim_end_matches('/');
    let relative = match raw_path.strip_prefix(prefix) {
        Some(rest) if !prefix.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
        _ => raw_path,
    };

    let mut path = store_dir.to_path_buf();
    let mut pushed = false;
    for segment in relative.split('/') {
        let decoded = urlencoding::decode(segment)
            .map_or_else(|_| segment.to_string(), std::borrow::Cow::into_owned);
        if matches!(decoded.as_str(), "" | "." | "..") {
            continue;
        }
        // A decoded `%2F` must not introduce extra directories.
        let decoded = decoded.replace(['/', '\\'], "_");
        path.push(decoded);
        pushed = true;
    }
    pushed.then_some(path)
}

/// Creates the parent directories of `path`.
///
/// A plain file sitting where one of the directories is needed is removed first.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] if a blocking file cannot be removed or a directory
/// cannot be created.
pub async fn prepare_parent(path: &Path) -> Result<(), DownloadError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    let mut current = PathBuf::new();
    for component in parent.components() {
        current.push(component);
        if !matches!(component, Component::Normal(_)) {
            continue;
        }
        match tokio::fs::metadata(&current).await {
            Ok(meta) if meta.is_file() => {
                debug!(path = %current.display(), "removing file that blocks a directory");
                tokio::fs::remove_file(&current)
                    .await
                    .map_err(|e| DownloadError::io(&current, e))?;
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => break,
            Err(e) => return Err(DownloadError::io(&current, e)),
        }
    }

    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| DownloadError::io(parent, e))
}
