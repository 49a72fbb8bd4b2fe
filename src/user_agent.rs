//! User-Agent string shared by page fetches, probes and downloads.

/// Default User-Agent for every request (identifies the tool and its version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("batchdown/{version} (directory-mirror)")
}
