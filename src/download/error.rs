//! Error types for the download module.
//!
//! These errors never escape a single transfer: [`ResumableTransfer`](super::ResumableTransfer)
//! classifies them for retry and folds the final one into a
//! [`TransferOutcome`](super::TransferOutcome). They are public because the crawl side
//! shares the same [`HttpClient`](super::HttpClient) and probe contract.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while probing or downloading a remote file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, body read errors).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL being requested.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during download (create file, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The client's connection gate was closed while waiting for a slot.
    #[error("connection gate closed while requesting {url}")]
    ClientClosed {
        /// The URL that could not be requested.
        url: String,
    },

    /// The body stream ended before the server-advertised size was reached.
    #[error("incomplete download of {path}: expected {expected_bytes} bytes, got {actual_bytes}")]
    Incomplete {
        /// Local file that is short.
        path: PathBuf,
        /// Size advertised by the server.
        expected_bytes: u64,
        /// Size on disk after the stream ended.
        actual_bytes: u64,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a closed-gate error.
    pub fn client_closed(url: impl Into<String>) -> Self {
        Self::ClientClosed { url: url.into() }
    }

    /// Creates a short-body error.
    pub fn incomplete(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Incomplete {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the url or path
// the source error does not carry. Use the constructors above.
