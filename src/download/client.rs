//! HTTP client wrapper shared by the crawler and the transfers.
//!
//! [`HttpClient`] wraps a pooled `reqwest::Client` and adds a connection ceiling: every
//! request holds a slot from a shared semaphore for as long as its response is alive, so
//! classification probes, size probes, page fetches and body streams together never open
//! more connections than configured.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, RANGE};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT, DEFAULT_CONNECTION_LIMIT, PROBE_TIMEOUT};
use super::error::DownloadError;
use crate::user_agent;

/// Timeouts and limits for an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// TCP/TLS connect timeout for every request.
    pub connect_timeout: Duration,
    /// Total timeout for HEAD probes and page fetches. Body downloads have none.
    pub probe_timeout: Duration,
    /// Maximum simultaneous connections across all request kinds.
    pub connection_limit: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            probe_timeout: PROBE_TIMEOUT,
            connection_limit: DEFAULT_CONNECTION_LIMIT,
        }
    }
}

/// Metadata returned by a HEAD probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHead {
    /// Response status code.
    pub status: u16,
    /// Raw `Content-Type` header value, if any.
    pub content_type: Option<String>,
    /// Parsed `Content-Length` header value, if any.
    pub content_length: Option<u64>,
}

impl ResourceHead {
    /// Returns true when the server labels the resource as a renderable HTML page.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
    }
}

/// Lightweight metadata probe used for directory classification and size resolution.
#[async_trait]
pub trait HeadProbe: Send + Sync {
    /// Issues a HEAD request for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on transport failure, timeout, or a non-success status.
    async fn head(&self, url: &str) -> Result<ResourceHead, DownloadError>;

    /// Issues a HEAD request and returns its metadata whatever the status code.
    ///
    /// Directory classification reads `Content-Type` from error pages too, so only
    /// transport failures and timeouts are errors here. Defaults to [`head`](Self::head).
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] when no response arrives.
    async fn head_any_status(&self, url: &str) -> Result<ResourceHead, DownloadError> {
        self.head(url).await
    }
}

/// A fetched HTML page, ready for link extraction.
#[derive(Debug, Clone)]
pub struct PageBody {
    /// URL after redirects; hrefs resolve against this.
    pub final_url: Url,
    /// Response body decoded as text.
    pub text: String,
}

/// A streaming response body that keeps its connection slot until dropped.
pub struct RemoteBody {
    status: u16,
    stream: BoxStream<'static, Result<Bytes, reqwest::Error>>,
    _permit: OwnedSemaphorePermit,
}

impl fmt::Debug for RemoteBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteBody")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl RemoteBody {
    /// HTTP status of the response.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// True when the server honoured a range request (`206 Partial Content`).
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.status == 206
    }

    /// Reads the next chunk of the body as delivered by the network.
    ///
    /// Returns `None` once the body is exhausted.
    pub async fn next_chunk(&mut self, url: &str) -> Option<Result<Bytes, DownloadError>> {
        self.stream
            .next()
            .await
            .map(|chunk| chunk.map_err(|e| DownloadError::network(url, e)))
    }
}

/// HTTP client for probes, page fetches and streaming downloads.
///
/// Cheap to clone: clones share the connection pool and the connection ceiling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    connections: Arc<Semaphore>,
    probe_timeout: Duration,
}

impl HttpClient {
    /// Creates a client with default timeouts and connection ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Network`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_settings(&ClientSettings::default())
    }

    /// Creates a client with explicit settings. A zero connection limit is raised to one.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Network`] if the TLS backend cannot be initialised.
    #[instrument(level = "debug")]
    pub fn with_settings(settings: &ClientSettings) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|e| DownloadError::network("<client builder>", e))?;
        Ok(Self {
            client,
            connections: Arc::new(Semaphore::new(settings.connection_limit.max(1))),
            probe_timeout: settings.probe_timeout,
        })
    }

    /// Number of connection slots currently free.
    #[must_use]
    pub fn available_connections(&self) -> usize {
        self.connections.available_permits()
    }

    async fn connection_slot(&self, url: &str) -> Result<OwnedSemaphorePermit, DownloadError> {
        Arc::clone(&self.connections)
            .acquire_owned()
            .await
            .map_err(|_| DownloadError::client_closed(url))
    }

    /// Fetches a page for link extraction, bounded by the probe timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on invalid URL, transport failure, timeout or error status.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn page(&self, url: &str) -> Result<PageBody, DownloadError> {
        let parsed = parse_url(url)?;
        let _slot = self.connection_slot(url).await?;

        let response = self
            .client
            .get(parsed)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        let response = ensure_success(url, response)?;

        let final_url = response.url().clone();
        let text = response
            .text()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        debug!(final_url = %final_url, bytes = text.len(), "fetched page");
        Ok(PageBody { final_url, text })
    }

    /// Opens a streaming GET, optionally resuming from `range_start`.
    ///
    /// No total timeout applies: large files are bounded only by the connect timeout and
    /// the caller's cancellation checks.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on invalid URL, transport failure or error status.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get(&self, url: &str, range_start: Option<u64>) -> Result<RemoteBody, DownloadError> {
        let parsed = parse_url(url)?;
        let permit = self.connection_slot(url).await?;

        let mut request = self.client.get(parsed);
        if let Some(offset) = range_start {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        let response = ensure_success(url, response)?;

        Ok(RemoteBody {
            status: response.status().as_u16(),
            stream: response.bytes_stream().boxed(),
            _permit: permit,
        })
    }

    async fn send_head(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let parsed = parse_url(url)?;
        let _slot = self.connection_slot(url).await?;
        self.client
            .head(parsed)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))
    }
}

#[async_trait]
impl HeadProbe for HttpClient {
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn head(&self, url: &str) -> Result<ResourceHead, DownloadError> {
        let response = ensure_success(url, self.send_head(url).await?)?;
        Ok(resource_head(&response))
    }

    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn head_any_status(&self, url: &str) -> Result<ResourceHead, DownloadError> {
        let response = self.send_head(url).await?;
        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "HEAD answered with error status");
        }
        Ok(resource_head(&response))
    }
}

fn resource_head(response: &reqwest::Response) -> ResourceHead {
    ResourceHead {
        status: response.status().as_u16(),
        content_type: response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        content_length: header_content_length(response),
    }
}

fn parse_url(url: &str) -> Result<Url, DownloadError> {
    Url::parse(url).map_err(|_| DownloadError::invalid_url(url))
}

fn ensure_success(url: &str, response: reqwest::Response) -> Result<reqwest::Response, DownloadError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(DownloadError::http_status(url, response.status().as_u16()))
    }
}

// Read the header directly: `Response::content_length()` reports the body size hint,
// which is 0 for HEAD responses.
fn header_content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
