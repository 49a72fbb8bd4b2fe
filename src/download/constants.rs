//! Constants for the download module (timeouts, limits, defaults).

use std::time::Duration;

/// HTTP connect timeout (30 seconds). GETs have no total timeout on top of this.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Total timeout for HEAD probes and page fetches (30 seconds).
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Ceiling on simultaneous connections opened through one `HttpClient`.
pub const DEFAULT_CONNECTION_LIMIT: usize = 30;

/// Default write granularity while streaming a body to disk.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;
