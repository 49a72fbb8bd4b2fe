//! Session-wide stop signal and the registry of in-flight transfers.
//!
//! A [`Cancellation`] is created once per crawl session and cloned into everything
//! that must observe a stop request. Each admitted transfer registers itself and
//! receives a child token; [`Cancellation::stop`] cancels the session token, cancels
//! every registered unit individually and empties the registry.
//!
//! Cancellation is cooperative: units observe their token at checkpoints (before each
//! chunk write, between attempts, around network awaits). Nothing is forcibly aborted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug)]
struct InFlightUnit {
    url: String,
    token: CancellationToken,
}

/// Stop signal plus in-flight registry for one session.
///
/// Clones share state; hand a clone to a signal handler to stop the session from outside.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    token: CancellationToken,
    in_flight: Arc<DashMap<u64, InFlightUnit>>,
    next_id: Arc<AtomicU64>,
}

impl Cancellation {
    /// Creates an unsignalled cancellation with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals stop. Idempotent.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            info!(in_flight = self.in_flight.len(), "stop requested");
        }
        self.token.cancel();
        for unit in self.in_flight.iter() {
            debug!(url = %unit.url, "cancelling in-flight transfer");
            unit.token.cancel();
        }
        self.in_flight.clear();
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when stop is signalled.
    pub async fn stopped(&self) {
        self.token.cancelled().await;
    }

    /// The session token. Cancelled by [`stop`](Self::stop).
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Registers an in-flight unit for `url`. The unit leaves the registry when the
    /// returned guard is dropped.
    #[must_use = "the unit is deregistered as soon as the guard is dropped"]
    pub fn register(&self, url: &str) -> InFlightGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = self.token.child_token();
        self.in_flight.insert(
            id,
            InFlightUnit {
                url: url.to_string(),
                token: token.clone(),
            },
        );
        // A stop that raced the insert has already cleared the map; do not leave a stale entry.
        if self.token.is_cancelled() {
            self.in_flight.remove(&id);
        }
        InFlightGuard {
            id,
            token,
            registry: Arc::clone(&self.in_flight),
        }
    }

    /// Number of registered in-flight units.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// URLs of the registered in-flight units, in no particular order.
    #[must_use]
    pub fn in_flight_urls(&self) -> Vec<String> {
        self.in_flight.iter().map(|unit| unit.url.clone()).collect()
    }
}

/// Registration of one in-flight unit; deregisters on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    id: u64,
    token: CancellationToken,
    registry: Arc<DashMap<u64, InFlightUnit>>,
}

impl InFlightGuard {
    /// The unit's own token. Cancelled by a session stop.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}
