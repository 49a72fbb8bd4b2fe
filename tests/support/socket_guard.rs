//! Loopback availability for tests that start a wiremock server.
//!
//! Sandboxed runners sometimes forbid binding sockets. Those tests then skip with a note
//! on stderr, unless `BATCHDOWN_REQUIRE_SOCKET_TESTS` is set, in which case they fail.

use std::net::{Ipv4Addr, TcpListener};

use wiremock::MockServer;

/// Environment variable that turns a skipped socket test into a failure.
pub const REQUIRE_SOCKETS_ENV: &str = "BATCHDOWN_REQUIRE_SOCKET_TESTS";

fn sockets_required() -> bool {
    std::env::var(REQUIRE_SOCKETS_ENV).is_ok_and(|value| {
        let value = value.trim().to_ascii_lowercase();
        value == "1" || value == "true" || value == "yes"
    })
}

fn loopback_bindable() -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).is_ok()
}

/// Starts a mock server, or returns `None` when loopback sockets are unavailable.
///
/// # Panics
///
/// When sockets are unavailable and [`REQUIRE_SOCKETS_ENV`] is set.
pub async fn mock_server_if_available(test: &str) -> Option<MockServer> {
    if loopback_bindable() {
        return Some(MockServer::start().await);
    }
    assert!(
        !sockets_required(),
        "{test}: loopback bind failed and {REQUIRE_SOCKETS_ENV} is set"
    );
    eprintln!("{test}: loopback bind failed, skipping (set {REQUIRE_SOCKETS_ENV}=1 to fail)");
    None
}
