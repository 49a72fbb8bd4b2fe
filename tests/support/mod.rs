//! Shared helpers for the integration tests.

#![allow(dead_code)]

pub mod socket_guard;

/// Evaluates to a running mock server, or returns `Ok(())` from the calling test when
/// loopback sockets are unavailable.
macro_rules! require_mock_server {
    () => {{
        let test = concat!(module_path!(), ":", line!());
        match $crate::support::socket_guard::mock_server_if_available(test).await {
            Some(server) => server,
            None => return Ok(()),
        }
    }};
}

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Renders a minimal directory listing page linking to `hrefs`.
pub fn listing(hrefs: &[&str]) -> String {
    let anchors: String = hrefs
        .iter()
        .map(|href| format!("<li><a href=\"{href}\">{href}</a></li>\n"))
        .collect();
    format!("<html><body><h1>Index</h1><ul>\n<li><a href=\"../\">Parent</a></li>\n{anchors}</ul></body></html>")
}

/// Serves a listing page at `route` for both HEAD (classification) and GET (links).
pub async fn mount_directory(server: &MockServer, route: &str, hrefs: &[&str]) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Type", "text/html"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(listing(hrefs), "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Serves a binary file at `route`: HEAD advertises its length, GET returns the body.
pub async fn mount_file(server: &MockServer, route: &str, body: &[u8]) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/octet-stream")
                .insert_header("Content-Length", body.len().to_string().as_str()),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/octet-stream")
                .set_body_bytes(body.to_vec()),
        )
        .mount(server)
        .await;
}

/// Deterministic test payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| u8::try_from(i % 251).unwrap_or(0)).collect()
}
