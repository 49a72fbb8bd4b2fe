//! Integration tests for single-file resumable transfers against a mock server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use batchdown_core::download::{
    FileTransfer, HttpClient, NoopObserver, ResumableTransfer, RetryPolicy, TransferJob,
    TransferObserver, TransferOutcome,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

#[macro_use]
mod support;
use support::payload;

fn transfer(max_attempts: u32, chunk_size: usize) -> Result<ResumableTransfer, Box<dyn std::error::Error>> {
    Ok(ResumableTransfer::new(
        HttpClient::new()?,
        RetryPolicy::new(max_attempts, Duration::from_millis(5)),
        chunk_size,
    ))
}

async fn mount_head(server: &MockServer, route: &str, length: usize) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Accept-Ranges", "bytes")
                .insert_header("Content-Length", length.to_string().as_str()),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_resume_requests_remaining_range() -> Result<(), Box<dyn std::error::Error>> {
    let mock_server = require_mock_server!();
    let dir = TempDir::new()?;
    let local = dir.path().join("resume.bin");
    std::fs::write(&local, b"AAA")?;

    mount_head(&mock_server, "/resume.bin", 6).await;
    // GET with Range -> 206 with the remaining bytes
    Mock::given(method("GET"))
        .and(path("/resume.bin"))
        .and(header("Range", "bytes=3-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(b"BBB"))
        .with_priority(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    // GET without Range -> full body (must not be used)
    Mock::given(method("GET"))
        .and(path("/resume.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"AAABBB"))
        .with_priority(u8::MAX)
        .expect(0)
        .mount(&mock_server)
        .await;

    let job = TransferJob::new(format!("{}/resume.bin", mock_server.uri()), &local, 6);
    let outcome = transfer(3, 8192)?
        .transfer(&job, &CancellationToken::new(), &NoopObserver)
        .await;

    assert_eq!(
        outcome,
        TransferOutcome::Completed {
            bytes: 6,
            attempts: 1,
            resumed_from: 3
        }
    );
    assert_eq!(std::fs::read(&local)?, b"AAABBB");
    Ok(())
}

#[tokio::test]
async fn test_resume_without_remote_size_still_sends_range() -> Result<(), Box<dyn std::error::Error>> {
    let mock_server = require_mock_server!();
    let dir = TempDir::new()?;
    let local = dir.path().join("unsized.bin");
    std::fs::write(&local, b"AAA")?;

    // HEAD without Content-Length: remote size unknown
    Mock::given(method("HEAD"))
        .and(path("/unsized.bin"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/unsized.bin"))
        .and(header("Range", "bytes=3-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(b"BBB"))
        .with_priority(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/unsized.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"AAABBB"))
        .with_priority(u8::MAX)
        .expect(0)
        .mount(&mock_server)
        .await;

    let job = TransferJob::new(format!("{}/unsized.bin", mock_server.uri()), &local, 0);
    let outcome = transfer(3, 8192)?
        .transfer(&job, &CancellationToken::new(), &NoopObserver)
        .await;

    assert_eq!(
        outcome,
        TransferOutcome::Completed {
            bytes: 6,
            attempts: 1,
            resumed_from: 3
        }
    );
    assert_eq!(std::fs::read(&local)?, b"AAABBB");
    Ok(())
}

#[tokio::test]
async fn test_unsatisfiable_range_without_remote_size_is_complete()
-> Result<(), Box<dyn std::error::Error>> {
    let mock_server = require_mock_server!();
    let dir = TempDir::new()?;
    let local = dir.path().join("whole.bin");
    std::fs::write(&local, b"AAABBB")?;

    Mock::given(method("HEAD"))
        .and(path("/whole.bin"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/whole.bin"))
        .and(header("Range", "bytes=6-"))
        .respond_with(ResponseTemplate::new(416))
        .expect(1)
        .mount(&mock_server)
        .await;

    let job = TransferJob::new(format!("{}/whole.bin", mock_server.uri()), &local, 0);
    let outcome = transfer(3, 8192)?
        .transfer(&job, &CancellationToken::new(), &NoopObserver)
        .await;

    assert_eq!(outcome, TransferOutcome::AlreadyComplete { bytes: 6 });
    assert_eq!(std::fs::read(&local)?, b"AAABBB");
    Ok(())
}

#[tokio::test]
async fn test_resume_ignored_by_server_rewrites_file() -> Result<(), Box<dyn std::error::Error>> {
    let mock_server = require_mock_server!();
    let dir = TempDir::new()?;
    let local = dir.path().join("norange.bin");
    std::fs::write(&local, b"stale")?;

    mount_head(&mock_server, "/norange.bin", 12).await;
    Mock::given(method("GET"))
        .and(path("/norange.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"full content"))
        .mount(&mock_server)
        .await;

    let job = TransferJob::new(format!("{}/norange.bin", mock_server.uri()), &local, 0);
    let outcome = transfer(3, 8192)?
        .transfer(&job, &CancellationToken::new(), &NoopObserver)
        .await;

    assert_eq!(
        outcome,
        TransferOutcome::Completed {
            bytes: 12,
            attempts: 1,
            resumed_from: 0
        }
    );
    assert_eq!(std::fs::read(&local)?, b"full content");
    Ok(())
}

#[tokio::test]
async fn test_complete_local_file_issues_no_get() -> Result<(), Box<dyn std::error::Error>> {
    let mock_server = require_mock_server!();
    let dir = TempDir::new()?;
    let local = dir.path().join("done.bin");
    std::fs::write(&local, b"hello")?;

    mount_head(&mock_server, "/done.bin", 5).await;
    Mock::given(method("GET"))
        .and(path("/done.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"other"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let job = TransferJob::new(format!("{}/done.bin", mock_server.uri()), &local, 5);
    let outcome = transfer(3, 8192)?
        .transfer(&job, &CancellationToken::new(), &NoopObserver)
        .await;

    assert_eq!(outcome, TransferOutcome::AlreadyComplete { bytes: 5 });
    assert_eq!(std::fs::read(&local)?, b"hello");
    Ok(())
}

#[tokio::test]
async fn test_local_file_larger_than_remote_restarts() -> Result<(), Box<dyn std::error::Error>> {
    let mock_server = require_mock_server!();
    let dir = TempDir::new()?;
    let local = dir.path().join("shrunk.bin");
    std::fs::write(&local, b"this file is far too long")?;

    mount_head(&mock_server, "/shrunk.bin", 6).await;
    Mock::given(method("GET"))
        .and(path("/shrunk.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"AAABBB"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let job = TransferJob::new(format!("{}/shrunk.bin", mock_server.uri()), &local, 6);
    let outcome = transfer(3, 8192)?
        .transfer(&job, &CancellationToken::new(), &NoopObserver)
        .await;

    assert!(outcome.is_success(), "got {outcome:?}");
    assert_eq!(std::fs::read(&local)?, b"AAABBB");
    let requests = mock_server.received_requests().await.unwrap_or_default();
    assert!(
        requests
            .iter()
            .filter(|r| r.method.as_str() == "GET")
            .all(|r| !r.headers.contains_key("range")),
        "restart must not send a Range header"
    );
    Ok(())
}

#[tokio::test]
async fn test_exhausted_retries_remove_partial_file() -> Result<(), Box<dyn std::error::Error>> {
    let mock_server = require_mock_server!();
    let dir = TempDir::new()?;
    let local = dir.path().join("broken.bin");
    std::fs::write(&local, b"abc")?;

    mount_head(&mock_server, "/broken.bin", 10).await;
    Mock::given(method("GET"))
        .and(path("/broken.bin"))
        .respond_with(ResponseTemplate::new(503))
        .expect(10)
        .mount(&mock_server)
        .await;

    let job = TransferJob::new(format!("{}/broken.bin", mock_server.uri()), &local, 10);
    let outcome = transfer(10, 8192)?
        .transfer(&job, &CancellationToken::new(), &NoopObserver)
        .await;

    match outcome {
        TransferOutcome::Failed { attempts, reason } => {
            assert_eq!(attempts, 10);
            assert!(reason.contains("503"), "reason: {reason}");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(!local.exists(), "partial file must be deleted");
    Ok(())
}

/// Responder that fails the first `fail_count` requests with 500, then returns the body.
struct FlakyResponder {
    request_count: Arc<AtomicUsize>,
    fail_count: usize,
    body: Vec<u8>,
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let n = self.request_count.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_count {
            ResponseTemplate::new(500)
        } else {
            ResponseTemplate::new(200).set_body_bytes(self.body.clone())
        }
    }
}

#[tokio::test]
async fn test_transient_failures_are_retried() -> Result<(), Box<dyn std::error::Error>> {
    let mock_server = require_mock_server!();
    let dir = TempDir::new()?;
    let local = dir.path().join("flaky.bin");
    let body = payload(4096);

    mount_head(&mock_server, "/flaky.bin", body.len()).await;
    let request_count = Arc::new(AtomicUsize::new(0));
    Mock::given(method("GET"))
        .and(path("/flaky.bin"))
        .respond_with(FlakyResponder {
            request_count: Arc::clone(&request_count),
            fail_count: 2,
            body: body.clone(),
        })
        .mount(&mock_server)
        .await;

    let job = TransferJob::new(format!("{}/flaky.bin", mock_server.uri()), &local, 0);
    let outcome = transfer(10, 1000)?
        .transfer(&job, &CancellationToken::new(), &NoopObserver)
        .await;

    assert_eq!(
        outcome,
        TransferOutcome::Completed {
            bytes: 4096,
            attempts: 3,
            resumed_from: 0
        }
    );
    assert_eq!(request_count.load(Ordering::SeqCst), 3);
    assert_eq!(std::fs::read(&local)?, body);
    Ok(())
}

#[tokio::test]
async fn test_short_body_counts_as_failure() -> Result<(), Box<dyn std::error::Error>> {
    let mock_server = require_mock_server!();
    let dir = TempDir::new()?;
    let local = dir.path().join("short.bin");

    mount_head(&mock_server, "/short.bin", 10).await;
    Mock::given(method("GET"))
        .and(path("/short.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"four"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let job = TransferJob::new(format!("{}/short.bin", mock_server.uri()), &local, 10);
    let outcome = transfer(2, 8192)?
        .transfer(&job, &CancellationToken::new(), &NoopObserver)
        .await;

    match outcome {
        TransferOutcome::Failed { attempts, reason } => {
            assert_eq!(attempts, 2);
            assert!(reason.contains("incomplete"), "reason: {reason}");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(!local.exists());
    Ok(())
}

#[tokio::test]
async fn test_probe_failure_leaves_file_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let mock_server = require_mock_server!();
    let dir = TempDir::new()?;
    let local = dir.path().join("gone.bin");
    std::fs::write(&local, b"partial")?;

    Mock::given(method("HEAD"))
        .and(path("/gone.bin"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone.bin"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let job = TransferJob::new(format!("{}/gone.bin", mock_server.uri()), &local, 0);
    let outcome = transfer(3, 8192)?
        .transfer(&job, &CancellationToken::new(), &NoopObserver)
        .await;

    assert!(matches!(outcome, TransferOutcome::Failed { attempts: 0, .. }));
    assert_eq!(std::fs::read(&local)?, b"partial");
    Ok(())
}

/// Cancels the transfer as soon as the first bytes reach disk.
struct CancelOnFirstBytes {
    token: CancellationToken,
}

impl TransferObserver for CancelOnFirstBytes {
    fn on_progress(&self, _url: &str, bytes_on_disk: u64, _total: Option<u64>) {
        if bytes_on_disk > 0 {
            self.token.cancel();
        }
    }
}

#[tokio::test]
async fn test_cancel_stops_at_next_chunk_boundary() -> Result<(), Box<dyn std::error::Error>> {
    let mock_server = require_mock_server!();
    let dir = TempDir::new()?;
    let local = dir.path().join("big.bin");
    let body = payload(64 * 1024);

    mount_head(&mock_server, "/big.bin", body.len()).await;
    Mock::given(method("GET"))
        .and(path("/big.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&mock_server)
        .await;

    let token = CancellationToken::new();
    let observer = CancelOnFirstBytes {
        token: token.clone(),
    };
    let job = TransferJob::new(format!("{}/big.bin", mock_server.uri()), &local, 0);
    let outcome = transfer(3, 1024)?.transfer(&job, &token, &observer).await;

    assert_eq!(outcome, TransferOutcome::Cancelled { bytes: 1024 });
    assert_eq!(std::fs::metadata(&local)?.len(), 1024, "partial file is kept");
    assert_eq!(std::fs::read(&local)?, body[..1024]);
    Ok(())
}

#[tokio::test]
async fn test_progress_reports_bytes_on_disk() -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Default)]
    struct Recorder(std::sync::Mutex<Vec<(u64, Option<u64>)>>);
    impl TransferObserver for Recorder {
        fn on_progress(&self, _url: &str, bytes_on_disk: u64, total: Option<u64>) {
            if let Ok(mut seen) = self.0.lock() {
                seen.push((bytes_on_disk, total));
            }
        }
    }

    let mock_server = require_mock_server!();
    let dir = TempDir::new()?;
    let local = dir.path().join("nested/dir/p.bin");
    let body = payload(2500);
    mount_head(&mock_server, "/p.bin", body.len()).await;
    Mock::given(method("GET"))
        .and(path("/p.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&mock_server)
        .await;

    let recorder = Recorder::default();
    let job = TransferJob::new(format!("{}/p.bin", mock_server.uri()), &local, 0);
    let outcome = transfer(1, 1000)?
        .transfer(&job, &CancellationToken::new(), &recorder)
        .await;

    assert!(outcome.is_success());
    let seen = recorder.0.lock().map(|s| s.clone()).unwrap_or_default();
    assert_eq!(seen.first(), Some(&(0, Some(2500))));
    assert_eq!(seen.last(), Some(&(2500, Some(2500))));
    assert!(seen.windows(2).all(|w| w[1].0 >= w[0].0));
    assert!(seen.windows(2).all(|w| w[1].0 - w[0].0 <= 1000));
    Ok(())
}
