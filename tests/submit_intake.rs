//! Integration tests for the submission intake pipeline.
//!
//! Each test boots the real Axum server on a random port with a stub mail
//! transport and exercises the HTTP contract with multipart requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;

use careers_intake::config::{IntakeConfig, ResponsePolicy, StagingPolicy};
use careers_intake::error::DeliveryError;
use careers_intake::http::intake_routes;
use careers_intake::mail::{ComposedMessage, MailTransport};
use careers_intake::submission::Processor;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Stub mail transport for integration tests (no real SMTP).
struct StubTransport {
    calls: AtomicUsize,
    fail: bool,
    delay: Option<Duration>,
    seen_subjects: Mutex<Vec<String>>,
}

impl StubTransport {
    fn ok() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
            delay: None,
            seen_subjects: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self { fail: true, ..Self::ok() }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::ok()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn subjects(&self) -> Vec<String> {
        self.seen_subjects.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for StubTransport {
    async fn send(&self, message: &ComposedMessage) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_subjects
            .lock()
            .unwrap()
            .push(message.subject.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(DeliveryError::NetworkFailure("connection reset".into()));
        }
        Ok(())
    }
}

fn test_config() -> IntakeConfig {
    let vars = HashMap::from([
        ("EMAIL_USER".to_string(), "hr@example.com".to_string()),
        ("EMAIL_PASS".to_string(), "app-password".to_string()),
    ]);
    IntakeConfig::from_vars(&vars).unwrap()
}

/// Start the intake server on a random port, return (base_url, processor).
async fn start_server(
    config: IntakeConfig,
    transport: Arc<StubTransport>,
) -> (String, Arc<Processor>) {
    let processor = Arc::new(Processor::new(Arc::new(config), transport));
    let app = intake_routes(Arc::clone(&processor));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://127.0.0.1:{port}"), processor)
}

fn complete_form() -> reqwest::multipart::Form {
    reqwest::multipart::Form::new()
        .text("fullName", "Jane Doe")
        .text("email", "jane@example.com")
        .text("phone", "+1 555 0100")
        .text("skills", "Rust, SQL")
}

fn pdf_part(bytes: Vec<u8>) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(bytes)
        .file_name("resume.pdf")
        .mime_str("application/pdf")
        .unwrap()
}

async fn submit(base_url: &str, form: reqwest::multipart::Form) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("{base_url}/submit-form"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    let body: Value = response.json().await.unwrap();
    (status, body)
}

fn staged_files(dir: &std::path::Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

// ── Probes ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn root_and_health_respond() {
    let (base_url, _processor) = start_server(test_config(), Arc::new(StubTransport::ok())).await;

    let root = reqwest::get(&base_url).await.unwrap();
    assert_eq!(root.status().as_u16(), 200);
    assert_eq!(root.text().await.unwrap(), "Email API is running...");

    let health: Value = reqwest::get(format!("{base_url}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
}

// ── Submission scenarios ────────────────────────────────────────────────

#[tokio::test]
async fn complete_submission_without_attachment_is_sent() {
    let transport = Arc::new(StubTransport::ok());
    let (base_url, _processor) = start_server(test_config(), Arc::clone(&transport)).await;

    let (status, body) = submit(&base_url, complete_form()).await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Form submitted & email sent successfully!");
    assert_eq!(transport.calls(), 1);
    assert_eq!(transport.subjects(), vec!["New Candidate: Jane Doe"]);
}

#[tokio::test]
async fn missing_required_field_never_reaches_transport() {
    let transport = Arc::new(StubTransport::ok());
    let (base_url, _processor) = start_server(test_config(), Arc::clone(&transport)).await;

    let form = reqwest::multipart::Form::new()
        .text("fullName", "Jane Doe")
        .text("email", "jane@example.com");
    let (status, body) = submit(&base_url, form).await;

    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("Missing required field: phone")
    );
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn disallowed_media_type_rejected_without_dispatch() {
    let transport = Arc::new(StubTransport::ok());
    let (base_url, _processor) = start_server(test_config(), Arc::clone(&transport)).await;

    let png = reqwest::multipart::Part::bytes(vec![0u8; 64])
        .file_name("photo.png")
        .mime_str("image/png")
        .unwrap();
    let (status, body) = submit(&base_url, complete_form().part("cv", png)).await;

    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("Unsupported"));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn oversize_attachment_rejected_without_dispatch() {
    let transport = Arc::new(StubTransport::ok());
    let (base_url, _processor) = start_server(test_config(), Arc::clone(&transport)).await;

    // 6 MiB against the default 5 MiB ceiling.
    let (status, body) = submit(
        &base_url,
        complete_form().part("cv", pdf_part(vec![0u8; 6 * 1024 * 1024])),
    )
    .await;

    assert_eq!(status, 400);
    assert!(body["message"].as_str().unwrap().contains("too large"));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn valid_attachment_is_delivered_and_staged_copy_removed() {
    let staging = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.staging = StagingPolicy::Disk {
        dir: staging.path().to_path_buf(),
    };

    let transport = Arc::new(StubTransport::ok());
    let (base_url, _processor) = start_server(config, Arc::clone(&transport)).await;

    let (status, body) = submit(
        &base_url,
        complete_form().part("cv", pdf_part(b"%PDF-1.4 fake".to_vec())),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(transport.calls(), 1);
    assert_eq!(staged_files(staging.path()), 0);
}

#[tokio::test]
async fn delivery_failure_yields_502_and_still_cleans_up() {
    let staging = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.staging = StagingPolicy::Disk {
        dir: staging.path().to_path_buf(),
    };

    let transport = Arc::new(StubTransport::failing());
    let (base_url, _processor) = start_server(config, Arc::clone(&transport)).await;

    let (status, body) = timeout(
        TEST_TIMEOUT,
        submit(
            &base_url,
            complete_form().part("cv", pdf_part(b"%PDF-1.4 fake".to_vec())),
        ),
    )
    .await
    .unwrap();

    assert_eq!(status, 502);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("Network failure"));
    assert_eq!(transport.calls(), 1);
    assert_eq!(staged_files(staging.path()), 0);
}

#[tokio::test]
async fn deferred_policy_responds_before_delivery_settles() {
    let staging = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.response_policy = ResponsePolicy::Deferred;
    config.staging = StagingPolicy::Disk {
        dir: staging.path().to_path_buf(),
    };

    let transport = Arc::new(StubTransport::slow(Duration::from_secs(3)));
    let (base_url, processor) = start_server(config, Arc::clone(&transport)).await;

    let started = std::time::Instant::now();
    let (status, body) = submit(
        &base_url,
        complete_form().part("cv", pdf_part(b"%PDF-1.4 fake".to_vec())),
    )
    .await;
    let elapsed = started.elapsed();

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("delivered shortly")
    );
    // The response must not wait out the 3s transport exchange.
    assert!(elapsed < Duration::from_millis(500), "took {elapsed:?}");

    // Dispatch is still in flight; the staged file survives until the
    // transport has read it.
    assert_eq!(processor.tracker().in_flight(), 1);

    timeout(TEST_TIMEOUT, processor.tracker().drain())
        .await
        .unwrap();
    assert_eq!(transport.calls(), 1);
    assert_eq!(staged_files(staging.path()), 0);
}

#[tokio::test]
async fn deferred_delivery_failure_is_invisible_to_the_caller() {
    let mut config = test_config();
    config.response_policy = ResponsePolicy::Deferred;

    let transport = Arc::new(StubTransport::failing());
    let (base_url, processor) = start_server(config, Arc::clone(&transport)).await;

    let (status, body) = submit(&base_url, complete_form()).await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);

    timeout(TEST_TIMEOUT, processor.tracker().drain())
        .await
        .unwrap();
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn concurrent_submissions_with_same_file_name_do_not_interfere() {
    let staging = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.staging = StagingPolicy::Disk {
        dir: staging.path().to_path_buf(),
    };

    let transport = Arc::new(StubTransport::slow(Duration::from_millis(200)));
    let (base_url, _processor) = start_server(config, Arc::clone(&transport)).await;

    let first = submit(
        &base_url,
        complete_form().part("cv", pdf_part(b"candidate one".to_vec())),
    );
    let second = submit(
        &base_url,
        complete_form().part("cv", pdf_part(b"candidate two".to_vec())),
    );
    let ((status_a, _), (status_b, _)) =
        timeout(TEST_TIMEOUT, async { tokio::join!(first, second) })
            .await
            .unwrap();

    assert_eq!(status_a, 200);
    assert_eq!(status_b, 200);
    assert_eq!(transport.calls(), 2);
    assert_eq!(staged_files(staging.path()), 0);
}
