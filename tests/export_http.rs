//! Export over HTTP against a mock platform

mod common;

use std::io::{Cursor, Read};
use std::time::Duration;

use attachment_tree::types::ExportContext;
use attachment_tree::{Config, EditorSession, ExportPipeline, FailureReason};
use common::form_with_detail_table;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.service.resolve_url = format!("{}/api/attachments/urls", server.uri());
    config.service.request_timeout = Duration::from_secs(5);
    config.retry.max_attempts = 1;
    config.retry.initial_delay = Duration::from_millis(10);
    config.retry.jitter = false;
    config.export.resolve_batch_size = 4;
    config
}

fn context() -> ExportContext {
    ExportContext {
        org_id: "org-42".to_string(),
        bus_type_code: Some("PO".to_string()),
        auth_token: Some("Bearer t0k3n".to_string()),
    }
}

fn read_entry(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();
    out
}

#[tokio::test]
async fn exports_form_through_http_services() {
    let server = MockServer::start().await;

    // every id except row3-a gets a relative download URL
    Mock::given(method("POST"))
        .and(path("/api/attachments/urls"))
        .and(header("Authorization", "Bearer t0k3n"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "data": {
                "main-1": "/files/main-1",
                "1002": "/files/1002",
                "main-3": "/files/main-3",
                "grp-1": "/files/grp-1",
                "row1-a": "/files/row1-a",
                "row1-b": "/files/broken",
                "row3-a": null
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/broken"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/files/(main-1|1002|main-3|grp-1|row1-a)$"))
        .and(header("Authorization", "Bearer t0k3n"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"file-body".to_vec()))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let session = EditorSession::open(form_with_detail_table(), &config).unwrap();
    let pipeline = ExportPipeline::with_http(&config, context(), session.records()).unwrap();

    let outcome = pipeline
        .export(&session.confirm(), CancellationToken::new())
        .await
        .unwrap();

    let report = &outcome.report;
    assert_eq!(report.total_files, 7);
    assert_eq!(report.succeeded.len(), 5);
    assert_eq!(report.failures.len(), 2);

    let back = report
        .failures
        .iter()
        .find(|f| f.path.ends_with("back.jpg"))
        .unwrap();
    assert!(matches!(back.reason, FailureReason::FetchFailed(_)));
    let receipt = report
        .failures
        .iter()
        .find(|f| f.path.ends_with("receipt.png"))
        .unwrap();
    assert_eq!(receipt.reason, FailureReason::UrlUnavailable);

    assert_eq!(
        read_entry(&outcome.archive, "Attachments/MainForm/Invoice/invoice (1).pdf"),
        b"file-body"
    );
    assert!(read_entry(&outcome.archive, "Attachments/DetailTable/Row 1/Photo/back.jpg").is_empty());
}

#[tokio::test]
async fn resolution_outage_still_yields_placeholder_archive() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/attachments/urls"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let session = EditorSession::open(form_with_detail_table(), &config).unwrap();
    let pipeline = ExportPipeline::with_http(&config, context(), session.records()).unwrap();

    let outcome = pipeline
        .export(&session.confirm(), CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.report.succeeded.is_empty());
    assert_eq!(outcome.report.failures.len(), 7);
    assert!(
        outcome
            .report
            .failures
            .iter()
            .all(|f| matches!(f.reason, FailureReason::UrlResolution(_)))
    );
    assert!(read_entry(&outcome.archive, "Attachments/Approval/Memo/memo.docx").is_empty());
}

#[tokio::test]
async fn transient_fetch_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/attachments/urls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "data": { "only-1": "/files/flaky" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/flaky"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"eventually".to_vec()))
        .mount(&server)
        .await;

    let sources = attachment_tree::types::AttachmentSources {
        main: Some(attachment_tree::types::AttachmentResponse::ok(vec![
            common::record("only-1", "flaky.bin", "Data"),
        ])),
        ..Default::default()
    };
    let config = config_for(&server);
    let session = EditorSession::open(sources, &config).unwrap();
    let pipeline = ExportPipeline::with_http(&config, context(), session.records()).unwrap();

    let outcome = pipeline
        .export(&session.confirm(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.report.succeeded, vec!["Attachments/MainForm/Data/flaky.bin"]);
    assert_eq!(
        read_entry(&outcome.archive, "Attachments/MainForm/Data/flaky.bin"),
        b"eventually"
    );
}
