//! Report submission and polling tests.
//!
//! Uses wiremock to mock the report endpoints and count status polls.

use atomx::{AtomxError, ReportRequest, ReportStatus, Session};
use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn logged_in(mock_server: &MockServer) -> Session {
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "auth_tkt": "tkt-1"})),
        )
        .mount(mock_server)
        .await;

    Session::connect("daniel@atomx.com", "password", &mock_server.uri())
        .await
        .unwrap()
}

fn request() -> ReportRequest {
    ReportRequest::new("advertiser", Utc.with_ymd_and_hms(2015, 6, 18, 9, 20, 0).unwrap())
        .to(Utc.with_ymd_and_hms(2015, 6, 19, 17, 59, 0).unwrap())
        .groups(["hour"])
        .sums(["impressions", "clicks"])
}

async fn mount_submission(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/report"))
        .and(body_partial_json(json!({
            "scope": "advertiser",
            "from": "2015-06-18 09:00:00Z",
            "to": "2015-06-19 17:00:00Z",
            "groups": ["hour"],
            "sums": ["impressions", "clicks"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "report": {"id": "abc123", "status": "PENDING", "lines": 0},
            "query": {
                "scope": "advertiser",
                "groups": ["hour"],
                "sums": ["impressions", "clicks"]
            }
        })))
        .expect(1)
        .mount(mock_server)
        .await;
}

async fn mount_status(mock_server: &MockServer, status: serde_json::Value, expected_polls: u64) {
    Mock::given(method("GET"))
        .and(path("/report/abc123"))
        .and(query_param("status", "true"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "report": status})),
        )
        .expect(expected_polls)
        .mount(mock_server)
        .await;
}

async fn mount_content(mock_server: &MockServer, expected_fetches: u64) {
    Mock::given(method("GET"))
        .and(path("/report/abc123"))
        .and(query_param_is_missing("status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("00\t120\t4\n01\t98\t2\n"),
        )
        .expect(expected_fetches)
        .mount(mock_server)
        .await;
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_submit_truncates_times_to_the_hour() {
    let mock_server = MockServer::start().await;
    let session = logged_in(&mock_server).await;
    mount_submission(&mock_server).await;

    let report = session.report(request()).await.unwrap();

    assert_eq!(report.id().as_deref(), Some("abc123"));
    assert_eq!(report.status(), ReportStatus::Pending);
    assert_eq!(report.query().columns(), vec!["hour", "impressions", "clicks"]);
}

#[tokio::test]
async fn test_submit_without_report_object_is_unexpected() {
    let mock_server = MockServer::start().await;
    let session = logged_in(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&mock_server)
        .await;

    let err = session.report(request()).await.unwrap_err();

    assert!(matches!(err, AtomxError::UnexpectedResponse(_)));
}

// =============================================================================
// Polling
// =============================================================================

#[tokio::test]
async fn test_terminal_status_is_polled_once() {
    let mock_server = MockServer::start().await;
    let session = logged_in(&mock_server).await;
    mount_submission(&mock_server).await;
    mount_status(
        &mock_server,
        json!({"id": "abc123", "status": "SUCCESS", "lines": 2, "duration": 1.5}),
        1,
    )
    .await;

    let mut report = session.report(request()).await.unwrap();

    assert!(report.is_ready().await.unwrap());
    assert!(report.is_ready().await.unwrap());
    assert_eq!(report.lines(), Some(2));
    assert_eq!(report.duration(), Some(1.5));
}

#[tokio::test]
async fn test_boolean_ready_flag_is_understood() {
    let mock_server = MockServer::start().await;
    let session = logged_in(&mock_server).await;
    mount_submission(&mock_server).await;
    mount_status(&mock_server, json!({"id": "abc123", "is_ready": true, "lines": 2}), 1).await;

    let mut report = session.report(request()).await.unwrap();

    assert_eq!(report.poll().await.unwrap(), ReportStatus::Success);
}

#[tokio::test]
async fn test_content_before_ready_is_not_fetched() {
    let mock_server = MockServer::start().await;
    let session = logged_in(&mock_server).await;
    mount_submission(&mock_server).await;
    mount_status(&mock_server, json!({"id": "abc123", "status": "PENDING"}), 2).await;
    mount_content(&mock_server, 0).await;

    let mut report = session.report(request()).await.unwrap();

    assert!(!report.is_ready().await.unwrap());
    let err = report.content().await.unwrap_err();

    assert!(matches!(err, AtomxError::ReportNotReady { ref id } if id == "abc123"));
}

#[tokio::test]
async fn test_failed_report_is_report_failed() {
    let mock_server = MockServer::start().await;
    let session = logged_in(&mock_server).await;
    mount_submission(&mock_server).await;
    mount_status(
        &mock_server,
        json!({"id": "abc123", "status": "ERROR", "error": "Query timed out"}),
        1,
    )
    .await;
    mount_content(&mock_server, 0).await;

    let mut report = session.report(request()).await.unwrap();
    let err = report.content().await.unwrap_err();

    match err {
        AtomxError::ReportFailed { id, message } => {
            assert_eq!(id, "abc123");
            assert_eq!(message, "Query timed out");
        }
        other => panic!("Expected ReportFailed, got {other:?}"),
    }
}

// =============================================================================
// Content
// =============================================================================

#[tokio::test]
async fn test_csv_splits_rows_and_columns() {
    let mock_server = MockServer::start().await;
    let session = logged_in(&mock_server).await;
    mount_submission(&mock_server).await;
    mount_status(&mock_server, json!({"id": "abc123", "status": "SUCCESS", "lines": 2}), 1).await;
    mount_content(&mock_server, 1).await;

    let mut report = session.report(request()).await.unwrap();
    let rows = report.csv().await.unwrap();

    assert_eq!(
        rows,
        vec![
            vec!["00".to_string(), "120".to_string(), "4".to_string()],
            vec!["01".to_string(), "98".to_string(), "2".to_string()],
        ]
    );
}

#[tokio::test]
async fn test_table_labels_columns() {
    let mock_server = MockServer::start().await;
    let session = logged_in(&mock_server).await;
    mount_submission(&mock_server).await;
    mount_status(&mock_server, json!({"id": "abc123", "status": "SUCCESS", "lines": 2}), 1).await;
    mount_content(&mock_server, 1).await;

    let mut report = session.report(request()).await.unwrap();
    let table = report.table().await.unwrap();

    assert_eq!(table.columns, vec!["hour", "impressions", "clicks"]);
    assert_eq!(table.column("clicks"), Some(vec!["4", "2"]));
}

#[tokio::test]
async fn test_paginated_content_passes_params() {
    let mock_server = MockServer::start().await;
    let session = logged_in(&mock_server).await;
    mount_submission(&mock_server).await;
    mount_status(&mock_server, json!({"id": "abc123", "status": "SUCCESS", "lines": 2}), 1).await;

    Mock::given(method("GET"))
        .and(path("/report/abc123"))
        .and(query_param("limit", "1"))
        .and(query_param("sort", "impressions.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("00\t120\t4\n"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut report = session.report(request()).await.unwrap();
    let content = report
        .get(
            &atomx::PaginationParams::default()
                .limit(1)
                .sort("impressions.desc"),
        )
        .await
        .unwrap();

    assert_eq!(content, "00\t120\t4\n");
}
