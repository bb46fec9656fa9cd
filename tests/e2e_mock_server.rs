//! E2E tests using the mock Atomx server.
//!
//! These tests exercise full workflows against the mock server,
//! testing realistic scenarios rather than individual endpoints.

#![cfg(feature = "test-server")]

use atomx::mock_server::{Fixtures, MockServer, MockState, DEFAULT_EMAIL, DEFAULT_PASSWORD};
use atomx::{
    AtomxError, Field, Model, ModelKind, PaginationParams, ReportRequest, ReportStatus, Session,
};
use chrono::{Duration, Utc};

async fn connect(server: &MockServer) -> Session {
    Session::connect(DEFAULT_EMAIL, DEFAULT_PASSWORD, server.url())
        .await
        .expect("Failed to log in")
}

// =============================================================================
// Server Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_server_starts_on_random_port() {
    let server1 = MockServer::start().await;
    let server2 = MockServer::start().await;

    // Both servers should have different URLs
    assert_ne!(server1.url(), server2.url());

    server1.shutdown().await;
    server2.shutdown().await;
}

#[tokio::test]
async fn test_server_shutdown_is_clean() {
    let server = MockServer::start().await;
    let url = server.url().to_string();

    server.shutdown().await;

    // After shutdown, server should not respond
    let client = reqwest::Client::new();
    let result = client.get(format!("{}/health", url)).send().await;

    assert!(result.is_err());
}

// =============================================================================
// Session Workflow Tests
// =============================================================================

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let server = MockServer::start().await;

    let result = Session::connect(DEFAULT_EMAIL, "not-the-password", server.url()).await;

    assert!(matches!(result, Err(AtomxError::InvalidCredentials)));

    server.shutdown().await;
}

#[tokio::test]
async fn test_logout_revokes_access() {
    let server = MockServer::start().await;
    let session = connect(&server).await;

    assert!(session.get("creative/1").await.is_ok());

    session.logout().await;
    let result = session.get("creative/1").await;

    assert!(matches!(
        result,
        Err(AtomxError::ApiError {
            status_code: Some(401),
            ..
        })
    ));

    server.shutdown().await;
}

#[tokio::test]
async fn test_search_finds_records_by_title() {
    let server = MockServer::start().await;
    let session = connect(&server).await;

    let results = session.search("creative 7").await.unwrap();

    let creatives = results
        .get("creatives")
        .cloned()
        .and_then(|r| r.into_records())
        .expect("Expected creatives in search results");
    assert_eq!(creatives.len(), 1);
    assert_eq!(creatives[0].id().as_deref(), Some("7"));

    server.shutdown().await;
}

// =============================================================================
// Record Workflow Tests
// =============================================================================

#[tokio::test]
async fn test_list_with_limit() {
    let server = MockServer::start().await;
    let session = connect(&server).await;

    let creatives = session
        .get_with_query("creatives", &[("limit", "5")])
        .await
        .unwrap()
        .into_records()
        .unwrap();

    assert_eq!(creatives.len(), 5);
    assert!(creatives.iter().all(|c| c.kind() == ModelKind::Creative));

    server.shutdown().await;
}

#[tokio::test]
async fn test_update_persists_only_changed_field() {
    let server = MockServer::start().await;
    let session = connect(&server).await;

    // Step 1: Fetch a creative through an id filter
    let mut creative = session
        .get_with_query("creatives", &[("id", "5")])
        .await
        .unwrap()
        .into_record()
        .expect("Expected a single creative");

    // Step 2: Change the title and save
    creative.set_field("title", "Updated title");
    creative.save(None).await.expect("Failed to save creative");
    assert!(!creative.is_dirty());

    // Step 3: Only the title reached the server
    {
        let state = server.state();
        let state = state.read().await;
        assert_eq!(state.updates.len(), 1);
        assert_eq!(
            state.updates[0].body.keys().collect::<Vec<_>>(),
            vec!["title"]
        );
    }

    // Step 4: Fresh copy reflects the change
    let fresh = session.get("creative/5").await.unwrap().into_record().unwrap();
    assert_eq!(
        fresh.field("title").and_then(Field::as_str),
        Some("Updated title")
    );
    assert_eq!(fresh, creative);

    // Step 5: The change shows up in the history
    let history = creative
        .history(None, &PaginationParams::history())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["changes"]["title"], "Updated title");

    server.shutdown().await;
}

#[tokio::test]
async fn test_relations_expand_lazily() {
    let server = MockServer::start().await;
    let session = connect(&server).await;

    let mut creative = session.get("creative/2").await.unwrap().into_record().unwrap();

    let advertiser = creative
        .get_field("advertiser")
        .await
        .unwrap()
        .and_then(Field::as_record)
        .cloned()
        .expect("Expected an expanded advertiser");
    assert_eq!(advertiser.kind(), ModelKind::Advertiser);
    assert_eq!(
        advertiser.field("name").and_then(Field::as_str),
        Some("Test Advertiser")
    );

    let sites = creative
        .get_field("sites")
        .await
        .unwrap()
        .and_then(Field::as_records)
        .map(<[Model]>::len);
    assert_eq!(sites, Some(2));

    server.shutdown().await;
}

#[tokio::test]
async fn test_create_and_deactivate_profile() {
    let server = MockServer::start().await;
    let session = connect(&server).await;

    let mut profile = Model::new(ModelKind::Profile);
    profile.set_field("name", "Night owls");
    profile.set_field("advertiser_id", 1_i64);
    profile.create(Some(&session)).await.unwrap();

    let id = profile.id().expect("Created profile has an id");
    assert!(profile.field("created_at").and_then(Field::as_timestamp).is_some());

    profile.delete(None).await.unwrap();

    let fresh = session
        .get(&format!("profile/{id}"))
        .await
        .unwrap()
        .into_record()
        .unwrap();
    assert_eq!(fresh.field("state").and_then(Field::as_str), Some("INACTIVE"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_custom_state_records() {
    let state = MockState::new()
        .with_user("ops@example.com", "secret")
        .with_record(ModelKind::Advertiser, Fixtures::advertiser(42, "Acme"));

    let server = MockServer::with_state(state).await;
    let session = Session::connect("ops@example.com", "secret", server.url())
        .await
        .unwrap();

    let advertisers = session
        .get("advertisers")
        .await
        .unwrap()
        .into_records()
        .unwrap();

    assert_eq!(advertisers.len(), 1);
    assert_eq!(advertisers[0].id().as_deref(), Some("42"));

    server.shutdown().await;
}

// =============================================================================
// Report Workflow Tests
// =============================================================================

#[tokio::test]
async fn test_report_polls_until_ready() {
    let server = MockServer::start().await;
    let session = connect(&server).await;

    let mut report = session
        .report(
            ReportRequest::new("advertiser", Utc::now() - Duration::days(1))
                .groups(["hour"])
                .sums(["impressions"]),
        )
        .await
        .unwrap();
    assert_eq!(report.status(), ReportStatus::Pending);

    // Content is refused while pending
    assert!(matches!(
        report.content().await,
        Err(AtomxError::ReportNotReady { .. })
    ));

    let mut polls = 0;
    while !report.is_ready().await.unwrap() {
        polls += 1;
        assert!(polls < 10, "report never finished");
    }
    assert_eq!(report.lines(), Some(3));

    let rows = report.csv().await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], vec!["hour-1", "10"]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_failed_report_workflow() {
    let state = MockServer::state_from_scenario(Fixtures::default_scenario())
        .with_report_polls(0)
        .with_report_failure("Scope not allowed");
    let server = MockServer::with_state(state).await;
    let session = connect(&server).await;

    let mut report = session
        .report(ReportRequest::new("network", Utc::now() - Duration::hours(3)))
        .await
        .unwrap();

    assert_eq!(report.poll().await.unwrap(), ReportStatus::Error);
    assert_eq!(report.error(), Some("Scope not allowed"));
    assert!(matches!(
        report.content().await,
        Err(AtomxError::ReportFailed { .. })
    ));

    server.shutdown().await;
}

#[tokio::test]
async fn test_report_content_sorted_and_paged() {
    let state = MockServer::state_from_scenario(Fixtures::default_scenario()).with_report_polls(0);
    let server = MockServer::with_state(state).await;
    let session = connect(&server).await;

    let mut report = session
        .report(
            ReportRequest::new("advertiser", Utc::now() - Duration::days(1))
                .groups(["hour"])
                .sums(["impressions"]),
        )
        .await
        .unwrap();
    assert!(report.is_ready().await.unwrap());

    let top = report
        .get(&PaginationParams::default().limit(2).sort("impressions.desc"))
        .await
        .unwrap();

    assert_eq!(top, "hour-3\t30\nhour-2\t20\n");

    server.shutdown().await;
}

#[cfg(feature = "table")]
#[tokio::test]
async fn test_report_table() {
    let state = MockServer::state_from_scenario(Fixtures::default_scenario()).with_report_polls(0);
    let server = MockServer::with_state(state).await;
    let session = connect(&server).await;

    let mut report = session
        .report(
            ReportRequest::new("advertiser", Utc::now() - Duration::days(1))
                .groups(["day"])
                .sums(["clicks"]),
        )
        .await
        .unwrap();

    assert!(report.is_ready().await.unwrap());
    let table = report.table().await.unwrap();

    assert_eq!(table.columns, vec!["day", "clicks"]);
    assert_eq!(table.column("clicks"), Some(vec!["10", "20", "30"]));
    assert!(table.to_string().contains("day-2"));

    server.shutdown().await;
}
