//! Mock Atomx API server for E2E testing.
//!
//! This module provides an in-memory mock server that simulates the Atomx API
//! for integration and end-to-end testing. Unlike wiremock which mocks at the
//! HTTP level per-test, this server maintains state across requests, enabling
//! realistic workflow testing: login, edit a record, submit a report and poll
//! it until it finishes.
//!
//! # Example
//!
//! ```ignore
//! use atomx::mock_server::{MockServer, DEFAULT_EMAIL, DEFAULT_PASSWORD};
//! use atomx::Session;
//!
//! #[tokio::test]
//! async fn test_workflow() {
//!     let server = MockServer::start().await;
//!     let session = Session::connect(DEFAULT_EMAIL, DEFAULT_PASSWORD, server.url())
//!         .await
//!         .unwrap();
//!
//!     // Server comes with default fixtures
//!     let creative = session.get("creative/1").await.unwrap().into_record().unwrap();
//!     assert_eq!(creative.field("title").and_then(|f| f.as_str()), Some("Creative 1"));
//!
//!     server.shutdown().await;
//! }
//! ```

mod fixtures;
mod handlers;
mod server;
mod state;

pub use fixtures::{DefaultScenario, Fixtures, DEFAULT_EMAIL, DEFAULT_PASSWORD};
pub use server::MockServer;
pub use state::{Attributes, MockReport, MockState, RecordedUpdate};
