//! Mock Atomx API server.
//!
//! Provides an axum-based HTTP server that simulates the Atomx API.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::fixtures::{DefaultScenario, Fixtures};
use super::handlers;
use super::state::MockState;

/// A mock Atomx API server for testing.
///
/// The server runs in the background and can be used to test the session
/// and records against a realistic API implementation.
pub struct MockServer {
    /// The URL where the server is listening.
    url: String,
    /// Handle to the server task.
    handle: JoinHandle<()>,
    /// Shared state that can be modified during tests.
    state: Arc<RwLock<MockState>>,
}

impl MockServer {
    /// Start a new mock server with default fixtures.
    ///
    /// The default scenario requires login with
    /// [`DEFAULT_EMAIL`](super::DEFAULT_EMAIL) and
    /// [`DEFAULT_PASSWORD`](super::DEFAULT_PASSWORD).
    pub async fn start() -> Self {
        Self::with_state(Self::default_state()).await
    }

    /// Start a mock server with empty state.
    ///
    /// Useful when you want to control exactly what data is available.
    pub async fn start_empty() -> Self {
        Self::with_state(MockState::new()).await
    }

    /// Start a mock server with custom state.
    pub async fn with_state(state: MockState) -> Self {
        let shared_state = state.shared();
        let app = Self::create_router(shared_state.clone());

        // Bind to a random available port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let addr = listener.local_addr().expect("Failed to get local address");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server error");
        });

        Self {
            url: format!("http://{}", addr),
            handle,
            state: shared_state,
        }
    }

    /// Get the base URL of the mock server.
    ///
    /// Use this URL as the endpoint when creating a `Session`.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get access to the server's shared state.
    ///
    /// This allows inspecting received updates or changing data mid-test.
    pub fn state(&self) -> Arc<RwLock<MockState>> {
        self.state.clone()
    }

    /// Shutdown the server.
    ///
    /// This aborts the server task. It's safe to call multiple times.
    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }

    /// Create the default state with common test fixtures.
    fn default_state() -> MockState {
        Self::state_from_scenario(Fixtures::default_scenario())
    }

    /// Create state from a scenario.
    pub fn state_from_scenario(scenario: DefaultScenario) -> MockState {
        let mut state = MockState::new().with_auth_required();

        for (email, password) in &scenario.users {
            state = state.with_user(email, password);
        }

        for (kind, attributes) in scenario.records {
            state = state.with_record(kind, attributes);
        }

        state
    }

    /// Create the axum router with all routes.
    fn create_router(state: Arc<RwLock<MockState>>) -> Router {
        Router::new()
            // Session routes
            .route("/login", post(handlers::login))
            .route("/logout", get(handlers::logout))
            .route("/search", get(handlers::search))
            // Report routes
            .route("/report", post(handlers::submit_report))
            .route("/report/:id", get(handlers::get_report))
            // Health check
            .route("/health", get(health_check))
            // Generic resource routes
            .route(
                "/:resource",
                get(handlers::list_records).post(handlers::create_record),
            )
            .route(
                "/:resource/:id",
                get(handlers::get_record).put(handlers::update_record),
            )
            .route("/:resource/:id/:attribute", get(handlers::get_attribute))
            .with_state(state)
    }
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "ok"
}
