//! Login, logout and search handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;

use super::{authorize, bearer_token, error_response, plural_name};
use crate::mock_server::state::MockState;

/// Body of a login request.
#[derive(Debug, Deserialize)]
pub struct LoginParams {
    pub email: String,
    pub password: String,
}

/// Query parameters for search.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

/// POST /login
pub async fn login(
    State(state): State<Arc<RwLock<MockState>>>,
    Json(params): Json<LoginParams>,
) -> Response {
    let mut state = state.write().await;

    match state.login(&params.email, &params.password) {
        Some(token) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "auth_tkt": token,
                "user": { "email": params.email },
            })),
        )
            .into_response(),
        None => error_response(StatusCode::UNAUTHORIZED, "Invalid email or password"),
    }
}

/// GET /logout
pub async fn logout(State(state): State<Arc<RwLock<MockState>>>, headers: HeaderMap) -> Response {
    let mut state = state.write().await;

    if let Some(token) = bearer_token(&headers) {
        state.logout(token);
    }
    (StatusCode::OK, Json(json!({ "success": true }))).into_response()
}

/// GET /search?q=...
pub async fn search(
    State(state): State<Arc<RwLock<MockState>>>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Response {
    let state = state.read().await;
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }

    let hits: Map<String, Value> = state
        .search(&query.q)
        .into_iter()
        .map(|(kind, records)| {
            let records: Vec<Value> = records.into_iter().cloned().map(Value::Object).collect();
            (plural_name(kind), Value::Array(records))
        })
        .collect();

    (
        StatusCode::OK,
        Json(json!({ "success": true, "search": hits })),
    )
        .into_response()
}
