//! Report endpoint handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::{authorize, error_response};
use crate::mock_server::state::MockState;

/// Query parameters for fetching a report.
#[derive(Debug, Default, Deserialize)]
pub struct ReportQueryParams {
    pub status: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// `<column>.asc` or `<column>.desc`.
    pub sort: Option<String>,
}

/// POST /report
pub async fn submit_report(
    State(state): State<Arc<RwLock<MockState>>>,
    headers: HeaderMap,
    Json(query): Json<Value>,
) -> Response {
    let mut state = state.write().await;
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }

    if query.get("scope").and_then(Value::as_str).is_none() {
        return error_response(StatusCode::BAD_REQUEST, "Report scope is required");
    }

    let report = state.submit_report(query);
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "report": { "id": report.id, "status": "PENDING", "lines": 0 },
            "query": report.query,
        })),
    )
        .into_response()
}

/// GET /report/{id}
///
/// With `status=true` answers a status poll; otherwise serves the
/// tab-delimited content of a finished report.
pub async fn get_report(
    State(state): State<Arc<RwLock<MockState>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<ReportQueryParams>,
) -> Response {
    let mut state = state.write().await;
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }

    if params.status.unwrap_or(false) {
        return match state.poll_report(&id) {
            Some(status) => {
                (StatusCode::OK, Json(json!({ "success": true, "report": status }))).into_response()
            }
            None => error_response(StatusCode::NOT_FOUND, &format!("No report found with id: {id}")),
        };
    }

    let Some(report) = state.get_report(&id) else {
        return error_response(StatusCode::NOT_FOUND, &format!("No report found with id: {id}"));
    };
    if report.pending_polls > 0 {
        return error_response(StatusCode::BAD_REQUEST, "Report is not ready yet");
    }
    if let Some(failure) = &report.failure {
        return error_response(StatusCode::BAD_REQUEST, failure);
    }

    let content: String = report
        .sorted_lines(params.sort.as_deref())
        .into_iter()
        .skip(params.offset.unwrap_or(0))
        .take(params.limit.unwrap_or(usize::MAX))
        .map(|line| format!("{line}\n"))
        .collect();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/tab-separated-values")],
        content,
    )
        .into_response()
}
