//! HTTP request handlers for the mock server.

pub mod auth;
pub mod reports;
pub mod resources;

pub use auth::*;
pub use reports::*;
pub use resources::*;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::mock_server::state::MockState;
use crate::{resolve_model_name, ModelKind};

/// Bearer token of a request, if any.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Reject the request unless the state accepts its token.
pub(crate) fn authorize(state: &MockState, headers: &HeaderMap) -> Result<(), Response> {
    if state.is_authorized(bearer_token(headers)) {
        Ok(())
    } else {
        Err(error_response(StatusCode::UNAUTHORIZED, "Authentication required"))
    }
}

/// Look up the record kind behind a resource path segment.
pub(crate) fn resolve_kind(resource: &str) -> Result<ModelKind, Response> {
    resolve_model_name(resource).ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            &format!("Unknown resource: {resource}"),
        )
    })
}

/// Plural resource name used for list payloads (`creatives`, `countries`).
pub(crate) fn plural_name(kind: ModelKind) -> String {
    let name = kind.resource_name();
    match name.strip_suffix('y') {
        Some(stem) => format!("{stem}ies"),
        None => format!("{name}s"),
    }
}

/// JSON error body as the API sends it.
pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

/// Envelope naming the resource and carrying the payload under that name.
pub(crate) fn resource_response(name: &str, payload: Value) -> Response {
    let mut body = serde_json::Map::new();
    body.insert("success".to_string(), json!(true));
    body.insert("resource".to_string(), json!(name));
    body.insert(name.to_string(), payload);
    (StatusCode::OK, Json(Value::Object(body))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural_names_resolve_back() {
        assert_eq!(plural_name(ModelKind::Creative), "creatives");
        assert_eq!(plural_name(ModelKind::Country), "countries");
        for kind in ModelKind::ALL {
            assert_eq!(resolve_model_name(&plural_name(*kind)), Some(*kind));
        }
    }
}
