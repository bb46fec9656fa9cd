//! Resource endpoint handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde_json::Value;
use tokio::sync::RwLock;

use super::{authorize, error_response, plural_name, resolve_kind, resource_response};
use crate::mock_server::state::{Attributes, MockState};
use crate::{resolve_attribute_model_name, ModelKind};

/// Parse a numeric record id from the path.
fn parse_id(id: &str) -> Result<u64, Response> {
    id.parse()
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, &format!("Invalid id: {id}")))
}

fn not_found(kind: ModelKind, id: u64) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        &format!("No {} found with id: {id}", kind.resource_name()),
    )
}

fn single(kind: ModelKind, record: &Attributes) -> Response {
    resource_response(kind.resource_name(), Value::Object(record.clone()))
}

fn list(kind: ModelKind, records: Vec<&Attributes>) -> Response {
    let records = records.into_iter().cloned().map(Value::Object).collect();
    resource_response(&plural_name(kind), Value::Array(records))
}

/// GET /{resource}
///
/// An `id` filter answers with that single record.
pub async fn list_records(
    State(state): State<Arc<RwLock<MockState>>>,
    headers: HeaderMap,
    Path(resource): Path<String>,
    Query(filters): Query<HashMap<String, String>>,
) -> Response {
    let state = state.read().await;
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let kind = match resolve_kind(&resource) {
        Ok(kind) => kind,
        Err(rejection) => return rejection,
    };

    if let Some(id) = filters.get("id") {
        let id = match parse_id(id) {
            Ok(id) => id,
            Err(rejection) => return rejection,
        };
        return match state.get_record(kind, id) {
            Some(record) => single(kind, record),
            None => not_found(kind, id),
        };
    }

    list(kind, state.list_records(kind, &filters))
}

/// GET /{resource}/{id}
pub async fn get_record(
    State(state): State<Arc<RwLock<MockState>>>,
    headers: HeaderMap,
    Path((resource, id)): Path<(String, String)>,
) -> Response {
    let state = state.read().await;
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let (kind, id) = match resolve_kind(&resource).and_then(|kind| Ok((kind, parse_id(&id)?))) {
        Ok(found) => found,
        Err(rejection) => return rejection,
    };

    match state.get_record(kind, id) {
        Some(record) => single(kind, record),
        None => not_found(kind, id),
    }
}

/// GET /{resource}/{id}/{attribute}
///
/// Attributes holding ids of a known kind are expanded into those records.
/// `history` answers with the record's change log.
pub async fn get_attribute(
    State(state): State<Arc<RwLock<MockState>>>,
    headers: HeaderMap,
    Path((resource, id, attribute)): Path<(String, String, String)>,
    Query(filters): Query<HashMap<String, String>>,
) -> Response {
    let state = state.read().await;
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let (kind, id) = match resolve_kind(&resource).and_then(|kind| Ok((kind, parse_id(&id)?))) {
        Ok(found) => found,
        Err(rejection) => return rejection,
    };
    let Some(record) = state.get_record(kind, id) else {
        return not_found(kind, id);
    };

    if attribute == "history" {
        let offset = filters
            .get("offset")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let limit = filters
            .get("limit")
            .and_then(|v| v.parse().ok())
            .unwrap_or(usize::MAX);
        let entries = state
            .history(kind, id)
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        return resource_response("history", Value::Array(entries));
    }

    let Some(value) = record.get(&attribute) else {
        return error_response(
            StatusCode::NOT_FOUND,
            &format!("{} has no attribute: {attribute}", kind.resource_name()),
        );
    };

    match (resolve_attribute_model_name(&attribute), value) {
        (Some(related), Value::Number(n)) => {
            match n.as_u64().and_then(|rid| state.get_record(related, rid)) {
                Some(found) => single(related, found),
                None => resource_response(&attribute, value.clone()),
            }
        }
        (Some(related), Value::Array(ids)) => {
            let found = ids
                .iter()
                .filter_map(Value::as_u64)
                .filter_map(|rid| state.get_record(related, rid))
                .collect();
            list(related, found)
        }
        _ => resource_response(&attribute, value.clone()),
    }
}

/// POST /{resource}
pub async fn create_record(
    State(state): State<Arc<RwLock<MockState>>>,
    headers: HeaderMap,
    Path(resource): Path<String>,
    Json(attributes): Json<Attributes>,
) -> Response {
    let mut state = state.write().await;
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let kind = match resolve_kind(&resource) {
        Ok(kind) => kind,
        Err(rejection) => return rejection,
    };

    let created = state.create_record(kind, attributes);
    single(kind, &created)
}

/// PUT /{resource}/{id}
pub async fn update_record(
    State(state): State<Arc<RwLock<MockState>>>,
    headers: HeaderMap,
    Path((resource, id)): Path<(String, String)>,
    Json(changes): Json<Attributes>,
) -> Response {
    let mut state = state.write().await;
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let (kind, id) = match resolve_kind(&resource).and_then(|kind| Ok((kind, parse_id(&id)?))) {
        Ok(found) => found,
        Err(rejection) => return rejection,
    };

    match state.update_record(kind, id, changes) {
        Some(record) => single(kind, record),
        None => not_found(kind, id),
    }
}
