//! Mock server state management.
//!
//! Provides the in-memory data store for the mock Atomx API server.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;

use crate::ModelKind;

/// Attributes of one stored record.
pub type Attributes = Map<String, Value>;

/// Timestamp layout the mock server writes into records.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Ids handed out to created records start here, above fixture ids.
const FIRST_CREATED_ID: u64 = 1000;

/// Number of status polls a new report stays pending for by default.
const DEFAULT_REPORT_POLLS: u32 = 2;

/// A PUT body as received by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUpdate {
    pub kind: ModelKind,
    pub id: u64,
    pub body: Attributes,
}

/// A submitted report job.
#[derive(Debug, Clone)]
pub struct MockReport {
    pub id: String,
    /// The request body, echoed back as the report query.
    pub query: Value,
    /// Status polls left before the report finishes.
    pub pending_polls: u32,
    /// Error message the report finishes with, if it fails.
    pub failure: Option<String>,
    /// Tab-delimited content served once finished.
    pub content: String,
}

impl MockReport {
    fn is_finished(&self) -> bool {
        self.pending_polls == 0
    }

    fn lines(&self) -> usize {
        self.content.lines().count()
    }

    /// Content lines ordered by a `<column>.asc|desc` sort.
    ///
    /// Columns are the query's groups followed by its sums. An unknown
    /// column keeps the generated order.
    pub fn sorted_lines(&self, sort: Option<&str>) -> Vec<&str> {
        let mut lines: Vec<&str> = self.content.lines().collect();
        let Some(sort) = sort else {
            return lines;
        };
        let (column, descending) = match sort.rsplit_once('.') {
            Some((column, "desc")) => (column, true),
            Some((column, "asc")) => (column, false),
            _ => (sort, false),
        };
        let columns: Vec<String> = query_names(&self.query, "groups")
            .into_iter()
            .chain(query_names(&self.query, "sums"))
            .collect();
        let Some(index) = columns.iter().position(|c| c == column) else {
            return lines;
        };

        let cell = |line: &&str| line.split('\t').nth(index).unwrap_or("").to_string();
        lines.sort_by(|a, b| {
            let (a, b) = (cell(a), cell(b));
            let ordering = match (a.parse::<f64>(), b.parse::<f64>()) {
                (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => a.cmp(&b),
            };
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
        lines
    }

    /// Status payload as served by `GET report/<id>?status=true`.
    pub fn status_json(&self) -> Value {
        let (status, lines, error) = match (&self.failure, self.is_finished()) {
            (_, false) => ("PENDING", 0, Value::Null),
            (Some(message), true) => ("ERROR", 0, json!(message)),
            (None, true) => ("SUCCESS", self.lines(), Value::Null),
        };
        json!({
            "id": self.id,
            "status": status,
            "lines": lines,
            "error": error,
            "duration": if self.is_finished() { json!(0.5) } else { Value::Null },
        })
    }
}

/// Shared state for the mock server.
///
/// This struct holds all the mock data that the server will serve.
/// It's wrapped in `Arc<RwLock<_>>` for concurrent access.
#[derive(Debug)]
pub struct MockState {
    /// Records indexed by kind, then id.
    pub records: BTreeMap<ModelKind, BTreeMap<u64, Attributes>>,

    /// Accepted email/password pairs.
    pub users: HashMap<String, String>,

    /// Tokens handed out by successful logins.
    pub tokens: HashSet<String>,

    /// When set, every endpoint except login requires a valid bearer token.
    pub require_auth: bool,

    /// Submitted reports by id.
    pub reports: HashMap<String, MockReport>,

    /// Every PUT body received, in order.
    pub updates: Vec<RecordedUpdate>,

    /// Change log per record.
    pub history: HashMap<(ModelKind, u64), Vec<Value>>,

    /// Status polls a newly submitted report stays pending for.
    pub report_polls_until_ready: u32,

    /// Error message newly submitted reports fail with.
    pub report_failure: Option<String>,

    next_id: u64,
    next_token: u64,
    next_report: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            users: HashMap::new(),
            tokens: HashSet::new(),
            require_auth: false,
            reports: HashMap::new(),
            updates: Vec::new(),
            history: HashMap::new(),
            report_polls_until_ready: DEFAULT_REPORT_POLLS,
            report_failure: None,
            next_id: FIRST_CREATED_ID,
            next_token: 1,
            next_report: 1,
        }
    }
}

impl MockState {
    /// Create a new empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create state wrapped in Arc<RwLock> for sharing.
    pub fn shared(self) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(self))
    }

    /// Accept a login.
    pub fn with_user(mut self, email: &str, password: &str) -> Self {
        self.users.insert(email.to_string(), password.to_string());
        self
    }

    /// Add a record. The attributes must carry a numeric `id`.
    pub fn with_record(mut self, kind: ModelKind, attributes: Attributes) -> Self {
        if let Some(id) = attributes.get("id").and_then(Value::as_u64) {
            self.records.entry(kind).or_default().insert(id, attributes);
        }
        self
    }

    /// Require a bearer token from login on every other endpoint.
    pub fn with_auth_required(mut self) -> Self {
        self.require_auth = true;
        self
    }

    /// Number of status polls new reports stay pending for.
    pub fn with_report_polls(mut self, polls: u32) -> Self {
        self.report_polls_until_ready = polls;
        self
    }

    /// Make new reports finish with an error.
    pub fn with_report_failure(mut self, message: &str) -> Self {
        self.report_failure = Some(message.to_string());
        self
    }

    /// Check credentials and hand out a token.
    pub fn login(&mut self, email: &str, password: &str) -> Option<String> {
        if self.users.get(email).map(String::as_str) != Some(password) {
            return None;
        }
        let token = format!("tkt-{}", self.next_token);
        self.next_token += 1;
        self.tokens.insert(token.clone());
        Some(token)
    }

    /// Drop a token.
    pub fn logout(&mut self, token: &str) {
        self.tokens.remove(token);
    }

    /// Whether a request with this bearer token may proceed.
    pub fn is_authorized(&self, token: Option<&str>) -> bool {
        !self.require_auth || token.is_some_and(|t| self.tokens.contains(t))
    }

    /// Get a record by kind and id.
    pub fn get_record(&self, kind: ModelKind, id: u64) -> Option<&Attributes> {
        self.records.get(&kind)?.get(&id)
    }

    /// List records of a kind.
    ///
    /// `limit` and `offset` paginate; every other filter must equal the
    /// record's attribute.
    pub fn list_records(&self, kind: ModelKind, filters: &HashMap<String, String>) -> Vec<&Attributes> {
        let offset = filters
            .get("offset")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let limit = filters
            .get("limit")
            .and_then(|v| v.parse().ok())
            .unwrap_or(usize::MAX);

        self.records
            .get(&kind)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter(|record| {
                filters
                    .iter()
                    .filter(|(key, _)| !matches!(key.as_str(), "limit" | "offset" | "sort"))
                    .all(|(key, expected)| {
                        record
                            .get(key)
                            .is_some_and(|value| value_matches(value, expected))
                    })
            })
            .skip(offset)
            .take(limit)
            .collect()
    }

    /// Store a new record with a fresh id and creation timestamp.
    pub fn create_record(&mut self, kind: ModelKind, mut attributes: Attributes) -> Attributes {
        let id = self.next_id;
        self.next_id += 1;

        let now = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        attributes.insert("id".to_string(), json!(id));
        attributes.insert("created_at".to_string(), json!(now));
        attributes.insert("updated_at".to_string(), json!(now));

        self.records
            .entry(kind)
            .or_default()
            .insert(id, attributes.clone());
        attributes
    }

    /// Merge changes into a record and return the updated version.
    pub fn update_record(&mut self, kind: ModelKind, id: u64, changes: Attributes) -> Option<&Attributes> {
        let record = self.records.get_mut(&kind)?.get_mut(&id)?;

        let now = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        for (key, value) in &changes {
            record.insert(key.clone(), value.clone());
        }
        record.insert("updated_at".to_string(), json!(now));

        self.history
            .entry((kind, id))
            .or_default()
            .push(json!({ "date": now, "changes": changes }));
        self.updates.push(RecordedUpdate {
            kind,
            id,
            body: changes,
        });

        self.get_record(kind, id)
    }

    /// Change log of a record.
    pub fn history(&self, kind: ModelKind, id: u64) -> &[Value] {
        self.history
            .get(&(kind, id))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Records whose `name` or `title` contains the query, grouped by kind.
    pub fn search(&self, query: &str) -> BTreeMap<ModelKind, Vec<&Attributes>> {
        let needle = query.to_lowercase();
        let mut hits: BTreeMap<ModelKind, Vec<&Attributes>> = BTreeMap::new();

        for (kind, records) in &self.records {
            for record in records.values() {
                let matched = ["name", "title"].iter().any(|key| {
                    record
                        .get(*key)
                        .and_then(Value::as_str)
                        .is_some_and(|s| s.to_lowercase().contains(&needle))
                });
                if matched {
                    hits.entry(*kind).or_default().push(record);
                }
            }
        }
        hits
    }

    /// Register a report job for a request body.
    pub fn submit_report(&mut self, query: Value) -> MockReport {
        let id = format!("{:032x}", self.next_report);
        self.next_report += 1;

        let report = MockReport {
            content: report_content(&query),
            id: id.clone(),
            query,
            pending_polls: self.report_polls_until_ready,
            failure: self.report_failure.clone(),
        };
        self.reports.insert(id, report.clone());
        report
    }

    /// Answer a status poll, advancing the report towards completion.
    pub fn poll_report(&mut self, id: &str) -> Option<Value> {
        let report = self.reports.get_mut(id)?;
        let status = report.status_json();
        report.pending_polls = report.pending_polls.saturating_sub(1);
        Some(status)
    }

    /// Get a report by id.
    pub fn get_report(&self, id: &str) -> Option<&MockReport> {
        self.reports.get(id)
    }
}

/// Compare a stored value with a query-string filter.
fn value_matches(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        other => other.to_string() == expected,
    }
}

/// String entries of a list in the report query.
fn query_names(query: &Value, key: &str) -> Vec<String> {
    query
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Three deterministic rows: group columns as `<name>-<row>`, sums as
/// multiples of ten.
fn report_content(query: &Value) -> String {
    let groups = query_names(query, "groups");
    let sums = query_names(query, "sums");

    (1..=3)
        .map(|row| {
            groups
                .iter()
                .map(|g| format!("{g}-{row}"))
                .chain(sums.iter().map(|_| (row * 10).to_string()))
                .collect::<Vec<_>>()
                .join("\t")
                + "\n"
        })
        .collect()
}
