//! Asynchronous server-side reports.
//!
//! A report is submitted with [`Session::report`], then polled until the
//! server marks it finished. Polling is caller-driven: every [`Report::poll`]
//! before a terminal status costs one request, and once a terminal status
//! has been seen it is cached and never queried again.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::field::{parse_timestamp, Field};
use super::kind::ModelKind;
use super::record::Model;
use crate::error::{AtomxError, Result};
use crate::output::ReportTable;
use crate::pagination::PaginationParams;
use crate::session::{ReportRef, Session};

/// Attributes refreshed from every status response.
const STATUS_FIELDS: &[&str] = &[
    "status", "is_ready", "ready", "lines", "error", "started", "finished", "duration",
];

/// Hour-granularity layouts the report endpoint expects.
const UTC_HOUR_FORMAT: &str = "%Y-%m-%d %H:00:00Z";
const LOCAL_HOUR_FORMAT: &str = "%Y-%m-%d %H:00:00";

/// Lifecycle of a report job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    /// Queued or running.
    Pending,
    /// Finished; content can be fetched.
    Success,
    /// Finished with an error.
    Error,
}

impl ReportStatus {
    /// Whether no further transition can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, ReportStatus::Success | ReportStatus::Error)
    }

    /// Read the status from a report or status payload.
    ///
    /// The `status` string (`PENDING`, `SUCCESS`, `ERROR`) wins when present.
    /// Older payloads only carry a boolean `is_ready` (or `ready`) flag, in
    /// which case a non-empty `error` marks the report as failed.
    pub(crate) fn from_payload(payload: &Value) -> Self {
        if let Some(status) = payload.get("status").and_then(Value::as_str) {
            return match status.to_ascii_uppercase().as_str() {
                "SUCCESS" => ReportStatus::Success,
                "ERROR" => ReportStatus::Error,
                _ => ReportStatus::Pending,
            };
        }

        let has_error = match payload.get("error") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        };
        let ready = payload
            .get("is_ready")
            .or_else(|| payload.get("ready"))
            .and_then(Value::as_bool);

        match ready {
            _ if has_error => ReportStatus::Error,
            Some(true) => ReportStatus::Success,
            _ => ReportStatus::Pending,
        }
    }
}

/// A report time bound.
///
/// Datetimes are truncated to the hour on the wire; `Utc` values carry a
/// trailing `Z`, `Local` values are interpreted in the request's timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportTime {
    Utc(DateTime<Utc>),
    Local(NaiveDateTime),
    /// Passed through verbatim.
    Raw(String),
}

impl ReportTime {
    /// The string sent to the API.
    pub fn to_wire(&self) -> String {
        match self {
            ReportTime::Utc(ts) => ts.format(UTC_HOUR_FORMAT).to_string(),
            ReportTime::Local(ts) => ts.format(LOCAL_HOUR_FORMAT).to_string(),
            ReportTime::Raw(raw) => raw.clone(),
        }
    }
}

impl Serialize for ReportTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_wire())
    }
}

impl From<DateTime<Utc>> for ReportTime {
    fn from(value: DateTime<Utc>) -> Self {
        ReportTime::Utc(value)
    }
}

impl From<NaiveDateTime> for ReportTime {
    fn from(value: NaiveDateTime) -> Self {
        ReportTime::Local(value)
    }
}

impl From<&str> for ReportTime {
    fn from(value: &str) -> Self {
        ReportTime::Raw(value.to_string())
    }
}

impl From<String> for ReportTime {
    fn from(value: String) -> Self {
        ReportTime::Raw(value)
    }
}

/// A report request as submitted to `POST report`.
///
/// # Example
///
/// ```
/// use atomx::ReportRequest;
/// use chrono::{TimeZone, Utc};
/// use serde_json::json;
///
/// let request = ReportRequest::new("advertiser", Utc.with_ymd_and_hms(2015, 6, 1, 13, 45, 0).unwrap())
///     .groups(["hour"])
///     .sums(["impressions", "clicks"])
///     .filter(json!(["advertiser_id", "==", 42]))
///     .timezone("UTC");
///
/// assert_eq!(request.from.to_wire(), "2015-06-01 13:00:00Z");
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ReportRequest {
    /// Report scope, e.g. `advertiser` or `publisher`.
    pub scope: String,
    /// Columns to group by.
    pub groups: Vec<String>,
    /// Columns to sum.
    pub sums: Vec<String>,
    /// Filter triples such as `["advertiser_id", "==", 42]`.
    #[serde(rename = "where")]
    pub filters: Vec<Value>,
    pub from: ReportTime,
    /// Defaults to the submission time when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<ReportTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Ask the server for a faster, approximate report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fast: Option<bool>,
}

impl ReportRequest {
    pub fn new(scope: impl Into<String>, from: impl Into<ReportTime>) -> Self {
        Self {
            scope: scope.into(),
            groups: Vec::new(),
            sums: Vec::new(),
            filters: Vec::new(),
            from: from.into(),
            to: None,
            timezone: None,
            fast: None,
        }
    }

    #[must_use]
    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn sums<I, S>(mut self, sums: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sums = sums.into_iter().map(Into::into).collect();
        self
    }

    /// Add one filter triple.
    #[must_use]
    pub fn filter(mut self, filter: Value) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn to(mut self, to: impl Into<ReportTime>) -> Self {
        self.to = Some(to.into());
        self
    }

    #[must_use]
    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    #[must_use]
    pub fn fast(mut self, fast: bool) -> Self {
        self.fast = Some(fast);
        self
    }

    pub(crate) fn with_default_to(mut self, now: DateTime<Utc>) -> Self {
        if self.to.is_none() {
            self.to = Some(ReportTime::Utc(now));
        }
        self
    }
}

/// The request filters as echoed back by the server.
///
/// Parsing is lenient: a `null` or malformed list reads as empty and a
/// non-string scope as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportQuery {
    #[serde(default, deserialize_with = "lenient_string")]
    pub scope: Option<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub groups: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub sums: Vec<String>,
    /// Everything else the server echoed.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_strings<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

impl ReportQuery {
    /// Column labels of the report content: groups followed by sums.
    pub fn columns(&self) -> Vec<String> {
        self.groups.iter().chain(&self.sums).cloned().collect()
    }
}

/// A submitted report.
///
/// The report is a [`Model`] of kind [`ModelKind::Report`] plus the echoed
/// query and the last observed status.
#[derive(Debug, Clone)]
pub struct Report {
    record: Model,
    query: ReportQuery,
    status: ReportStatus,
}

impl Report {
    pub(crate) fn from_response(session: &Session, query: Value, report: Value) -> Result<Self> {
        let status = ReportStatus::from_payload(&report);
        let record = Model::from_api(ModelKind::Report, report, Some(session))?;
        let query = match query {
            Value::Null => ReportQuery::default(),
            other => serde_json::from_value(other).unwrap_or_else(|e| {
                warn!(error = %e, "ignoring unreadable report query echo");
                ReportQuery::default()
            }),
        };

        Ok(Self {
            record,
            query,
            status,
        })
    }

    pub fn id(&self) -> Option<String> {
        self.record.id()
    }

    pub fn query(&self) -> &ReportQuery {
        &self.query
    }

    /// The last observed status. Does not poll.
    pub fn status(&self) -> ReportStatus {
        self.status
    }

    /// The underlying record with every attribute the server sent.
    pub fn record(&self) -> &Model {
        &self.record
    }

    /// Number of content lines, as last reported by the server.
    pub fn lines(&self) -> Option<u64> {
        self.value("lines").and_then(Value::as_u64)
    }

    /// Server error message for a failed report.
    pub fn error(&self) -> Option<&str> {
        self.value("error").and_then(Value::as_str)
    }

    pub fn started(&self) -> Option<DateTime<Utc>> {
        self.timestamp("started")
    }

    pub fn finished(&self) -> Option<DateTime<Utc>> {
        self.timestamp("finished")
    }

    /// Run time in seconds.
    pub fn duration(&self) -> Option<f64> {
        self.value("duration").and_then(Value::as_f64)
    }

    /// Refresh the status from the server, unless it is already terminal.
    ///
    /// # Errors
    ///
    /// Returns [`AtomxError::NoSession`] when the session is gone and
    /// [`AtomxError::ModelNotFound`] for a report without an id.
    pub async fn poll(&mut self) -> Result<ReportStatus> {
        if self.status.is_terminal() {
            return Ok(self.status);
        }

        let session = self.record.resolve_session(None)?;
        let id = self.record.require_id()?;
        let payload = session.report_status(id.as_str()).await?;

        for name in STATUS_FIELDS {
            if let Some(value) = payload.get(*name) {
                self.record.absorb(name, value.clone());
            }
        }
        self.status = ReportStatus::from_payload(&payload);

        debug!(report = %id, status = ?self.status, lines = ?self.lines(), "polled report status");
        Ok(self.status)
    }

    /// Whether the report finished successfully. Polls while pending.
    pub async fn is_ready(&mut self) -> Result<bool> {
        Ok(self.poll().await? == ReportStatus::Success)
    }

    /// The full report content.
    pub async fn content(&mut self) -> Result<String> {
        self.get(&PaginationParams::default()).await
    }

    /// The report content, optionally sorted and paginated.
    ///
    /// # Errors
    ///
    /// Returns [`AtomxError::ReportNotReady`] while the report is pending
    /// and [`AtomxError::ReportFailed`] if it finished with an error. In
    /// both cases no content request is made.
    pub async fn get(&mut self, params: &PaginationParams) -> Result<String> {
        let id = self.record.require_id()?;
        match self.poll().await? {
            ReportStatus::Success => {}
            ReportStatus::Pending => return Err(AtomxError::ReportNotReady { id }),
            ReportStatus::Error => {
                return Err(AtomxError::ReportFailed {
                    message: self.error().unwrap_or("unknown error").to_string(),
                    id,
                })
            }
        }

        let session = self.record.resolve_session(None)?;
        session.report_get(id.as_str(), params).await
    }

    /// The content split into tab-delimited rows.
    pub async fn csv(&mut self) -> Result<Vec<Vec<String>>> {
        let content = self.content().await?;
        parse_rows(&content)
    }

    /// The content as a table labeled with the query's groups and sums.
    ///
    /// Text rendering goes through [`ReportTable::render`], which needs the
    /// `table` feature.
    pub async fn table(&mut self) -> Result<ReportTable> {
        let rows = self.csv().await?;
        Ok(ReportTable::new(self.query.columns(), rows))
    }

    fn value(&self, name: &str) -> Option<&Value> {
        self.record.field(name).and_then(Field::as_value)
    }

    fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.record.field(name)? {
            Field::Timestamp(ts) => Some(*ts),
            field => field.as_str().and_then(parse_timestamp),
        }
    }
}

impl ReportRef for Report {
    fn report_id(&self) -> Result<String> {
        self.record.require_id()
    }
}

/// Split tab-delimited report content into rows.
pub(crate) fn parse_rows(content: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(content.as_bytes());

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(AtomxError::from)
        })
        .collect()
}
