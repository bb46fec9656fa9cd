//! The generic resource record.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Weak;

use serde_json::{json, Map, Value};
use tracing::debug;

use super::field::Field;
use super::kind::ModelKind;
use crate::error::{AtomxError, Result};
use crate::pagination::PaginationParams;
use crate::resolver::resolve_attribute_model_name;
use crate::session::{Resource, Session, SessionInner};

/// One remote resource instance.
///
/// A record keeps its attributes locally, remembers which of them were
/// assigned since the last sync (the dirty set), and can read missing
/// attributes from the API on demand through the session it is attached to.
///
/// Equality compares ids only: two records are equal when both carry the
/// same `id`. Records without an id never compare equal, not even to
/// themselves.
///
/// # Example
///
/// ```no_run
/// use atomx::Session;
///
/// # async fn example(session: &Session) -> atomx::Result<()> {
/// let mut creative = session
///     .get("creative/5")
///     .await?
///     .into_record()
///     .expect("a creative");
///
/// creative.set_field("title", "New title");
/// creative.save(None).await?;
///
/// // Reading a field the record does not hold fetches it from the API.
/// let advertiser = creative.get_field("advertiser").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Model {
    kind: ModelKind,
    attributes: BTreeMap<String, Field>,
    dirty: BTreeSet<String>,
    /// Attributes already read through `get_field` since the last sync.
    fetched: BTreeSet<String>,
    session: Option<Weak<SessionInner>>,
}

impl Model {
    /// An empty, detached record.
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            attributes: BTreeMap::new(),
            dirty: BTreeSet::new(),
            fetched: BTreeSet::new(),
            session: None,
        }
    }

    /// A detached record with initial attributes.
    ///
    /// Initial attributes are not dirty. `*_at` and `date` strings are
    /// parsed into timestamps.
    pub fn with_attributes<I, K, V>(kind: ModelKind, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut model = Self::new(kind);
        for (name, value) in attributes {
            let name = name.into();
            let field = Field::from_api(&name, value.into());
            model.attributes.insert(name, field);
        }
        model
    }

    /// Build a record from an API payload object.
    pub(crate) fn from_api(kind: ModelKind, payload: Value, session: Option<&Session>) -> Result<Self> {
        let mut model = Self::new(kind);
        model.attributes = parse_attributes(kind, payload)?;
        model.session = session.map(Session::downgrade);
        Ok(model)
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// The record id as a string, if it has one.
    pub fn id(&self) -> Option<String> {
        match self.id_value()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub(crate) fn id_value(&self) -> Option<&Value> {
        self.attributes
            .get("id")
            .and_then(Field::as_value)
            .filter(|v| !v.is_null())
    }

    /// Bind the record to a session for lazy reads and persistence.
    pub fn attach(&mut self, session: &Session) {
        self.session = Some(session.downgrade());
    }

    /// The attached session, if it is still alive.
    pub fn session(&self) -> Option<Session> {
        self.session.as_ref().and_then(Session::from_weak)
    }

    /// Read a locally held attribute. Never touches the network.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.attributes.get(name)
    }

    /// Iterate over the locally held attributes.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Read an attribute, fetching it from the API when needed.
    ///
    /// **This may perform a network request.** When the record has a live
    /// session and an id:
    ///
    /// - a relation attribute (one whose name resolves to a record kind,
    ///   e.g. `advertiser` or `sites_filter`) still holding bare ids is
    ///   re-fetched as expanded records;
    /// - any other attribute missing locally is fetched from
    ///   `<resource>/<id>/<name>`.
    ///
    /// Fetched values are cached on the record and are not dirty. Names
    /// starting with `_` are never fetched. Use [`Model::field`] for a
    /// purely local read.
    ///
    /// # Errors
    ///
    /// Returns [`AtomxError::AttributeError`] wrapping the API failure.
    pub async fn get_field(&mut self, name: &str) -> Result<Option<&Field>> {
        if !self.needs_fetch(name) {
            return Ok(self.attributes.get(name));
        }
        let (Some(session), Some(id)) = (self.session(), self.id()) else {
            return Ok(self.attributes.get(name));
        };

        let path = format!(
            "{}/{}/{}",
            self.kind.resource_name(),
            urlencoding::encode(&id),
            urlencoding::encode(name)
        );
        debug!(kind = %self.kind, id = %id, field = name, "lazily fetching attribute");

        // The local value, id placeholder or not, stays until the fetch succeeds.
        let fetched = session
            .get(&path)
            .await
            .map_err(|e| AtomxError::AttributeError {
                field: name.to_string(),
                source: Box::new(e),
            })?;

        let field = match fetched {
            Resource::Record(model) => Field::Record(Box::new(model)),
            Resource::Records(models) => Field::Records(models),
            Resource::Raw(value) => Field::from_api(name, value),
        };
        self.attributes.insert(name.to_string(), field);
        self.fetched.insert(name.to_string());

        Ok(self.attributes.get(name))
    }

    /// Whether `get_field` should ask the server for this attribute.
    ///
    /// Missing attributes are fetched, and so are relation attributes still
    /// holding bare ids. Each attribute is fetched at most once per sync, and
    /// locally assigned values are never replaced.
    fn needs_fetch(&self, name: &str) -> bool {
        if name.starts_with('_') || self.fetched.contains(name) || self.dirty.contains(name) {
            return false;
        }
        match self.attributes.get(name) {
            None => true,
            Some(field) => resolve_attribute_model_name(name).is_some() && field.is_foreign_id(),
        }
    }

    /// Assign an attribute.
    ///
    /// The attribute becomes dirty only if the new value differs from the
    /// current one. Returns whether the value changed.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Field>) -> bool {
        let name = name.into();
        let value = match value.into() {
            Field::Value(raw) => Field::from_api(&name, raw),
            other => other,
        };

        if self.attributes.get(&name) == Some(&value) {
            return false;
        }

        self.attributes.insert(name.clone(), value);
        self.dirty.insert(name);
        true
    }

    /// Clear an attribute.
    ///
    /// Lists are reset to `[]`, everything else to `null`, and the attribute
    /// is marked dirty so the next save sends the cleared value explicitly.
    pub fn remove_field(&mut self, name: &str) {
        self.dirty.remove(name);
        let cleared = match self.attributes.get(name) {
            Some(field) if field.is_list() => Value::Array(Vec::new()),
            _ => Value::Null,
        };
        self.attributes.insert(name.to_string(), Field::Value(cleared));
        self.dirty.insert(name.to_string());
    }

    /// Whether any attribute was assigned since the last sync.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Names of the attributes assigned since the last sync.
    pub fn dirty_fields(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// All attributes as the JSON object sent on create.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Only the dirty attributes, as sent on save.
    pub fn dirty_json(&self) -> Value {
        Value::Object(
            self.dirty
                .iter()
                .filter_map(|k| self.attributes.get(k).map(|v| (k.clone(), v.to_json())))
                .collect(),
        )
    }

    /// Create the record on the server with all of its attributes.
    ///
    /// The record is re-initialized from the response, picking up
    /// server-assigned fields such as `id` and timestamps.
    #[tracing::instrument(skip(self, session), fields(kind = %self.kind))]
    pub async fn create(&mut self, session: Option<&Session>) -> Result<&mut Self> {
        let session = self.resolve_session(session)?;
        let payload = session.post(self.kind.resource_name(), &self.to_json()).await?;
        self.reinitialize(payload, &session)?;
        Ok(self)
    }

    /// Send the dirty attributes to the server.
    ///
    /// The record is re-initialized from the response, which empties the
    /// dirty set.
    ///
    /// # Errors
    ///
    /// Returns [`AtomxError::ModelNotFound`] if the record has no id.
    #[tracing::instrument(skip(self, session), fields(kind = %self.kind))]
    pub async fn save(&mut self, session: Option<&Session>) -> Result<&mut Self> {
        let session = self.resolve_session(session)?;
        let id = self.require_id()?;
        let payload = session
            .put(self.kind.resource_name(), &id, &self.dirty_json())
            .await?;
        self.reinitialize(payload, &session)?;
        Ok(self)
    }

    /// Alias for [`Model::save`].
    pub async fn update(&mut self, session: Option<&Session>) -> Result<&mut Self> {
        self.save(session).await
    }

    /// Re-fetch the full record, dropping local changes.
    ///
    /// # Errors
    ///
    /// Returns [`AtomxError::ModelNotFound`] if the record has no id.
    #[tracing::instrument(skip(self, session), fields(kind = %self.kind))]
    pub async fn reload(&mut self, session: Option<&Session>) -> Result<&mut Self> {
        let session = self.resolve_session(session)?;
        let id = self.require_id()?;
        let path = format!("{}/{}", self.kind.resource_name(), urlencoding::encode(&id));

        match session.get(&path).await? {
            Resource::Record(fresh) => {
                self.attributes = fresh.attributes;
                self.dirty.clear();
                self.fetched.clear();
                self.session = Some(session.downgrade());
                Ok(self)
            }
            _ => Err(AtomxError::UnexpectedResponse(format!(
                "reloading {} {id} did not return a record",
                self.kind
            ))),
        }
    }

    /// Deactivate the record on the server.
    ///
    /// The API keeps records around; this sets `state` to `INACTIVE`. Whether
    /// that hides the record depends on the server's policy for the kind.
    #[tracing::instrument(skip(self, session), fields(kind = %self.kind))]
    pub async fn delete(&mut self, session: Option<&Session>) -> Result<&mut Self> {
        let session = self.resolve_session(session)?;
        let id = self.require_id()?;
        let payload = session
            .delete(self.kind.resource_name(), &id, &json!({ "state": "INACTIVE" }))
            .await?;
        self.reinitialize(payload, &session)?;
        Ok(self)
    }

    /// Change log entries for this record.
    ///
    /// Use [`PaginationParams::history`] for the server's customary
    /// defaults (offset 0, limit 100, sorted by `date.asc`).
    pub async fn history(
        &self,
        session: Option<&Session>,
        params: &PaginationParams,
    ) -> Result<Vec<Value>> {
        let session = self.resolve_session(session)?;
        let id = self.require_id()?;
        let path = format!(
            "{}/{}/history",
            self.kind.resource_name(),
            urlencoding::encode(&id)
        );

        match session.get_with_query(&path, params).await? {
            Resource::Raw(Value::Array(entries)) => Ok(entries),
            Resource::Records(models) => Ok(models.iter().map(Model::to_json).collect()),
            _ => Err(AtomxError::UnexpectedResponse(
                "history response is not a list".to_string(),
            )),
        }
    }

    /// Store a server-provided value without marking it dirty.
    pub(crate) fn absorb(&mut self, name: &str, value: Value) {
        let field = Field::from_api(name, value);
        self.attributes.insert(name.to_string(), field);
    }

    /// The explicitly passed session, or the attached one.
    pub(crate) fn resolve_session(&self, session: Option<&Session>) -> Result<Session> {
        session
            .cloned()
            .or_else(|| self.session())
            .ok_or(AtomxError::NoSession)
    }

    pub(crate) fn require_id(&self) -> Result<String> {
        self.id().ok_or_else(|| {
            AtomxError::ModelNotFound(format!("{} record has no id", self.kind))
        })
    }

    fn reinitialize(&mut self, payload: Value, session: &Session) -> Result<()> {
        self.attributes = parse_attributes(self.kind, payload)?;
        self.dirty.clear();
        self.fetched.clear();
        self.session = Some(session.downgrade());
        Ok(())
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

fn parse_attributes(kind: ModelKind, payload: Value) -> Result<BTreeMap<String, Field>> {
    let object: Map<String, Value> = match payload {
        Value::Object(object) => object,
        other => {
            return Err(AtomxError::UnexpectedResponse(format!(
                "expected a {kind} object, got {other}"
            )))
        }
    };

    Ok(object
        .into_iter()
        .map(|(name, value)| {
            let field = Field::from_api(&name, value);
            (name, field)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn creative() -> Model {
        Model::with_attributes(
            ModelKind::Creative,
            [
                ("id", json!(5)),
                ("title", json!("Banner")),
                ("sizes", json!([1, 2])),
                ("created_at", json!("2015-06-18 09:20:18")),
            ],
        )
    }

    #[test]
    fn test_unchanged_assignment_is_not_dirty() {
        let mut model = creative();
        assert!(!model.set_field("title", "Banner"));
        assert!(!model.is_dirty());

        assert!(model.set_field("title", "Skyscraper"));
        assert_eq!(model.dirty_fields().collect::<Vec<_>>(), vec!["title"]);
    }

    #[test]
    fn test_new_attribute_is_dirty() {
        let mut model = creative();
        assert!(model.set_field("budget", 100_i64));
        assert!(model.dirty_fields().any(|f| f == "budget"));
    }

    #[test]
    fn test_assigning_same_timestamp_string_is_not_dirty() {
        let mut model = creative();
        assert!(!model.set_field("created_at", "2015-06-18 09:20:18"));
        assert_eq!(
            model.field("created_at").and_then(Field::as_timestamp),
            Some(&Utc.with_ymd_and_hms(2015, 6, 18, 9, 20, 18).unwrap())
        );
    }

    #[test]
    fn test_dirty_json_contains_only_changes() {
        let mut model = creative();
        model.set_field("title", "Skyscraper");
        assert_eq!(model.dirty_json(), json!({"title": "Skyscraper"}));
    }

    #[test]
    fn test_remove_field_resets_and_marks_dirty() {
        let mut model = creative();
        model.remove_field("sizes");
        model.remove_field("title");
        model.remove_field("unknown");

        assert_eq!(model.field("sizes"), Some(&Field::Value(json!([]))));
        assert_eq!(model.field("title"), Some(&Field::Value(Value::Null)));
        assert_eq!(
            model.dirty_json(),
            json!({"sizes": [], "title": null, "unknown": null})
        );
    }

    #[test]
    fn test_equality_by_id() {
        let a = Model::with_attributes(ModelKind::Site, [("id", json!(1)), ("name", json!("a"))]);
        let b = Model::with_attributes(ModelKind::Site, [("id", json!(1)), ("name", json!("b"))]);
        let c = Model::with_attributes(ModelKind::Site, [("id", json!(2))]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_idless_records_never_equal() {
        let a = Model::new(ModelKind::Site);
        let b = Model::new(ModelKind::Site);
        assert_ne!(a, b);
        assert_ne!(a, a.clone());
    }

    #[test]
    fn test_to_json_collapses_relations() {
        let mut model = creative();
        let advertiser = Model::with_attributes(ModelKind::Advertiser, [("id", json!(3))]);
        model.set_field("advertiser", advertiser);
        let json = model.to_json();
        assert_eq!(json["advertiser"], json!(3));
        assert_eq!(json["created_at"], json!("2015-06-18 09:20:18"));
    }

    #[tokio::test]
    async fn test_get_field_without_session_is_local() {
        let mut model = creative();
        assert_eq!(model.get_field("missing").await.unwrap(), None);
        // Relation ids stay in place when nothing can expand them
        assert_eq!(
            model.get_field("sizes").await.unwrap(),
            Some(&Field::Value(json!([1, 2])))
        );
    }

    #[tokio::test]
    async fn test_persistence_requires_session() {
        let mut model = creative();
        assert!(matches!(model.save(None).await, Err(AtomxError::NoSession)));
        assert!(matches!(model.create(None).await, Err(AtomxError::NoSession)));
        assert!(matches!(model.reload(None).await, Err(AtomxError::NoSession)));
    }

    #[tokio::test]
    async fn test_reload_requires_id() {
        let session = Session::new("e", "p", "http://127.0.0.1:9").unwrap();
        let mut model = Model::new(ModelKind::Profile);
        let err = model.reload(Some(&session)).await.unwrap_err();
        assert!(matches!(err, AtomxError::ModelNotFound(_)));
    }

    #[tokio::test]
    async fn test_dropped_session_detaches_record() {
        let session = Session::new("e", "p", "http://127.0.0.1:9").unwrap();
        let mut model = creative();
        model.attach(&session);
        assert!(model.session().is_some());
        drop(session);
        assert!(model.session().is_none());
        assert!(matches!(model.save(None).await, Err(AtomxError::NoSession)));
    }

    #[test]
    fn test_from_api_rejects_non_objects() {
        let err = Model::from_api(ModelKind::Site, json!([1]), None).unwrap_err();
        assert!(matches!(err, AtomxError::UnexpectedResponse(_)));
    }
}
