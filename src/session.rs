//! Atomx API session.
//!
//! Holds the credentials and the authenticated HTTP channel, performs raw
//! requests and turns resource payloads into [`Model`] records. Record-level
//! operations (lazy fields, save, reload) live on the records themselves and
//! call back into the session they are attached to.

use std::collections::BTreeMap;
use std::env;
use std::sync::{Arc, Weak};

use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use url::Url;

use crate::error::{AtomxError, Result};
use crate::models::{Model, ModelKind, Report, ReportRequest};
use crate::pagination::PaginationParams;
use crate::resolver::resolve_model_name;

const DEFAULT_API_URL: &str = "https://api.atomx.com/v1";
const USER_AGENT: &str = concat!("atomx-rust/", env!("CARGO_PKG_VERSION"));

/// An authenticated connection to the Atomx API.
///
/// This struct is cheaply cloneable; clones share credentials and the
/// underlying connection pool. Records keep a weak reference to the session
/// they came from, so dropping the last `Session` detaches them.
///
/// # Example
///
/// ```no_run
/// use atomx::Session;
///
/// # async fn example() -> atomx::Result<()> {
/// // Log in immediately
/// let session = Session::connect("me@example.com", "secret", "https://api.atomx.com/v1").await?;
///
/// // Or configure from the environment and log in later
/// let session = Session::from_env()?;
/// session.login(None, None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    http: Client,
    endpoint: Url,
    credentials: RwLock<Credentials>,
}

struct Credentials {
    email: String,
    password: String,
    auth_token: Option<String>,
}

/// A response payload, typed when its resource name is a known kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    /// A single record.
    Record(Model),
    /// A list of records.
    Records(Vec<Model>),
    /// Anything that does not resolve to a record kind.
    Raw(Value),
}

impl Resource {
    /// The single record, if this is one.
    pub fn into_record(self) -> Option<Model> {
        match self {
            Resource::Record(model) => Some(model),
            _ => None,
        }
    }

    /// The record list, if this is one.
    pub fn into_records(self) -> Option<Vec<Model>> {
        match self {
            Resource::Records(models) => Some(models),
            _ => None,
        }
    }

    /// The raw JSON, if the payload was not typed.
    pub fn into_raw(self) -> Option<Value> {
        match self {
            Resource::Raw(value) => Some(value),
            _ => None,
        }
    }
}

/// Anything that identifies a report: a [`Report`] or its id.
pub trait ReportRef {
    /// The report id.
    ///
    /// # Errors
    ///
    /// Returns [`AtomxError::ModelNotFound`] for a report without an id.
    fn report_id(&self) -> Result<String>;
}

impl ReportRef for str {
    fn report_id(&self) -> Result<String> {
        Ok(self.to_string())
    }
}

impl ReportRef for String {
    fn report_id(&self) -> Result<String> {
        Ok(self.clone())
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    auth_tkt: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.inner.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session from environment variables.
    ///
    /// Uses `ATOMX_EMAIL` and `ATOMX_PASSWORD` for the credentials and
    /// optionally `ATOMX_API_URL` for the endpoint (defaults to
    /// `https://api.atomx.com/v1`). The session is not logged in yet.
    ///
    /// # Errors
    ///
    /// Returns an error if `ATOMX_EMAIL` or `ATOMX_PASSWORD` is not set.
    pub fn from_env() -> Result<Self> {
        let email = env::var("ATOMX_EMAIL").map_err(|_| {
            AtomxError::ConfigMissing("ATOMX_EMAIL environment variable not set".to_string())
        })?;
        let password = env::var("ATOMX_PASSWORD").map_err(|_| {
            AtomxError::ConfigMissing("ATOMX_PASSWORD environment variable not set".to_string())
        })?;

        let endpoint = env::var("ATOMX_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        Self::new(&email, &password, &endpoint)
    }

    /// Create a session without logging in.
    ///
    /// # Arguments
    ///
    /// * `email` - Account email
    /// * `password` - Account password
    /// * `endpoint` - API root including the version (e.g. `https://api.atomx.com/v1`)
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL.
    pub fn new(email: &str, password: &str, endpoint: &str) -> Result<Self> {
        // Ensure endpoint ends with /
        let endpoint_str = format!("{}/", endpoint.trim_end_matches('/'));
        let endpoint = Url::parse(&endpoint_str)?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .brotli(true)
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(AtomxError::HttpError)?;

        Ok(Self {
            inner: Arc::new(SessionInner {
                http,
                endpoint,
                credentials: RwLock::new(Credentials {
                    email: email.to_string(),
                    password: password.to_string(),
                    auth_token: None,
                }),
            }),
        })
    }

    /// Create a session and log in.
    ///
    /// # Errors
    ///
    /// Returns [`AtomxError::InvalidCredentials`] if the server rejects the
    /// credentials, or any error from [`Session::new`].
    pub async fn connect(email: &str, password: &str, endpoint: &str) -> Result<Self> {
        let session = Self::new(email, password, endpoint)?;
        session.login(None, None).await?;
        Ok(session)
    }

    /// The API root every request path is joined onto.
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// The email the session logs in with.
    pub async fn email(&self) -> String {
        self.inner.credentials.read().await.email.clone()
    }

    /// The token returned by the last successful login.
    pub async fn auth_token(&self) -> Option<String> {
        self.inner.credentials.read().await.auth_token.clone()
    }

    pub(crate) fn downgrade(&self) -> Weak<SessionInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_weak(weak: &Weak<SessionInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Authenticate and store the session token.
    ///
    /// Replaces the stored email and/or password when given.
    ///
    /// # Errors
    ///
    /// Returns [`AtomxError::InvalidCredentials`] on HTTP 401 and
    /// [`AtomxError::ApiError`] for any other failure status.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: Option<&str>, password: Option<&str>) -> Result<()> {
        let (email, password) = {
            let mut credentials = self.inner.credentials.write().await;
            if let Some(email) = email {
                credentials.email = email.to_string();
            }
            if let Some(password) = password {
                credentials.password = password.to_string();
            }
            (credentials.email.clone(), credentials.password.clone())
        };

        // No credentials lock is held across the request.
        let url = self.url("login")?;
        let response = self
            .inner
            .http
            .post(url)
            .json(&LoginRequest {
                email: &email,
                password: &password,
            })
            .send()
            .await
            .map_err(AtomxError::HttpError)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(AtomxError::InvalidCredentials);
        }

        let response = Self::check_response(response).await?;
        let login: LoginResponse = response.json().await.map_err(AtomxError::HttpError)?;
        self.inner.credentials.write().await.auth_token = Some(login.auth_tkt);
        Ok(())
    }

    /// Invalidate the session on the server.
    ///
    /// Best effort: failures are logged and otherwise ignored. The stored
    /// token is always discarded.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self) {
        let result = match self.request(Method::GET, "logout").await {
            Ok(builder) => Self::send(builder).await.map(drop),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "logout failed");
        }
        self.inner.credentials.write().await.auth_token = None;
    }

    /// Search across resources.
    ///
    /// Result lists whose key names a known kind become records; other keys
    /// are passed through as raw JSON.
    #[tracing::instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<BTreeMap<String, Resource>> {
        let builder = self.request(Method::GET, "search").await?.query(&[("q", query)]);
        let mut body = Self::read_json(Self::send(builder).await?).await?;

        let hits = match body.get_mut("search").map(Value::take) {
            Some(Value::Object(hits)) => hits,
            _ => {
                return Err(AtomxError::UnexpectedResponse(
                    "search response has no 'search' object".to_string(),
                ))
            }
        };

        let mut results = BTreeMap::new();
        for (key, value) in hits {
            let resource = match resolve_model_name(&key) {
                Some(kind) => self.wrap(kind, value)?,
                None => Resource::Raw(value),
            };
            results.insert(key, resource);
        }
        Ok(results)
    }

    /// GET a resource path and type the payload.
    ///
    /// The response's `resource` field decides whether the payload is
    /// wrapped into records; names that do not resolve come back raw.
    pub async fn get(&self, path: &str) -> Result<Resource> {
        self.get_inner(path, None::<&()>).await
    }

    /// GET a resource path with query filters (e.g. `[("limit", "5")]`).
    pub async fn get_with_query<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<Resource> {
        self.get_inner(path, Some(query)).await
    }

    /// POST a new resource and return the raw fields of the created resource.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        self.send_payload(Method::POST, path, body, None::<&()>).await
    }

    /// POST with additional query parameters.
    pub async fn post_with_query<B, Q>(&self, path: &str, body: &B, query: &Q) -> Result<Value>
    where
        B: Serialize + ?Sized,
        Q: Serialize + ?Sized,
    {
        self.send_payload(Method::POST, path, body, Some(query)).await
    }

    /// PUT changes to `<path>/<id>` and return the raw fields of the updated
    /// resource.
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, id: &str, body: &B) -> Result<Value> {
        let path = member_path(path, id);
        self.send_payload(Method::PUT, &path, body, None::<&()>).await
    }

    /// PUT with additional query parameters.
    pub async fn put_with_query<B, Q>(
        &self,
        path: &str,
        id: &str,
        body: &B,
        query: &Q,
    ) -> Result<Value>
    where
        B: Serialize + ?Sized,
        Q: Serialize + ?Sized,
    {
        let path = member_path(path, id);
        self.send_payload(Method::PUT, &path, body, Some(query)).await
    }

    /// Deactivate a resource.
    ///
    /// The API has no hard delete; this PUTs the given deactivation payload
    /// to `<path>/<id>` and returns the raw fields the server answers with.
    pub async fn delete<B: Serialize + ?Sized>(
        &self,
        path: &str,
        id: &str,
        body: &B,
    ) -> Result<Value> {
        self.put(path, id, body).await
    }

    /// Submit a report request.
    ///
    /// A missing `to` defaults to the current time.
    #[tracing::instrument(skip(self, request), fields(scope = %request.scope))]
    pub async fn report(&self, request: ReportRequest) -> Result<Report> {
        let request = request.with_default_to(Utc::now());
        let builder = self.request(Method::POST, "report").await?.json(&request);
        let mut body = Self::read_json(Self::send(builder).await?).await?;

        let report = body.get_mut("report").map(Value::take).ok_or_else(|| {
            AtomxError::UnexpectedResponse("report response has no 'report' object".to_string())
        })?;
        let query = body.get_mut("query").map(Value::take).unwrap_or(Value::Null);

        Report::from_response(self, query, report)
    }

    /// Fetch the raw status JSON of a report.
    #[tracing::instrument(skip(self, report))]
    pub async fn report_status<R: ReportRef + ?Sized>(&self, report: &R) -> Result<Value> {
        let path = report_path(&report.report_id()?);
        let builder = self
            .request(Method::GET, &path)
            .await?
            .query(&[("status", "true")]);
        let mut body = Self::read_json(Self::send(builder).await?).await?;

        if body.get("report").is_some() {
            Ok(body["report"].take())
        } else {
            Ok(body)
        }
    }

    /// Fetch the raw, tab-delimited content of a finished report.
    #[tracing::instrument(skip(self, report))]
    pub async fn report_get<R: ReportRef + ?Sized>(
        &self,
        report: &R,
        params: &PaginationParams,
    ) -> Result<String> {
        let path = report_path(&report.report_id()?);
        let builder = self.request(Method::GET, &path).await?.query(params);
        let response = Self::send(builder).await?;
        response.text().await.map_err(AtomxError::HttpError)
    }

    #[tracing::instrument(skip(self, query))]
    async fn get_inner<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: Option<&Q>,
    ) -> Result<Resource> {
        let mut builder = self.request(Method::GET, path).await?;
        if let Some(query) = query {
            builder = builder.query(query);
        }
        let body = Self::read_json(Self::send(builder).await?).await?;

        let (name, payload) = extract_payload(body)?;
        match resolve_model_name(&name) {
            Some(kind) => self.wrap(kind, payload),
            None => Ok(Resource::Raw(payload)),
        }
    }

    #[tracing::instrument(skip(self, body, query))]
    async fn send_payload<B, Q>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        query: Option<&Q>,
    ) -> Result<Value>
    where
        B: Serialize + ?Sized,
        Q: Serialize + ?Sized,
    {
        let mut builder = self.request(method, path).await?.json(body);
        if let Some(query) = query {
            builder = builder.query(query);
        }
        let body = Self::read_json(Self::send(builder).await?).await?;
        let (_, payload) = extract_payload(body)?;
        Ok(payload)
    }

    /// Wrap a payload into records of the given kind.
    fn wrap(&self, kind: ModelKind, payload: Value) -> Result<Resource> {
        match payload {
            Value::Object(_) => Ok(Resource::Record(Model::from_api(kind, payload, Some(self))?)),
            Value::Array(items) if items.iter().all(Value::is_object) => {
                let models = items
                    .into_iter()
                    .map(|item| Model::from_api(kind, item, Some(self)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Resource::Records(models))
            }
            other => Ok(Resource::Raw(other)),
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.inner.endpoint.join(path.trim_matches('/'))?)
    }

    /// Start a request carrying the session token, if logged in.
    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.url(path)?;
        let mut builder = self.inner.http.request(method, url);
        if let Some(token) = self.inner.credentials.read().await.auth_token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn send(builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(AtomxError::HttpError)?;
        Self::check_response(response).await
    }

    async fn read_json(response: Response) -> Result<Value> {
        response.json().await.map_err(AtomxError::HttpError)
    }

    /// Check response status and convert errors.
    async fn check_response(response: Response) -> Result<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let message = Self::extract_error_message(response, status).await;
        Err(AtomxError::ApiError {
            message,
            status_code: Some(status.as_u16()),
        })
    }

    /// Extract error message from a failed response.
    async fn extract_error_message(response: Response, status: StatusCode) -> String {
        let body = match response.text().await {
            Ok(b) => b,
            Err(_) => return format!("HTTP {status}"),
        };

        // Try to parse as JSON and extract the error field
        if let Ok(json) = serde_json::from_str::<Value>(&body) {
            if let Some(err) = json.get("error").and_then(|m| m.as_str()) {
                return err.to_string();
            }
            if let Some(msg) = json.get("message").and_then(|m| m.as_str()) {
                return msg.to_string();
            }
        }

        if body.is_empty() {
            format!("HTTP {status}")
        } else {
            body
        }
    }
}

/// Split a resource response into its resource name and payload.
///
/// The payload lives under the resource name, or its plural for lists.
fn extract_payload(mut body: Value) -> Result<(String, Value)> {
    let name = body
        .get("resource")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            AtomxError::UnexpectedResponse("response has no 'resource' field".to_string())
        })?;

    let plural = format!("{name}s");
    let payload = body
        .get_mut(name.as_str())
        .map(Value::take)
        .or_else(|| body.get_mut(plural.as_str()).map(Value::take))
        .ok_or_else(|| {
            AtomxError::UnexpectedResponse(format!("response has no '{name}' payload"))
        })?;

    Ok((name, payload))
}

fn member_path(path: &str, id: &str) -> String {
    format!("{}/{}", path.trim_matches('/'), urlencoding::encode(id))
}

fn report_path(id: &str) -> String {
    format!("report/{}", urlencoding::encode(id))
}
