//! Error types for Atomx API operations.

use thiserror::Error;

/// Errors that can occur during Atomx API operations.
#[derive(Debug, Error)]
pub enum AtomxError {
    /// Configuration is missing or incomplete.
    #[error("Atomx configuration required: {0}")]
    ConfigMissing(String),

    /// The login endpoint rejected the email/password pair (HTTP 401).
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// API request failed.
    #[error("Atomx API error: {message}")]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    /// A name did not resolve to a known model, or an operation needed an id
    /// the record does not have.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The operation needs a session and none is attached or passed in.
    #[error("No session attached to the record")]
    NoSession,

    /// Report content was requested before the report finished.
    #[error("Report '{id}' is not ready yet")]
    ReportNotReady { id: String },

    /// The server finished the report with an error.
    #[error("Report '{id}' failed: {message}")]
    ReportFailed { id: String, message: String },

    /// Table rendering requested from a build without the `table` feature.
    #[error("Report tables require the `table` feature")]
    TableSupportMissing,

    /// Lazily fetching a record attribute failed.
    #[error("Failed to resolve attribute '{field}': {source}")]
    AttributeError {
        field: String,
        source: Box<AtomxError>,
    },

    /// The server answered with a body that does not have the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("Failed to parse response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    /// Report content could not be read as tab-delimited rows.
    #[error("Failed to parse report content: {0}")]
    CsvError(#[from] csv::Error),
}

/// Result type alias for Atomx operations.
pub type Result<T> = core::result::Result<T, AtomxError>;
