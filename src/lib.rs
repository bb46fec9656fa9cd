//! Atomx API client library.
//!
//! A Rust library for the Atomx advertising-platform REST API: login,
//! resource CRUD, search and asynchronous reports.
//!
//! # Quick Start
//!
//! ```no_run
//! use atomx::{PrettyPrint, ReportRequest, Session};
//! use chrono::{Duration, Utc};
//!
//! #[tokio::main]
//! async fn main() -> atomx::Result<()> {
//!     // Credentials from ATOMX_EMAIL / ATOMX_PASSWORD
//!     let session = Session::from_env()?;
//!     session.login(None, None).await?;
//!
//!     // Fetch five creatives
//!     let creatives = session
//!         .get_with_query("creatives", &[("limit", "5")])
//!         .await?
//!         .into_records()
//!         .unwrap_or_default();
//!
//!     // Change one field and send only that field back
//!     if let Some(mut creative) = creatives.into_iter().next() {
//!         creative.set_field("title", "Summer banner");
//!         creative.save(None).await?;
//!         println!("{}", creative.pretty_print());
//!     }
//!
//!     // Submit a report and poll until it is ready
//!     let mut report = session
//!         .report(
//!             ReportRequest::new("advertiser", Utc::now() - Duration::days(1))
//!                 .groups(["hour"])
//!                 .sums(["impressions"]),
//!         )
//!         .await?;
//!     while !report.is_ready().await? {
//!         tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!     }
//!     println!("{}", report.content().await?);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`Session`] - credentials, HTTP channel and raw resource requests
//! - [`Model`] - a generic record tagged with a [`ModelKind`]; tracks dirty
//!   fields and lazily fetches missing ones through its session
//! - [`Report`] - a submitted report job and its polling state
//! - [`resolve_model_name`] - maps REST resource names to record kinds
//!
//! Records hold a weak reference to the session they were loaded with, or
//! one attached via [`Model::attach`]. Every persistence method also takes
//! an explicit `Option<&Session>` that overrides the attached one.
//!
//! # Configuration
//!
//! [`Session::from_env`] reads:
//!
//! - `ATOMX_EMAIL` (required) - Account email
//! - `ATOMX_PASSWORD` (required) - Account password
//! - `ATOMX_API_URL` (optional) - API root (defaults to `https://api.atomx.com/v1`)
//!
//! # Features
//!
//! - `table` (default) - render [`ReportTable`] with `tabled`; without it
//!   [`ReportTable::render`] fails with [`AtomxError::TableSupportMissing`]
//! - `test-server` - an in-memory mock API for end-to-end tests

mod error;
mod models;
mod output;
mod pagination;
mod resolver;
mod session;

#[cfg(feature = "test-server")]
pub mod mock_server;

// Re-export core types
pub use error::{AtomxError, Result};
pub use pagination::{PaginationParams, DEFAULT_HISTORY_LIMIT, DEFAULT_HISTORY_SORT};
pub use session::{ReportRef, Resource, Session};

// Re-export models
pub use models::{
    Field, Model, ModelKind, Report, ReportQuery, ReportRequest, ReportStatus, ReportTime,
};

// Re-export name resolution and output helpers
pub use output::{PrettyPrint, ReportTable};
pub use resolver::{resolve_attribute_model_name, resolve_model_name};
