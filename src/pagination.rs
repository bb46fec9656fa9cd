//! Paging and sorting parameters shared by history and report content
//! requests.

use serde::{Deserialize, Serialize};

/// Default number of history entries per request.
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// Default history ordering.
pub const DEFAULT_HISTORY_SORT: &str = "date.asc";

/// Query parameters for offset-paginated, sortable requests.
///
/// Unset fields are left out of the query string so the server applies its
/// own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
    /// Sort expression, e.g. `date.asc` or `impressions.desc`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    /// Maximum number of entries or rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Number of entries or rows to skip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl PaginationParams {
    /// The defaults used for record history: offset 0, limit 100, oldest first.
    #[must_use]
    pub fn history() -> Self {
        Self {
            sort: Some(DEFAULT_HISTORY_SORT.to_string()),
            limit: Some(DEFAULT_HISTORY_LIMIT),
            offset: Some(0),
        }
    }

    /// Set the sort expression.
    #[must_use]
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Set the row limit.
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the row offset.
    #[must_use]
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}
