//! Human-readable output for records and reports.
//!
//! Provides the [`PrettyPrint`] trait for key-value display and
//! [`ReportTable`], the labeled form of report content.

use crate::error::Result;
use crate::models::{Field, Model, Report};

/// Trait for human-readable key-value output.
pub trait PrettyPrint {
    /// Returns a formatted string for terminal display.
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for Model {
    fn pretty_print(&self) -> String {
        let header = match self.id() {
            Some(id) => format!("{} #{}", self.kind(), id),
            None => format!("{} (unsaved)", self.kind()),
        };
        let width = self.fields().map(|(name, _)| name.len()).max().unwrap_or(0);
        let divider = "─".repeat(header.len().max(30));

        let mut lines = vec![header, divider];
        for (name, field) in self.fields() {
            let marker = if self.dirty_fields().any(|d| d == name) { "*" } else { " " };
            lines.push(format!("{marker}{name:<width$}  {}", display_field(field)));
        }

        lines.join("\n")
    }
}

impl PrettyPrint for Report {
    fn pretty_print(&self) -> String {
        let header = format!("Report {}", self.id().unwrap_or_default());
        let divider = "─".repeat(header.len().max(30));

        let mut lines = vec![
            header,
            divider,
            format!("Status:         {:?}", self.status()),
        ];

        if let Some(lines_count) = self.lines() {
            lines.push(format!("Lines:          {}", lines_count));
        }

        let columns = self.query().columns();
        if !columns.is_empty() {
            lines.push(format!("Columns:        {}", columns.join(", ")));
        }

        if let Some(duration) = self.duration() {
            lines.push(format!("Duration:       {:.1}s", duration));
        }

        if let Some(error) = self.error() {
            lines.push(format!("Error:          {}", error));
        }

        lines.join("\n")
    }
}

fn display_field(field: &Field) -> String {
    match field {
        Field::Value(value) => value.to_string(),
        Field::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        Field::Record(model) => format!("{} #{}", model.kind(), model.id().unwrap_or_default()),
        Field::Records(models) => {
            let ids: Vec<_> = models.iter().filter_map(Model::id).collect();
            format!("[{}]", ids.join(", "))
        }
    }
}

/// Report content labeled with the query's groups and sums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTable {
    /// Column labels.
    pub columns: Vec<String>,
    /// Content rows, in server order.
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Values of one column, by label.
    pub fn column(&self, label: &str) -> Option<Vec<&str>> {
        let index = self.columns.iter().position(|c| c == label)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }

    /// Render as a text grid.
    ///
    /// # Errors
    ///
    /// Returns [`TableSupportMissing`](crate::AtomxError::TableSupportMissing) when the crate is built
    /// without the `table` feature.
    pub fn render(&self) -> Result<String> {
        #[cfg(feature = "table")]
        {
            Ok(self.to_string())
        }
        #[cfg(not(feature = "table"))]
        {
            Err(crate::AtomxError::TableSupportMissing)
        }
    }
}

#[cfg(feature = "table")]
impl std::fmt::Display for ReportTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use tabled::builder::Builder;

        let records = std::iter::once(self.columns.clone()).chain(self.rows.iter().cloned());
        let table = Builder::from_iter(records).build();
        write!(f, "{table}")
    }
}
