//! Atomx record types.

mod field;
mod kind;
mod record;
mod report;

pub use field::Field;
pub use kind::ModelKind;
pub use record::Model;
pub use report::{Report, ReportQuery, ReportRequest, ReportStatus, ReportTime};
