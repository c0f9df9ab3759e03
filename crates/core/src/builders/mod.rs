//! Document model builders.
//!
//! One builder per [`DocumentKind`]. A builder borrows everything it needs (patient data, text
//! catalog section, chart renderer) and performs no I/O; `build` is deterministic for the same
//! inputs.

mod feedback;
mod health_report;
mod patient_info;

pub use feedback::FeedbackDocument;
pub use health_report::HealthReportDocument;
pub use patient_info::PatientInfoDocument;

use crate::document::{DocumentKind, DocumentModel};
use crate::DocumentResult;

/// Shared capability of the three document variants.
pub trait DocumentBuilder {
    fn kind(&self) -> DocumentKind;

    /// Assemble the ordered document model.
    fn build(&self) -> DocumentResult<DocumentModel>;
}

/// Join the non-blank parts with single spaces.
pub(crate) fn join_words<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    join_with(" ", parts)
}

/// Join the trimmed, non-blank parts with `separator`.
pub(crate) fn join_with<'a>(separator: &str, parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}
