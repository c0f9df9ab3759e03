//! FHIR wire/boundary support for patient document generation.
//!
//! This crate provides **wire models**, **translation helpers** and **record sources** for the
//! clinical data a patient document is built from:
//! - FHIR R4 JSON `Patient`, `Observation` and `Bundle` resources
//! - strongly typed domain records ([`PatientRecord`], [`Observation`]) produced at the boundary
//! - the [`RecordSource`] trait plus file, HTTP and in-memory implementations
//!
//! Records that are missing fields the document pipeline depends on are rejected here with a
//! typed [`FhirError`], so nothing downstream has to inspect loosely-typed JSON.

pub mod bundle;
mod datatypes;
pub mod http;
pub mod observation;
pub mod patient;
pub mod source;

// Re-export public domain-level types
pub use bundle::Bundle;
pub use http::HttpRecordSource;
pub use observation::{Observation, ObservationComponent};
pub use patient::{ContactPoint, Identifier, PatientIdentity, PatientRecord, PersonName, PostalAddress};
pub use source::{FileRecordSource, InMemoryRecordSource, RecordSource};

/// Observation category code of vital-sign readings.
pub const VITAL_SIGNS_CATEGORY: &str = "vital-signs";

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("invalid patient id: {0}")]
    InvalidId(#[from] pdoc_types::TypesError),

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("record source timed out: {0}")]
    Timeout(String),

    #[error("record source transport error: {0}")]
    Transport(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;

/// Deserialise a JSON document into a wire struct, reporting the failing field path.
///
/// This uses `serde_path_to_error` to surface a best-effort "path" (e.g. `component[0].code`)
/// to the failing field when the JSON does not match the wire schema.
pub(crate) fn from_json_value<T>(value: serde_json::Value, what: &str) -> FhirResult<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        FhirError::Translation(format!("{what} schema mismatch at {path}: {source}"))
    })
}

/// Parse JSON text and check the `resourceType` discriminator before translation.
pub(crate) fn parse_resource_text(json_text: &str, expected: &str) -> FhirResult<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(json_text)?;
    check_resource_type(&value, expected)?;
    Ok(value)
}

pub(crate) fn check_resource_type(value: &serde_json::Value, expected: &str) -> FhirResult<()> {
    match value.get("resourceType").and_then(serde_json::Value::as_str) {
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(FhirError::InvalidInput(format!(
            "Expected resourceType '{expected}', got '{found}'"
        ))),
        None => Err(FhirError::InvalidInput(format!(
            "Expected resourceType '{expected}', but resourceType is missing"
        ))),
    }
}
