use fhir::FhirError;
use pdoc_files::FilesError;
use serde::Serialize;
use std::fmt;

/// Pipeline stage a failure is attributed to.
///
/// Callers report this instead of a raw error so a user can tell "we could not find you" from
/// "we could not print" from "we could not file the letter".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Configuration,
    Lookup,
    Assembly,
    Render,
    Upload,
    Download,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Configuration => "configuration",
            Stage::Lookup => "lookup",
            Stage::Assembly => "assembly",
            Stage::Render => "render",
            Stage::Upload => "upload",
            Stage::Download => "download",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("patient not found: {0}")]
    PatientNotFound(String),
    #[error("invalid clinical record: {0}")]
    InvalidRecord(String),
    #[error("record source failure: {0}")]
    Source(#[source] FhirError),

    #[error("malformed timestamp '{value}' in {series} series")]
    MalformedTimestamp { series: String, value: String },
    #[error("missing identifier: {0}")]
    MissingIdentifier(String),
    #[error("conflicting units for {label}: {units:?}")]
    ConflictingUnit { label: String, units: Vec<String> },

    #[error("rendering failed: {0}")]
    Rendering(String),

    #[error("failed to stage scratch file: {0}")]
    Scratch(#[source] std::io::Error),
    #[error("upload of '{key}' to container '{container}' failed: {source}")]
    StorageUploadFailure {
        container: String,
        key: String,
        #[source]
        source: FilesError,
    },

    #[error("artifact not found: {container}/{key}")]
    ArtifactNotFound { container: String, key: String },
    #[error("failed to read artifact: {0}")]
    StorageRead(#[source] FilesError),

    #[error("{stage} stage timed out: {detail}")]
    Timeout { stage: Stage, detail: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid text catalog: {0}")]
    Catalog(String),
}

impl DocumentError {
    /// The stage this failure belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            DocumentError::PatientNotFound(_)
            | DocumentError::InvalidRecord(_)
            | DocumentError::Source(_) => Stage::Lookup,
            DocumentError::MalformedTimestamp { .. }
            | DocumentError::MissingIdentifier(_)
            | DocumentError::ConflictingUnit { .. } => Stage::Assembly,
            DocumentError::Rendering(_) => Stage::Render,
            DocumentError::Scratch(_) | DocumentError::StorageUploadFailure { .. } => Stage::Upload,
            DocumentError::ArtifactNotFound { .. } | DocumentError::StorageRead(_) => {
                Stage::Download
            }
            DocumentError::Timeout { stage, .. } => *stage,
            DocumentError::InvalidConfig(_) | DocumentError::Catalog(_) => Stage::Configuration,
        }
    }

    /// Short machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentError::PatientNotFound(_) => "patient_not_found",
            DocumentError::InvalidRecord(_) => "invalid_record",
            DocumentError::Source(_) => "source_unavailable",
            DocumentError::MalformedTimestamp { .. } => "malformed_timestamp",
            DocumentError::MissingIdentifier(_) => "missing_identifier",
            DocumentError::ConflictingUnit { .. } => "conflicting_unit",
            DocumentError::Rendering(_) => "rendering_failure",
            DocumentError::Scratch(_) => "scratch_failure",
            DocumentError::StorageUploadFailure { .. } => "storage_upload_failure",
            DocumentError::ArtifactNotFound { .. } => "artifact_not_found",
            DocumentError::StorageRead(_) => "storage_read_failure",
            DocumentError::Timeout { .. } => "timeout",
            DocumentError::InvalidConfig(_) => "invalid_config",
            DocumentError::Catalog(_) => "invalid_catalog",
        }
    }

    /// True when repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DocumentError::Source(_)
                | DocumentError::Scratch(_)
                | DocumentError::StorageUploadFailure { .. }
                | DocumentError::StorageRead(_)
                | DocumentError::Timeout { .. }
        )
    }
}

impl From<FhirError> for DocumentError {
    fn from(err: FhirError) -> Self {
        match err {
            FhirError::NotFound { id, .. } => DocumentError::PatientNotFound(id),
            FhirError::Timeout(detail) => DocumentError::Timeout {
                stage: Stage::Lookup,
                detail,
            },
            FhirError::InvalidInput(msg) | FhirError::Translation(msg) => {
                DocumentError::InvalidRecord(msg)
            }
            FhirError::InvalidJson(e) => DocumentError::InvalidRecord(e.to_string()),
            FhirError::InvalidId(e) => DocumentError::InvalidRecord(e.to_string()),
            other @ (FhirError::Io(_) | FhirError::Transport(_)) => DocumentError::Source(other),
        }
    }
}

pub type DocumentResult<T> = std::result::Result<T, DocumentError>;
