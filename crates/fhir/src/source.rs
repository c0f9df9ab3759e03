//! Clinical record sources.
//!
//! A [`RecordSource`] answers the two questions document generation asks of a clinical system:
//! who is this patient, and what has been observed about them. Implementations:
//! - [`FileRecordSource`]: FHIR JSON exported to a directory tree
//! - [`crate::HttpRecordSource`]: a FHIR REST server
//! - [`InMemoryRecordSource`]: fixtures for tests and dry runs

use crate::bundle::Bundle;
use crate::observation::Observation;
use crate::patient::PatientRecord;
use crate::{FhirError, FhirResult};
use pdoc_types::PatientId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File name of the patient resource within a patient directory.
pub const PATIENT_FILE_NAME: &str = "patient.json";

/// File name of the observation bundle within a patient directory.
pub const OBSERVATIONS_FILE_NAME: &str = "observations.json";

/// Read access to a clinical record system.
///
/// Both operations return [`FhirError::NotFound`] when the source has no such patient, which
/// callers must keep distinct from transport failures.
pub trait RecordSource: Send + Sync {
    /// Fetch the patient's demographics.
    fn patient(&self, id: &PatientId) -> FhirResult<PatientRecord>;

    /// Fetch the patient's observations in source order.
    fn observations(&self, id: &PatientId) -> FhirResult<Vec<Observation>>;
}

// ============================================================================
// FileRecordSource
// ============================================================================

/// Reads FHIR JSON from `<root>/<patient id>/patient.json` and
/// `<root>/<patient id>/observations.json` (a searchset bundle).
#[derive(Clone, Debug)]
pub struct FileRecordSource {
    root: PathBuf,
}

impl FileRecordSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn patient_dir(&self, id: &PatientId, resource: &'static str) -> FhirResult<PathBuf> {
        let dir = self.root.join(id.as_str());
        if !dir.is_dir() {
            return Err(FhirError::NotFound {
                resource,
                id: id.to_string(),
            });
        }
        Ok(dir)
    }
}

impl RecordSource for FileRecordSource {
    fn patient(&self, id: &PatientId) -> FhirResult<PatientRecord> {
        let path = self.patient_dir(id, "Patient")?.join(PATIENT_FILE_NAME);
        if !path.is_file() {
            return Err(FhirError::NotFound {
                resource: "Patient",
                id: id.to_string(),
            });
        }

        let text = std::fs::read_to_string(&path)?;
        let record = PatientRecord::parse(&text)?;
        if &record.id != id {
            return Err(FhirError::InvalidInput(format!(
                "{} contains patient '{}', expected '{id}'",
                path.display(),
                record.id
            )));
        }
        Ok(record)
    }

    /// A patient directory without an observation bundle has no observations.
    fn observations(&self, id: &PatientId) -> FhirResult<Vec<Observation>> {
        let path = self.patient_dir(id, "Observation")?.join(OBSERVATIONS_FILE_NAME);
        if !path.is_file() {
            return Ok(Vec::new());
        }

        let text = std::fs::read_to_string(&path)?;
        Ok(Bundle::parse(&text)?.observations)
    }
}

// ============================================================================
// InMemoryRecordSource
// ============================================================================

/// Record source backed by in-process maps.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRecordSource {
    patients: HashMap<PatientId, PatientRecord>,
    observations: HashMap<PatientId, Vec<Observation>>,
}

impl InMemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a patient. The patient starts with no observations.
    pub fn with_patient(mut self, record: PatientRecord) -> Self {
        self.observations.entry(record.id.clone()).or_default();
        self.patients.insert(record.id.clone(), record);
        self
    }

    /// Set the observations for a patient id.
    pub fn with_observations(mut self, id: PatientId, observations: Vec<Observation>) -> Self {
        self.observations.insert(id, observations);
        self
    }
}

impl RecordSource for InMemoryRecordSource {
    fn patient(&self, id: &PatientId) -> FhirResult<PatientRecord> {
        self.patients.get(id).cloned().ok_or_else(|| FhirError::NotFound {
            resource: "Patient",
            id: id.to_string(),
        })
    }

    fn observations(&self, id: &PatientId) -> FhirResult<Vec<Observation>> {
        self.observations
            .get(id)
            .cloned()
            .ok_or_else(|| FhirError::NotFound {
                resource: "Observation",
                id: id.to_string(),
            })
    }
}
