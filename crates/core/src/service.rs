//! Document pipeline service.
//!
//! [`DocumentService`] wires the resolved [`CoreConfig`] to the collaborators (record source,
//! chart renderer, document renderer, blob store) and runs the pipeline for each document kind:
//!
//! ```text
//! lookup ──► extract/aggregate ──► build model ──► render ──► upload
//! ```
//!
//! Data-only operations stop after lookup/aggregation and return the structured data that would
//! go into the document. Generate operations run the whole pipeline and return the stored
//! artifact alongside that data.
//!
//! ## Pure Data Operations
//!
//! This module contains **only** pipeline operations, no API concerns such as HTTP status codes
//! or request parsing. API-level logic belongs in `api-rest`.

use crate::builders::{DocumentBuilder, FeedbackDocument, HealthReportDocument, PatientInfoDocument};
use crate::catalog::FeedbackQuestionSet;
use crate::chart::ChartRenderer;
use crate::config::CoreConfig;
use crate::document::{DocumentKind, DocumentModel};
use crate::error::Stage;
use crate::persister::{ArtifactPersister, StoredArtifact};
use crate::render::DocumentRenderer;
use crate::vitals::{aggregate, VitalSeriesSet};
use crate::{DocumentError, DocumentResult};
use fhir::{PatientIdentity, PostalAddress, RecordSource};
use pdoc_files::BlobStore;
use pdoc_types::PatientId;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

// ============================================================================
// Response data
// ============================================================================

/// Name fields printed in the feedback greeting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeedbackName {
    pub prefix: String,
    pub first_name: String,
    pub last_name: String,
}

/// Everything that goes into a feedback document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeedbackData {
    pub name: FeedbackName,
    pub address: PostalAddress,
    pub questions_and_messages: FeedbackQuestionSet,
}

impl FeedbackData {
    fn new(identity: PatientIdentity, questions: FeedbackQuestionSet) -> Self {
        Self {
            name: FeedbackName {
                prefix: identity.prefix,
                first_name: identity.first_name,
                last_name: identity.last_name,
            },
            address: identity.address,
            questions_and_messages: questions,
        }
    }
}

/// Vital-sign series as reported to callers.
///
/// Serialises as a JSON object keyed by vital sign in catalog order:
///
/// ```json
/// {"Heart rate": {"Dates": ["2023-01-01"], "Values": [72.0], "Unit": "bpm"}}
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct HealthData(VitalSeriesSet);

impl HealthData {
    pub fn series(&self) -> &VitalSeriesSet {
        &self.0
    }
}

impl Serialize for HealthData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Series<'a>(&'a crate::vitals::VitalSignSeries);

        impl Serialize for Series<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let points = self.0.points();
                let dates: Vec<&str> = points.iter().map(|p| p.timestamp.as_str()).collect();
                let values: Vec<f64> = points.iter().map(|p| p.value).collect();

                let mut state = serializer.serialize_struct("Series", 3)?;
                state.serialize_field("Dates", &dates)?;
                state.serialize_field("Values", &values)?;
                state.serialize_field("Unit", self.0.unit())?;
                state.end()
            }
        }

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for series in &self.0 {
            map.serialize_entry(series.label(), &Series(series))?;
        }
        map.end()
    }
}

/// Result of a generate-and-store operation.
#[derive(Clone, Debug, Serialize)]
pub struct Generated<T> {
    pub data: T,
    pub artifact: StoredArtifact,
}

/// A previously stored artifact, downloaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedArtifact {
    pub name: String,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

// ============================================================================
// Deadline
// ============================================================================

/// Per-request time budget, checked between pipeline stages.
#[derive(Clone, Copy, Debug)]
struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    /// Fail with [`DocumentError::Timeout`] if the budget is spent before `stage` starts.
    fn check(&self, stage: Stage) -> DocumentResult<()> {
        let elapsed = self.started.elapsed();
        if elapsed > self.limit {
            return Err(DocumentError::Timeout {
                stage,
                detail: format!(
                    "request exceeded {}s before {stage} ({}ms elapsed)",
                    self.limit.as_secs(),
                    elapsed.as_millis()
                ),
            });
        }
        Ok(())
    }
}

// ============================================================================
// DocumentService
// ============================================================================

/// Runs the document pipeline for one patient at a time.
///
/// Cheap to clone; every collaborator is shared behind an `Arc`. Requests share no mutable
/// state, so one service can serve concurrent requests.
#[derive(Clone)]
pub struct DocumentService {
    cfg: Arc<CoreConfig>,
    records: Arc<dyn RecordSource>,
    charts: Arc<dyn ChartRenderer>,
    persister: ArtifactPersister,
}

impl DocumentService {
    /// Creates a new document service.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Core configuration resolved at startup.
    /// * `records` - Clinical record source.
    /// * `charts` - Chart backend used by the health report.
    /// * `renderer` - Document output format.
    /// * `store` - Blob store artifacts are uploaded to.
    pub fn new(
        cfg: Arc<CoreConfig>,
        records: Arc<dyn RecordSource>,
        charts: Arc<dyn ChartRenderer>,
        renderer: Arc<dyn DocumentRenderer>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        let persister = ArtifactPersister::new(renderer, store, cfg.scratch_dir().map(Path::to_path_buf));
        Self {
            cfg,
            records,
            charts,
            persister,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    // ------------------------------------------------------------------------
    // Feedback
    // ------------------------------------------------------------------------

    /// Assemble the data printed on a feedback document, without generating it.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::PatientNotFound`] if the record source has no such patient.
    /// - [`DocumentError::InvalidRecord`] if the record lacks a name or address.
    pub fn feedback_data(&self, patient_id: &PatientId) -> DocumentResult<FeedbackData> {
        let _span = request_span(patient_id, DocumentKind::Feedback).entered();
        let identity = self.lookup_identity(patient_id)?;
        Ok(FeedbackData::new(
            identity,
            self.cfg.catalog().feedback.questions.clone(),
        ))
    }

    /// Generate and store the feedback document.
    ///
    /// # Returns
    ///
    /// The feedback data and the stored artifact (`"{id} feedback request.{ext}"`).
    ///
    /// # Errors
    ///
    /// As [`DocumentService::feedback_data`], plus rendering, upload and timeout failures.
    pub fn generate_feedback(&self, patient_id: &PatientId) -> DocumentResult<Generated<FeedbackData>> {
        let kind = DocumentKind::Feedback;
        let _span = request_span(patient_id, kind).entered();
        let deadline = Deadline::start(self.cfg.request_timeout());

        let identity = self.lookup_identity(patient_id)?;
        deadline.check(Stage::Assembly)?;

        let text = &self.cfg.catalog().feedback;
        let model = FeedbackDocument::new(patient_id, &identity, text).build()?;
        deadline.check(Stage::Render)?;

        let artifact = self.store(kind, patient_id, &model)?;
        Ok(Generated {
            data: FeedbackData::new(identity, text.questions.clone()),
            artifact,
        })
    }

    // ------------------------------------------------------------------------
    // Health report
    // ------------------------------------------------------------------------

    /// Aggregate the patient's vital-sign series, without generating a report.
    ///
    /// Only observations are fetched; the patient record itself is not looked up.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::PatientNotFound`] if the record source has no such patient.
    /// - [`DocumentError::ConflictingUnit`] under [`crate::UnitPolicy::Reject`].
    pub fn health_data(&self, patient_id: &PatientId) -> DocumentResult<HealthData> {
        let _span = request_span(patient_id, DocumentKind::HealthData).entered();
        self.aggregate_vitals(patient_id)
    }

    /// Generate and store the health data report.
    ///
    /// # Errors
    ///
    /// As [`DocumentService::health_data`], plus patient lookup, chart, rendering, upload and
    /// timeout failures. A series with an unreadable timestamp does not fail the report.
    pub fn generate_health_report(&self, patient_id: &PatientId) -> DocumentResult<Generated<HealthData>> {
        let kind = DocumentKind::HealthData;
        let _span = request_span(patient_id, kind).entered();
        let deadline = Deadline::start(self.cfg.request_timeout());

        let record = self.records.patient(patient_id)?;
        let data = self.aggregate_vitals(patient_id)?;
        deadline.check(Stage::Assembly)?;

        let full_name = record.full_name();
        let model = HealthReportDocument::new(
            patient_id,
            &full_name,
            data.series(),
            self.charts.as_ref(),
            &self.cfg.catalog().health_report,
        )
        .build()?;
        deadline.check(Stage::Render)?;

        let artifact = self.store(kind, patient_id, &model)?;
        Ok(Generated { data, artifact })
    }

    // ------------------------------------------------------------------------
    // Patient details
    // ------------------------------------------------------------------------

    /// Assemble the personal details form model, without rendering it.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::PatientNotFound`] if the record source has no such patient.
    /// - [`DocumentError::MissingIdentifier`] if the `DL` or `SS` identifier is absent.
    pub fn patient_info_document(&self, patient_id: &PatientId) -> DocumentResult<DocumentModel> {
        let _span = request_span(patient_id, DocumentKind::PatientInfo).entered();
        let record = self.records.patient(patient_id)?;
        PatientInfoDocument::new(&record, &self.cfg.catalog().patient_info).build()
    }

    /// Generate and store the personal details form.
    ///
    /// Nothing is rendered or uploaded if a required identifier is missing.
    pub fn generate_patient_info(&self, patient_id: &PatientId) -> DocumentResult<StoredArtifact> {
        let kind = DocumentKind::PatientInfo;
        let _span = request_span(patient_id, kind).entered();
        let deadline = Deadline::start(self.cfg.request_timeout());

        let record = self.records.patient(patient_id)?;
        deadline.check(Stage::Assembly)?;

        let model = PatientInfoDocument::new(&record, &self.cfg.catalog().patient_info).build()?;
        deadline.check(Stage::Render)?;

        self.store(kind, patient_id, &model)
    }

    // ------------------------------------------------------------------------
    // Download
    // ------------------------------------------------------------------------

    /// Download the stored artifact of `kind` for a patient.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::ArtifactNotFound`] if it has not been generated yet.
    pub fn fetch_artifact(&self, kind: DocumentKind, patient_id: &PatientId) -> DocumentResult<FetchedArtifact> {
        let name = kind.artifact_name(patient_id, self.persister.extension());
        let container = kind.container(self.cfg.containers());
        let bytes = self.persister.fetch(container, &name)?;

        tracing::info!(%patient_id, %kind, container, key = %name, "downloaded document artifact");
        Ok(FetchedArtifact {
            name,
            media_type: self.persister.media_type(),
            bytes,
        })
    }

    // ------------------------------------------------------------------------
    // Stages
    // ------------------------------------------------------------------------

    fn lookup_identity(&self, patient_id: &PatientId) -> DocumentResult<PatientIdentity> {
        let record = self.records.patient(patient_id)?;
        Ok(record.identity()?)
    }

    fn aggregate_vitals(&self, patient_id: &PatientId) -> DocumentResult<HealthData> {
        let observations = self.records.observations(patient_id)?;
        let series = aggregate(&observations, &self.cfg.catalog().health_report.vital_signs);
        self.cfg.unit_policy().enforce(&series)?;

        tracing::info!(
            observations = observations.len(),
            series = series.len(),
            "aggregated vital signs"
        );
        Ok(HealthData(series))
    }

    fn store(&self, kind: DocumentKind, patient_id: &PatientId, model: &DocumentModel) -> DocumentResult<StoredArtifact> {
        let name = kind.artifact_name(patient_id, self.persister.extension());
        let container = kind.container(self.cfg.containers());
        self.persister.persist(model, &name, container)
    }
}

fn request_span(patient_id: &PatientId, kind: DocumentKind) -> tracing::Span {
    tracing::info_span!(
        "document_request",
        request_id = %Uuid::new_v4(),
        %patient_id,
        %kind
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{parse_series, ChartImage};
    use crate::document::Paragraph;
    use crate::vitals::{UnitPolicy, VitalSignSeries};
    use crate::{ContainerNames, TextCatalog};
    use fhir::{InMemoryRecordSource, Observation, ObservationComponent, PatientRecord};
    use pdoc_files::MemoryBlobStore;

    const PATIENT: &str = r#"{
        "resourceType": "Patient",
        "id": "123",
        "name": [{"family": "Williams", "given": ["Sarah"], "prefix": ["Mrs."]}],
        "address": [{"line": ["12 High Street"], "city": "Leeds", "state": "West Yorkshire", "postalCode": "LS1 4AP", "country": "UK"}],
        "identifier": [
            {"type": {"coding": [{"code": "DL"}]}, "value": "S99948707"},
            {"type": {"coding": [{"code": "SS"}]}, "value": "999-82-1234"}
        ]
    }"#;

    struct StubCharts;

    impl ChartRenderer for StubCharts {
        fn render_chart(&self, series: &VitalSignSeries, _title: &str) -> DocumentResult<ChartImage> {
            parse_series(series)?;
            Ok(ChartImage {
                png: vec![0x89, b'P', b'N', b'G'],
                width_px: 800,
                height_px: 500,
            })
        }
    }

    struct TextRenderer;

    impl DocumentRenderer for TextRenderer {
        fn render(&self, model: &DocumentModel) -> DocumentResult<Vec<u8>> {
            let lines: Vec<String> = model.paragraphs().map(Paragraph::plain_text).collect();
            Ok(lines.join("\n").into_bytes())
        }

        fn extension(&self) -> &'static str {
            "txt"
        }

        fn media_type(&self) -> &'static str {
            "text/plain"
        }
    }

    fn id() -> PatientId {
        PatientId::parse("123").unwrap()
    }

    fn observations() -> Vec<Observation> {
        vec![
            Observation::new(
                "vital-signs",
                "2023-01-01",
                vec![ObservationComponent::new("Heart rate", 72.0, "bpm")],
            ),
            Observation::new(
                "vital-signs",
                "2023-02-01",
                vec![
                    ObservationComponent::new("Heart rate", 75.0, "bpm"),
                    ObservationComponent::new("Body Weight", 70.5, "kg"),
                ],
            ),
        ]
    }

    fn service_with(
        cfg: CoreConfig,
        records: InMemoryRecordSource,
    ) -> (DocumentService, Arc<MemoryBlobStore>) {
        let store = Arc::new(MemoryBlobStore::new());
        let service = DocumentService::new(
            Arc::new(cfg),
            Arc::new(records),
            Arc::new(StubCharts),
            Arc::new(TextRenderer),
            store.clone(),
        );
        (service, store)
    }

    fn service() -> (DocumentService, Arc<MemoryBlobStore>) {
        let records = InMemoryRecordSource::new()
            .with_patient(PatientRecord::parse(PATIENT).unwrap())
            .with_observations(id(), observations());
        service_with(CoreConfig::default(), records)
    }

    #[test]
    fn feedback_data_keeps_response_shape() {
        let (service, store) = service();
        let data = service.feedback_data(&id()).unwrap();

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["name"]["prefix"], "Mrs.");
        assert_eq!(json["name"]["first_name"], "Sarah");
        assert_eq!(json["name"]["last_name"], "Williams");
        assert_eq!(json["address"]["address_lines"][0], "12 High Street");
        assert_eq!(json["address"]["postcode"], "LS1 4AP");
        assert!(json["questions_and_messages"]["hospital"]
            .as_str()
            .unwrap()
            .contains("hospital"));
        assert!(store.is_empty());
    }

    #[test]
    fn generate_feedback_stores_named_artifact() {
        let (service, store) = service();
        let generated = service.generate_feedback(&id()).unwrap();

        assert_eq!(generated.artifact.container, "feedbackforms");
        assert_eq!(generated.artifact.key, "123 feedback request.txt");
        assert_eq!(store.keys("feedbackforms"), vec!["123 feedback request.txt"]);
        assert_eq!(generated.data.name.first_name, "Sarah");
    }

    #[test]
    fn health_data_serialises_in_catalog_order() {
        let (service, _) = service();
        let data = service.health_data(&id()).unwrap();

        let json = serde_json::to_string(&data).unwrap();
        let weight = json.find("\"Body Weight\"").unwrap();
        let heart = json.find("\"Heart rate\"").unwrap();
        let systolic = json.find("\"Systolic Blood Pressure\"").unwrap();
        assert!(weight < heart && heart < systolic);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value["Heart rate"],
            serde_json::json!({"Dates": ["2023-01-01", "2023-02-01"], "Values": [72.0, 75.0], "Unit": "bpm"})
        );
        assert_eq!(
            value["Respiratory rate"],
            serde_json::json!({"Dates": [], "Values": [], "Unit": ""})
        );
    }

    #[test]
    fn health_data_does_not_need_a_patient_record() {
        let records = InMemoryRecordSource::new().with_observations(id(), observations());
        let (service, _) = service_with(CoreConfig::default(), records);

        assert!(service.health_data(&id()).is_ok());
        let err = service.generate_health_report(&id()).unwrap_err();
        assert!(matches!(err, DocumentError::PatientNotFound(_)));
    }

    #[test]
    fn generate_health_report_stores_artifact() {
        let (service, store) = service();
        let generated = service.generate_health_report(&id()).unwrap();

        assert_eq!(generated.artifact.key, "123 health data.txt");
        let body = String::from_utf8(store.get("patienthealthdata", "123 health data.txt").unwrap()).unwrap();
        assert!(body.contains("Name: Mrs. Sarah Williams"));
        assert!(body.contains("ID: 123"));
    }

    #[test]
    fn reject_policy_refuses_mixed_units() {
        let mut observations = observations();
        observations.push(Observation::new(
            "vital-signs",
            "2023-03-01",
            vec![ObservationComponent::new("Body Weight", 155.0, "lb")],
        ));
        let records = InMemoryRecordSource::new()
            .with_patient(PatientRecord::parse(PATIENT).unwrap())
            .with_observations(id(), observations);
        let cfg = CoreConfig::new(
            ContainerNames::default(),
            None,
            Duration::from_secs(30),
            UnitPolicy::Reject,
            TextCatalog::default(),
        )
        .unwrap();
        let (service, store) = service_with(cfg, records);

        let err = service.generate_health_report(&id()).unwrap_err();
        assert!(matches!(&err, DocumentError::ConflictingUnit { label, .. } if label == "Body Weight"));
        assert_eq!(err.stage(), Stage::Assembly);
        assert!(service.health_data(&id()).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn patient_info_without_driving_licence_persists_nothing() {
        let mut record = PatientRecord::parse(PATIENT).unwrap();
        record.identifiers.retain(|i| i.type_code.as_deref() != Some("DL"));
        let records = InMemoryRecordSource::new().with_patient(record);
        let (service, store) = service_with(CoreConfig::default(), records);

        let err = service.generate_patient_info(&id()).unwrap_err();
        assert!(matches!(&err, DocumentError::MissingIdentifier(code) if code == "DL"));
        assert_eq!(err.stage(), Stage::Assembly);
        assert!(store.is_empty());
    }

    #[test]
    fn generate_patient_info_then_fetch_it_back() {
        let (service, _) = service();
        let artifact = service.generate_patient_info(&id()).unwrap();
        assert_eq!(artifact.container, "patientinfo");
        assert_eq!(artifact.key, "123 details.txt");

        let fetched = service.fetch_artifact(DocumentKind::PatientInfo, &id()).unwrap();
        assert_eq!(fetched.name, "123 details.txt");
        assert_eq!(fetched.media_type, "text/plain");
        assert!(String::from_utf8(fetched.bytes).unwrap().contains("Patient ID: 123"));
    }

    #[test]
    fn fetching_ungenerated_artifact_is_not_found() {
        let (service, _) = service();
        let err = service.fetch_artifact(DocumentKind::Feedback, &id()).unwrap_err();
        assert!(matches!(err, DocumentError::ArtifactNotFound { .. }));
        assert_eq!(err.stage(), Stage::Download);
    }

    #[test]
    fn unknown_patient_is_not_found_at_lookup() {
        let (service, _) = service();
        let missing = PatientId::parse("999").unwrap();
        let err = service.feedback_data(&missing).unwrap_err();
        assert!(matches!(&err, DocumentError::PatientNotFound(id) if id == "999"));
        assert_eq!(err.stage(), Stage::Lookup);
    }

    #[test]
    fn spent_deadline_is_a_timeout_at_the_next_stage() {
        let deadline = Deadline {
            started: Instant::now() - Duration::from_secs(5),
            limit: Duration::from_secs(1),
        };
        let err = deadline.check(Stage::Render).unwrap_err();
        assert!(matches!(err, DocumentError::Timeout { stage: Stage::Render, .. }));
        assert!(err.is_retryable());

        assert!(Deadline::start(Duration::from_secs(60)).check(Stage::Assembly).is_ok());
    }

    #[test]
    fn health_data_from_files_ignores_unreadable_lab_results() {
        let bundle = r#"{
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [
                {"resource": {"resourceType": "Observation", "id": "lab-1",
                    "category": [{"coding": [{"code": "laboratory"}]}],
                    "code": {"text": "Haemoglobin"},
                    "effectivePeriod": {"start": "2023-01-01", "end": "2023-01-02"},
                    "valueQuantity": {"value": 13.5, "unit": "g/dL"}}},
                {"resource": {"resourceType": "Observation", "id": "hr-1",
                    "category": [{"coding": [{"code": "vital-signs"}]}],
                    "issued": "2023-01-05",
                    "code": {"text": "Heart rate"},
                    "valueQuantity": {"value": 72, "unit": "bpm"}}}
            ]
        }"#;
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("123");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(fhir::source::PATIENT_FILE_NAME), PATIENT).unwrap();
        std::fs::write(dir.join(fhir::source::OBSERVATIONS_FILE_NAME), bundle).unwrap();

        let store = Arc::new(MemoryBlobStore::new());
        let service = DocumentService::new(
            Arc::new(CoreConfig::default()),
            Arc::new(fhir::FileRecordSource::new(temp.path())),
            Arc::new(StubCharts),
            Arc::new(TextRenderer),
            store.clone(),
        );

        let data = service.health_data(&id()).unwrap();
        let heart = data.series().get("Heart rate").unwrap();
        assert_eq!(heart.len(), 1);
        assert_eq!(heart.unit(), "bpm");
        assert!(data.series().get("Body Weight").unwrap().is_empty());

        let generated = service.generate_health_report(&id()).unwrap();
        assert_eq!(generated.artifact.key, "123 health data.txt");
    }
}
