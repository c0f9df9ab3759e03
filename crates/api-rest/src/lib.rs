//! REST API for patient document generation.
//!
//! Exposes the [`DocumentService`] operations over HTTP with an OpenAPI description and Swagger
//! UI. Every document request runs on the blocking pool, bounded by the configured request
//! timeout, and failures are reported as `{stage, error, message}` JSON bodies.

mod error;

pub use error::{status_for, ApiError, ErrorRes};

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use pdoc_core::{
    DocumentKind, DocumentResult, DocumentService, FeedbackData, HealthData, PatientId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

/// Message returned once the personal details form has been stored.
pub const DOCUMENT_CREATED_MESSAGE: &str = "Document created successfully";

/// Application state shared across REST API handlers
#[derive(Clone)]
pub struct AppState {
    service: Arc<DocumentService>,
}

impl AppState {
    pub fn new(service: DocumentService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageRes {
    pub message: String,
}

/// `?id=` query shared by the document endpoints.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PatientQuery {
    /// Patient identifier in the clinical record source
    id: Option<String>,
}

impl PatientQuery {
    fn patient_id(&self) -> Result<PatientId, ApiError> {
        let raw = self
            .id
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("missing required query parameter 'id'".into()))?;
        PatientId::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        feedback,
        feedback_document_data,
        patient_report,
        raw_data,
        info_document,
        download_document
    ),
    components(schemas(HealthRes, MessageRes, ErrorRes))
)]
struct ApiDoc;

/// Build the REST router.
///
/// # Arguments
///
/// * `state` - Shared application state wrapping the document service.
///
/// # Returns
///
/// A router serving the document endpoints, `/health`, the OpenAPI document at
/// `/api-docs/openapi.json` and Swagger UI at `/swagger-ui`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/FormFiller/feedback", get(feedback))
        .route("/FormFiller/feedbackDocumentData", get(feedback_document_data))
        .route("/report/patientReport", get(patient_report))
        .route("/report/rawData", get(raw_data))
        .route("/info/infoDocument", get(info_document))
        .route("/documents/:kind/:id", get(download_document))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run one pipeline operation on the blocking pool, bounded by the request timeout.
///
/// The record source and blob store are blocking collaborators, so they never run on the async
/// executor.
///
/// # Errors
///
/// [`ApiError::Timeout`] if the operation outlives the configured timeout,
/// [`ApiError::Document`] if it fails, [`ApiError::Internal`] if the task panics.
async fn run_blocking<T, F>(state: &AppState, action: &'static str, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&DocumentService) -> DocumentResult<T> + Send + 'static,
    T: Send + 'static,
{
    let service = state.service.clone();
    let limit = service.config().request_timeout();
    let task = tokio::task::spawn_blocking(move || op(service.as_ref()));

    match tokio::time::timeout(limit, task).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(e))) => {
            tracing::error!("{} error: {:?}", action, e);
            Err(ApiError::Document(e))
        }
        Ok(Err(e)) => {
            tracing::error!("{} task failed: {:?}", action, e);
            Err(ApiError::Internal(format!("{action} task failed")))
        }
        Err(_) => {
            tracing::error!("{} timed out after {:?}", action, limit);
            Err(ApiError::Timeout(limit))
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// # Returns
/// * `Json<HealthRes>` - Health status response
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Patient documents API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/FormFiller/feedback",
    params(PatientQuery),
    responses(
        (status = 200, description = "Feedback document stored; returns the data printed on it"),
        (status = 400, description = "Missing or invalid patient id", body = ErrorRes),
        (status = 404, description = "Patient not found", body = ErrorRes),
        (status = 422, description = "Record lacks a name or address", body = ErrorRes),
        (status = 502, description = "Record source or storage failure", body = ErrorRes),
        (status = 504, description = "Request timed out", body = ErrorRes)
    )
)]
/// Generate and store the feedback request letter.
///
/// # Returns
/// * `Ok(Json<FeedbackData>)` - Name, address and questions printed on the letter
/// * `Err(ApiError)` - Stage-attributed failure
#[axum::debug_handler]
async fn feedback(
    State(state): State<AppState>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<FeedbackData>, ApiError> {
    let id = query.patient_id()?;
    let generated = run_blocking(&state, "Generate feedback", move |svc| svc.generate_feedback(&id)).await?;
    Ok(Json(generated.data))
}

#[utoipa::path(
    get,
    path = "/FormFiller/feedbackDocumentData",
    params(PatientQuery),
    responses(
        (status = 200, description = "Data that would be printed on the feedback document"),
        (status = 400, description = "Missing or invalid patient id", body = ErrorRes),
        (status = 404, description = "Patient not found", body = ErrorRes),
        (status = 422, description = "Record lacks a name or address", body = ErrorRes),
        (status = 502, description = "Record source failure", body = ErrorRes)
    )
)]
/// Feedback document data without generating the document.
#[axum::debug_handler]
async fn feedback_document_data(
    State(state): State<AppState>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<FeedbackData>, ApiError> {
    let id = query.patient_id()?;
    let data = run_blocking(&state, "Feedback data", move |svc| svc.feedback_data(&id)).await?;
    Ok(Json(data))
}

#[utoipa::path(
    get,
    path = "/report/patientReport",
    params(PatientQuery),
    responses(
        (status = 200, description = "Health data report stored; returns the charted series"),
        (status = 400, description = "Missing or invalid patient id", body = ErrorRes),
        (status = 404, description = "Patient not found", body = ErrorRes),
        (status = 422, description = "Conflicting units under the reject policy", body = ErrorRes),
        (status = 500, description = "Rendering failure", body = ErrorRes),
        (status = 502, description = "Record source or storage failure", body = ErrorRes),
        (status = 504, description = "Request timed out", body = ErrorRes)
    )
)]
/// Generate and store the health data report.
///
/// # Returns
/// * `Ok(Json<HealthData>)` - Series keyed by vital sign, each with `Dates`, `Values` and `Unit`
/// * `Err(ApiError)` - Stage-attributed failure
#[axum::debug_handler]
async fn patient_report(
    State(state): State<AppState>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<HealthData>, ApiError> {
    let id = query.patient_id()?;
    let generated = run_blocking(&state, "Generate health report", move |svc| {
        svc.generate_health_report(&id)
    })
    .await?;
    Ok(Json(generated.data))
}

#[utoipa::path(
    get,
    path = "/report/rawData",
    params(PatientQuery),
    responses(
        (status = 200, description = "Vital-sign series keyed by vital sign"),
        (status = 400, description = "Missing or invalid patient id", body = ErrorRes),
        (status = 422, description = "Conflicting units under the reject policy", body = ErrorRes),
        (status = 502, description = "Record source failure", body = ErrorRes)
    )
)]
/// Aggregated vital-sign series without generating the report.
#[axum::debug_handler]
async fn raw_data(
    State(state): State<AppState>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<HealthData>, ApiError> {
    let id = query.patient_id()?;
    let data = run_blocking(&state, "Health data", move |svc| svc.health_data(&id)).await?;
    Ok(Json(data))
}

#[utoipa::path(
    get,
    path = "/info/infoDocument",
    params(PatientQuery),
    responses(
        (status = 200, description = "Personal details form stored", body = MessageRes),
        (status = 400, description = "Missing or invalid patient id", body = ErrorRes),
        (status = 404, description = "Patient not found", body = ErrorRes),
        (status = 422, description = "Driver's licence or social security number missing", body = ErrorRes),
        (status = 502, description = "Record source or storage failure", body = ErrorRes),
        (status = 504, description = "Request timed out", body = ErrorRes)
    )
)]
/// Generate and store the personal details form.
#[axum::debug_handler]
async fn info_document(
    State(state): State<AppState>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<MessageRes>, ApiError> {
    let id = query.patient_id()?;
    run_blocking(&state, "Generate patient info", move |svc| svc.generate_patient_info(&id)).await?;
    Ok(Json(MessageRes {
        message: DOCUMENT_CREATED_MESSAGE.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/documents/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Document kind: feedback, health-data or details"),
        ("id" = String, Path, description = "Patient identifier")
    ),
    responses(
        (status = 200, description = "Stored document bytes"),
        (status = 400, description = "Unknown kind or invalid patient id", body = ErrorRes),
        (status = 404, description = "Document has not been generated", body = ErrorRes),
        (status = 502, description = "Storage failure", body = ErrorRes)
    )
)]
/// Download a previously stored document.
///
/// # Returns
/// * `Ok(Response)` - Document bytes with `Content-Type` and an attachment `Content-Disposition`
/// * `Err(ApiError)` - Unknown kind, invalid id or download failure
#[axum::debug_handler]
async fn download_document(
    State(state): State<AppState>,
    AxumPath((kind, id)): AxumPath<(String, String)>,
) -> Result<Response, ApiError> {
    let kind: DocumentKind = kind.parse().map_err(|e: pdoc_core::DocumentError| {
        tracing::error!("Invalid document kind: {:?}", e);
        ApiError::BadRequest(e.to_string())
    })?;
    let id = PatientId::parse(&id).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let artifact = run_blocking(&state, "Download document", move |svc| svc.fetch_artifact(kind, &id)).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", artifact.name))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let mut response = artifact.bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(artifact.media_type));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use fhir::{
        FhirResult, InMemoryRecordSource, Observation, ObservationComponent, PatientRecord,
        RecordSource,
    };
    use http_body_util::BodyExt;
    use pdoc_core::{ContainerNames, CoreConfig, TextCatalog, UnitPolicy};
    use pdoc_files::MemoryBlobStore;
    use pdoc_render::{MarkdownRenderer, PlottersChartRenderer};
    use std::time::Duration;
    use tower::ServiceExt;

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

    const NO_IDENTIFIERS: &str = r#"{
        "resourceType": "Patient",
        "id": "456",
        "name": [{"family": "Jones", "given": ["Tom"]}],
        "address": [{"line": ["1 Low Road"], "city": "York"}]
    }"#;

    fn records() -> InMemoryRecordSource {
        let id = PatientId::parse("123").unwrap();
        InMemoryRecordSource::new()
            .with_patient(PatientRecord::parse(PATIENT).unwrap())
            .with_patient(PatientRecord::parse(NO_IDENTIFIERS).unwrap())
            .with_observations(
                id,
                vec![Observation::new(
                    "vital-signs",
                    "2023-01-01",
                    vec![ObservationComponent::new("Heart rate", 72.0, "bpm")],
                )],
            )
    }

    fn app_with(cfg: CoreConfig, records: impl RecordSource + 'static) -> (Router, Arc<MemoryBlobStore>) {
        let store = Arc::new(MemoryBlobStore::new());
        let service = DocumentService::new(
            Arc::new(cfg),
            Arc::new(records),
            Arc::new(PlottersChartRenderer::new(160, 100)),
            Arc::new(MarkdownRenderer),
            store.clone(),
        );
        (router(AppState::new(service)), store)
    }

    fn app() -> (Router, Arc<MemoryBlobStore>) {
        app_with(CoreConfig::default(), records())
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body, headers)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let (status, body, _) = get(app, uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (app, _) = app();
        let (status, json) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn missing_id_is_bad_request() {
        let (app, _) = app();
        let (status, json) = get_json(app, "/FormFiller/feedback").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["stage"], "request");
        assert_eq!(json["error"], "bad_request");
    }

    #[tokio::test]
    async fn feedback_data_does_not_store_anything() {
        let (app, store) = app();
        let (status, json) = get_json(app, "/FormFiller/feedbackDocumentData?id=123").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"]["first_name"], "Sarah");
        assert_eq!(json["address"]["city"], "Leeds");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn feedback_generates_and_stores_letter() {
        let (app, store) = app();
        let (status, json) = get_json(app, "/FormFiller/feedback?id=123").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"]["last_name"], "Williams");
        assert_eq!(store.keys("feedbackforms"), vec!["123 feedback request.md"]);
    }

    #[tokio::test]
    async fn patient_report_returns_series_and_stores_report() {
        let (app, store) = app();
        let (status, json) = get_json(app, "/report/patientReport?id=123").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["Heart rate"],
            serde_json::json!({"Dates": ["2023-01-01"], "Values": [72.0], "Unit": "bpm"})
        );
        assert_eq!(store.keys("patienthealthdata"), vec!["123 health data.md"]);
    }

    #[tokio::test]
    async fn raw_data_has_every_catalog_sign() {
        let (app, store) = app();
        let (status, json) = get_json(app, "/report/rawData?id=123").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["Body Weight"]["Unit"], "");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn info_document_then_download() {
        let (app, _) = app();
        let (status, json) = get_json(app.clone(), "/info/infoDocument?id=123").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], DOCUMENT_CREATED_MESSAGE);

        let (status, body, headers) = get(app, "/documents/details/123").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/markdown");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"123 details.md\""
        );
        assert!(String::from_utf8(body).unwrap().contains("S99948707"));
    }

    #[tokio::test]
    async fn unknown_patient_is_not_found_at_lookup() {
        let (app, _) = app();
        let (status, json) = get_json(app, "/FormFiller/feedback?id=999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["stage"], "lookup");
        assert_eq!(json["error"], "patient_not_found");
    }

    #[tokio::test]
    async fn missing_identifier_is_unprocessable() {
        let (app, store) = app();
        let (status, json) = get_json(app, "/info/infoDocument?id=456").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["stage"], "assembly");
        assert_eq!(json["error"], "missing_identifier");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn download_before_generation_is_not_found() {
        let (app, _) = app();
        let (status, json) = get_json(app, "/documents/health-data/123").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "artifact_not_found");
    }

    #[tokio::test]
    async fn unknown_document_kind_is_bad_request() {
        let (app, _) = app();
        let (status, _) = get_json(app, "/documents/invoice/123").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn conflicting_units_rejected_under_reject_policy() {
        let id = PatientId::parse("123").unwrap();
        let records = InMemoryRecordSource::new().with_observations(
            id,
            vec![
                Observation::new(
                    "vital-signs",
                    "2023-01-01",
                    vec![ObservationComponent::new("Body Weight", 70.0, "kg")],
                ),
                Observation::new(
                    "vital-signs",
                    "2023-02-01",
                    vec![ObservationComponent::new("Body Weight", 155.0, "lb")],
                ),
            ],
        );
        let cfg = CoreConfig::new(
            ContainerNames::default(),
            None,
            Duration::from_secs(5),
            UnitPolicy::Reject,
            TextCatalog::default(),
        )
        .unwrap();
        let (app, _) = app_with(cfg, records);

        let (status, json) = get_json(app, "/report/rawData?id=123").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"], "conflicting_unit");
    }

    struct SlowSource;

    impl RecordSource for SlowSource {
        fn patient(&self, id: &PatientId) -> FhirResult<PatientRecord> {
            std::thread::sleep(Duration::from_millis(300));
            records().patient(id)
        }

        fn observations(&self, id: &PatientId) -> FhirResult<Vec<Observation>> {
            std::thread::sleep(Duration::from_millis(300));
            records().observations(id)
        }
    }

    #[tokio::test]
    async fn slow_source_times_out() {
        let cfg = CoreConfig::new(
            ContainerNames::default(),
            None,
            Duration::from_millis(50),
            UnitPolicy::default(),
            TextCatalog::default(),
        )
        .unwrap();
        let (app, _) = app_with(cfg, SlowSource);

        let (status, json) = get_json(app, "/FormFiller/feedbackDocumentData?id=123").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(json["error"], "timeout");
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let (app, _) = app();
        let (status, json) = get_json(app, "/api-docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["paths"]["/report/patientReport"].is_object());
        assert!(json["paths"]["/documents/{kind}/{id}"].is_object());
    }
}
