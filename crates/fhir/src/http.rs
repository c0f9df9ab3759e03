//! FHIR REST record source.
//!
//! Talks to a FHIR R4 server with a blocking `reqwest` client:
//! - `GET {base}/Patient/{id}`
//! - `GET {base}/Observation?patient={id}`, following bundle `next` links
//!
//! Every request carries the configured timeout. A 404 becomes [`FhirError::NotFound`], an
//! elapsed timeout becomes [`FhirError::Timeout`], and anything else that goes wrong on the wire
//! becomes [`FhirError::Transport`], so callers can tell "no such patient" from "server down".
//!
//! The client blocks; call it from a blocking thread, never directly on an async executor.

use crate::bundle::Bundle;
use crate::observation::Observation;
use crate::patient::PatientRecord;
use crate::source::RecordSource;
use crate::{FhirError, FhirResult};
use pdoc_types::PatientId;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use std::time::Duration;

/// Upper bound on followed `next` links for one observation search.
pub const MAX_BUNDLE_PAGES: usize = 100;

const FHIR_JSON: &str = "application/fhir+json";

/// Record source backed by a FHIR REST endpoint.
#[derive(Clone, Debug)]
pub struct HttpRecordSource {
    base_url: String,
    client: Client,
}

impl HttpRecordSource {
    /// Create a source for the server at `base_url` (e.g. `https://fhir.example.org/api`).
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidInput`] for an empty base URL and
    /// [`FhirError::Transport`] if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> FhirResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(FhirError::InvalidInput("FHIR base URL cannot be empty".into()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FhirError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn fetch_json(
        &self,
        request: RequestBuilder,
        resource: &'static str,
        id: &PatientId,
    ) -> FhirResult<String> {
        let response = request
            .header(reqwest::header::ACCEPT, FHIR_JSON)
            .send()
            .map_err(map_reqwest_error)?;

        match response.status() {
            status if status.is_success() => response.text().map_err(map_reqwest_error),
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(FhirError::NotFound {
                resource,
                id: id.to_string(),
            }),
            status => Err(FhirError::Transport(format!(
                "{resource} request for {id} returned HTTP {status}"
            ))),
        }
    }
}

impl RecordSource for HttpRecordSource {
    fn patient(&self, id: &PatientId) -> FhirResult<PatientRecord> {
        let url = format!("{}/Patient/{}", self.base_url, id);
        let body = self.fetch_json(self.client.get(url), "Patient", id)?;
        PatientRecord::parse(&body)
    }

    fn observations(&self, id: &PatientId) -> FhirResult<Vec<Observation>> {
        let url = format!("{}/Observation", self.base_url);
        let first = self
            .client
            .get(url)
            .query(&[("patient", id.as_str())]);
        let mut page = Bundle::parse(&self.fetch_json(first, "Observation", id)?)?;

        let mut observations = std::mem::take(&mut page.observations);
        let mut pages = 1;
        while let Some(next) = page.next.take() {
            if pages >= MAX_BUNDLE_PAGES {
                tracing::warn!(
                    patient_id = %id,
                    pages,
                    "observation search exceeded page limit; remaining pages ignored"
                );
                break;
            }
            page = Bundle::parse(&self.fetch_json(self.client.get(next), "Observation", id)?)?;
            observations.append(&mut page.observations);
            pages += 1;
        }

        tracing::debug!(patient_id = %id, count = observations.len(), pages, "fetched observations");
        Ok(observations)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FhirError {
    if err.is_timeout() {
        FhirError::Timeout(err.to_string())
    } else {
        FhirError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slashes_from_base_url() {
        let source = HttpRecordSource::new("http://localhost:5001/api//", Duration::from_secs(1)).unwrap();
        assert_eq!(source.base_url(), "http://localhost:5001/api");
    }

    #[test]
    fn rejects_empty_base_url() {
        let err = HttpRecordSource::new("  ", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FhirError::InvalidInput(_)));
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let source = HttpRecordSource::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let id = PatientId::parse("123").unwrap();
        let err = source.patient(&id).unwrap_err();
        assert!(
            matches!(err, FhirError::Transport(_) | FhirError::Timeout(_)),
            "unexpected error: {err:?}"
        );
    }
}
