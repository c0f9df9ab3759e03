//! FHIR `Observation` wire model and translation to the domain [`Observation`].
//!
//! Responsibilities:
//! - Define a lenient wire model for the subset of the resource we read
//! - Translate to a flat domain record with a category, an issue time and ordered components
//! - Reject observations that carry no usable timestamp
//!
//! Notes:
//! - Multi-component observations (blood pressure panels) expose each `component[]` entry.
//! - Single-value observations (heart rate, body weight) expose their top-level `code` and
//!   `valueQuantity` as one component, so both shapes look the same to the extractor.

use crate::datatypes::{CodeableConceptWire, QuantityWire};
use crate::{FhirError, FhirResult};
use pdoc_types::Timestamp;
use serde::Deserialize;

// ============================================================================
// Public domain-level types
// ============================================================================

/// One numeric reading within an observation.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationComponent {
    /// Vital-sign name, e.g. `"Heart rate"`.
    pub label: String,
    pub value: f64,
    /// Unit as reported by the source; may be empty.
    pub unit: String,
}

impl ObservationComponent {
    pub fn new(label: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value,
            unit: unit.into(),
        }
    }
}

/// A clinical observation reduced to the fields document generation depends on.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    /// Code of the first coding of the first category, e.g. `"vital-signs"`.
    pub category: Option<String>,

    /// When the observation was issued (falls back to the effective time).
    pub issued_at: Timestamp,

    /// Readings in source order.
    pub components: Vec<ObservationComponent>,
}

impl Observation {
    /// Build an observation directly; used by in-memory sources and tests.
    pub fn new(
        category: impl Into<String>,
        issued_at: impl Into<Timestamp>,
        components: Vec<ObservationComponent>,
    ) -> Self {
        Self {
            category: Some(category.into()),
            issued_at: issued_at.into(),
            components,
        }
    }

    /// Parse an `Observation` resource from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - the text is not JSON,
    /// - resourceType is not "Observation",
    /// - a declared field has an unexpected type,
    /// - neither `issued` nor `effectiveDateTime` is present.
    pub fn parse(json_text: &str) -> FhirResult<Self> {
        let value = crate::parse_resource_text(json_text, "Observation")?;
        Self::from_value(value)
    }

    /// Translate an already-parsed JSON value (for example a bundle entry).
    pub fn from_value(value: serde_json::Value) -> FhirResult<Self> {
        crate::check_resource_type(&value, "Observation")?;
        let wire: ObservationWire = crate::from_json_value(value, "Observation")?;
        wire_to_domain(wire)
    }
}

/// Category code of a raw `Observation` resource, read without translating it.
pub(crate) fn raw_category(value: &serde_json::Value) -> Option<&str> {
    value
        .pointer("/category/0/coding/0/code")
        .and_then(serde_json::Value::as_str)
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
struct ObservationWire {
    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    category: Vec<CodeableConceptWire>,

    #[serde(default)]
    code: CodeableConceptWire,

    #[serde(default)]
    issued: Option<String>,

    #[serde(rename = "effectiveDateTime", default)]
    effective_date_time: Option<String>,

    #[serde(rename = "valueQuantity", default)]
    value_quantity: Option<QuantityWire>,

    #[serde(default)]
    component: Vec<ComponentWire>,
}

#[derive(Clone, Debug, Deserialize)]
struct ComponentWire {
    #[serde(default)]
    code: CodeableConceptWire,

    #[serde(rename = "valueQuantity", default)]
    value_quantity: Option<QuantityWire>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn wire_to_domain(wire: ObservationWire) -> FhirResult<Observation> {
    let issued_at = wire
        .issued
        .or(wire.effective_date_time)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            FhirError::Translation(format!(
                "Observation {} has neither issued nor effectiveDateTime",
                wire.id.as_deref().unwrap_or("<no id>")
            ))
        })?;

    let category = wire
        .category
        .first()
        .and_then(|c| c.first_code())
        .map(str::to_owned);

    let components = if wire.component.is_empty() {
        to_component(&wire.code, wire.value_quantity.as_ref())
            .into_iter()
            .collect()
    } else {
        wire.component
            .iter()
            .filter_map(|c| to_component(&c.code, c.value_quantity.as_ref()))
            .collect()
    };

    Ok(Observation {
        category,
        issued_at: Timestamp::new(issued_at),
        components,
    })
}

/// Components without a label or a numeric value carry nothing we can chart.
fn to_component(
    code: &CodeableConceptWire,
    quantity: Option<&QuantityWire>,
) -> Option<ObservationComponent> {
    let label = code.display_label()?;
    let quantity = quantity?;
    let value = quantity.value?;
    Some(ObservationComponent::new(label, value, quantity.unit_label()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOOD_PRESSURE: &str = r#"{
        "resourceType": "Observation",
        "id": "bp-1",
        "status": "final",
        "category": [{"coding": [{"system": "http://terminology.hl7.org/CodeSystem/observation-category", "code": "vital-signs"}]}],
        "code": {"coding": [{"system": "http://loinc.org", "code": "55284-4", "display": "Blood Pressure"}]},
        "issued": "2019-06-03T10:15:00.000+01:00",
        "component": [
            {"code": {"coding": [{"code": "8462-4", "display": "Diastolic Blood Pressure"}]},
             "valueQuantity": {"value": 81, "unit": "mm[Hg]"}},
            {"code": {"coding": [{"code": "8480-6", "display": "Systolic Blood Pressure"}]},
             "valueQuantity": {"value": 127.5, "unit": "mm[Hg]"}}
        ]
    }"#;

    #[test]
    fn parses_multi_component_observation() {
        let obs = Observation::parse(BLOOD_PRESSURE).unwrap();
        assert_eq!(obs.category.as_deref(), Some("vital-signs"));
        assert_eq!(obs.issued_at.as_str(), "2019-06-03T10:15:00.000+01:00");
        assert_eq!(
            obs.components,
            vec![
                ObservationComponent::new("Diastolic Blood Pressure", 81.0, "mm[Hg]"),
                ObservationComponent::new("Systolic Blood Pressure", 127.5, "mm[Hg]"),
            ]
        );
    }

    #[test]
    fn single_value_observation_becomes_one_component() {
        let json = r#"{
            "resourceType": "Observation",
            "category": [{"coding": [{"code": "vital-signs"}]}],
            "code": {"coding": [{"code": "8867-4", "display": "Heart rate"}]},
            "effectiveDateTime": "2023-01-01",
            "valueQuantity": {"value": 72, "unit": "bpm"}
        }"#;
        let obs = Observation::parse(json).unwrap();
        assert_eq!(obs.issued_at.as_str(), "2023-01-01");
        assert_eq!(obs.components, vec![ObservationComponent::new("Heart rate", 72.0, "bpm")]);
    }

    #[test]
    fn components_without_numeric_values_are_skipped() {
        let json = r#"{
            "resourceType": "Observation",
            "category": [{"coding": [{"code": "vital-signs"}]}],
            "issued": "2023-01-01",
            "component": [
                {"code": {"text": "Heart rate"}, "valueQuantity": {"unit": "bpm"}},
                {"code": {"text": "Respiratory rate"}, "valueQuantity": {"value": 14, "unit": "/min"}},
                {"code": {"text": "Comment"}}
            ]
        }"#;
        let obs = Observation::parse(json).unwrap();
        assert_eq!(
            obs.components,
            vec![ObservationComponent::new("Respiratory rate", 14.0, "/min")]
        );
    }

    #[test]
    fn rejects_observation_without_timestamp() {
        let json = r#"{"resourceType": "Observation", "id": "x", "component": []}"#;
        let err = Observation::parse(json).unwrap_err();
        assert!(matches!(err, FhirError::Translation(msg) if msg.contains("issued")));
    }

    #[test]
    fn raw_category_reads_first_coding() {
        let value: serde_json::Value = serde_json::from_str(BLOOD_PRESSURE).unwrap();
        assert_eq!(raw_category(&value), Some("vital-signs"));
        assert_eq!(raw_category(&serde_json::json!({"category": []})), None);
    }

    #[test]
    fn rejects_wrong_resource_type() {
        let err = Observation::parse(r#"{"resourceType": "Patient"}"#).unwrap_err();
        assert!(matches!(err, FhirError::InvalidInput(_)));
    }

    #[test]
    fn reports_path_of_mistyped_field() {
        let json = r#"{
            "resourceType": "Observation",
            "issued": "2023-01-01",
            "component": [{"code": {"text": "Heart rate"}, "valueQuantity": {"value": "fast"}}]
        }"#;
        let err = Observation::parse(json).unwrap_err();
        match err {
            FhirError::Translation(msg) => assert!(msg.contains("component[0].valueQuantity.value"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_category_is_kept_as_none() {
        let json = r#"{
            "resourceType": "Observation",
            "issued": "2023-01-01",
            "code": {"text": "Heart rate"},
            "valueQuantity": {"value": 60}
        }"#;
        let obs = Observation::parse(json).unwrap();
        assert_eq!(obs.category, None);
        assert_eq!(obs.components[0].unit, "");
    }
}
