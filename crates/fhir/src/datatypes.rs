//! Shared FHIR datatype wire structs (`Coding`, `CodeableConcept`, `Quantity`, `Reference`).
//!
//! Resources coming from a FHIR server carry many more fields than we read, so these structs are
//! lenient about unknown keys and strict only about the types of the fields they declare.

use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub(crate) struct CodingWire {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub(crate) struct CodeableConceptWire {
    #[serde(default)]
    pub coding: Vec<CodingWire>,
    #[serde(default)]
    pub text: Option<String>,
}

impl CodeableConceptWire {
    /// Code of the first coding, if any.
    pub fn first_code(&self) -> Option<&str> {
        self.coding.first().and_then(|c| c.code.as_deref())
    }

    /// Human readable label: first coding display, then `text`.
    pub fn display_label(&self) -> Option<&str> {
        self.coding
            .first()
            .and_then(|c| c.display.as_deref())
            .or(self.text.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    /// Label for free text fields: `text`, then first display, then first code.
    pub fn text_label(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or_else(|| self.coding.first().and_then(|c| c.display.as_deref()))
            .or_else(|| self.first_code())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.coding.iter().any(|c| c.code.as_deref() == Some(code))
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub(crate) struct QuantityWire {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl QuantityWire {
    /// Unit label: the human readable `unit`, then the UCUM `code`, then empty.
    pub fn unit_label(&self) -> String {
        self.unit
            .clone()
            .or_else(|| self.code.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_label_prefers_coding_display() {
        let concept: CodeableConceptWire = serde_json::from_str(
            r#"{"coding":[{"code":"8867-4","display":"Heart rate"}],"text":"HR"}"#,
        )
        .unwrap();
        assert_eq!(concept.display_label(), Some("Heart rate"));
        assert_eq!(concept.text_label(), Some("HR"));
        assert_eq!(concept.first_code(), Some("8867-4"));
    }

    #[test]
    fn quantity_unit_falls_back_to_code() {
        let q: QuantityWire = serde_json::from_str(r#"{"value":72,"code":"/min"}"#).unwrap();
        assert_eq!(q.unit_label(), "/min");
        let q: QuantityWire = serde_json::from_str(r#"{"value":72}"#).unwrap();
        assert_eq!(q.unit_label(), "");
    }
}
