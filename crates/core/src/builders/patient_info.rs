use super::{join_with, join_words, DocumentBuilder};
use crate::catalog::PatientInfoText;
use crate::constants::{DRIVING_LICENCE_CODE, SOCIAL_SECURITY_CODE};
use crate::document::{DocumentKind, DocumentModel, Paragraph};
use crate::{DocumentError, DocumentResult};
use fhir::PatientRecord;

/// Number of `label: value` lines on the personal details form.
pub const PATIENT_INFO_LINE_COUNT: usize = 18;

/// Personal details verification form.
///
/// Prints every demographic field held for the patient as a `label: value` line followed by a
/// response line for corrections. Optional fields the record does not hold are printed as the
/// catalog's "not recorded" text; the driving licence (`DL`) and social security (`SS`)
/// identifiers are required, and a missing one fails the build with
/// [`DocumentError::MissingIdentifier`].
pub struct PatientInfoDocument<'a> {
    record: &'a PatientRecord,
    text: &'a PatientInfoText,
}

impl<'a> PatientInfoDocument<'a> {
    pub fn new(record: &'a PatientRecord, text: &'a PatientInfoText) -> Self {
        Self { record, text }
    }

    fn required_identifier(&self, code: &str) -> DocumentResult<&'a str> {
        self.record
            .identifier(code)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| DocumentError::MissingIdentifier(code.to_owned()))
    }

    /// The eighteen `(label, value)` pairs in print order.
    fn fields(&self) -> DocumentResult<Vec<(&'a str, String)>> {
        let record = self.record;
        let labels = &self.text.labels;

        let driving_licence = self.required_identifier(DRIVING_LICENCE_CODE)?;
        let social_security = self.required_identifier(SOCIAL_SECURITY_CODE)?;

        let name = record.name.as_ref();
        let first_name = name.and_then(|n| n.first_name());
        let address = record.addresses.first();
        let address_field = |pick: fn(&fhir::PostalAddress) -> &str| {
            address.map(pick).filter(|v| !v.trim().is_empty())
        };
        let street = address
            .map(|a| join_with(", ", a.address_lines.iter().map(String::as_str)))
            .filter(|s| !s.is_empty());

        let or_blank = |value: Option<&str>| {
            value
                .filter(|v| !v.trim().is_empty())
                .map_or_else(|| self.text.not_recorded.clone(), str::to_owned)
        };

        Ok(vec![
            (labels.id.as_str(), record.id.to_string()),
            (labels.first_name.as_str(), or_blank(first_name)),
            (labels.last_name.as_str(), or_blank(name.and_then(|n| n.family.as_deref()))),
            (labels.prefix.as_str(), or_blank(name.and_then(|n| n.prefix.as_deref()))),
            (labels.preferred_name.as_str(), or_blank(first_name)),
            (labels.gender.as_str(), or_blank(record.gender.as_deref())),
            (labels.birth_date.as_str(), or_blank(record.birth_date.as_deref())),
            (labels.address.as_str(), or_blank(street.as_deref())),
            (labels.city.as_str(), or_blank(address_field(|a| &a.city))),
            (labels.state.as_str(), or_blank(address_field(|a| &a.state))),
            (labels.postcode.as_str(), or_blank(address_field(|a| &a.postcode))),
            (labels.country.as_str(), or_blank(address_field(|a| &a.country))),
            (labels.marital_status.as_str(), or_blank(record.marital_status.as_deref())),
            (labels.language.as_str(), or_blank(record.language.as_deref())),
            (labels.driving_licence.as_str(), driving_licence.to_owned()),
            (labels.social_security.as_str(), social_security.to_owned()),
            (labels.telephone.as_str(), or_blank(record.telecom("phone"))),
            (labels.email.as_str(), or_blank(record.telecom("email"))),
        ])
    }
}

impl DocumentBuilder for PatientInfoDocument<'_> {
    fn kind(&self) -> DocumentKind {
        DocumentKind::PatientInfo
    }

    fn build(&self) -> DocumentResult<DocumentModel> {
        let fields = self.fields()?;

        let mut model = DocumentModel::new(join_words([
            self.record.id.as_str(),
            self.text.title.as_str(),
        ]));
        model
            .title_block(self.text.title.as_str())
            .paragraph(Paragraph::text(self.text.intro.as_str()));

        for (label, value) in fields {
            model.paragraph(Paragraph::text(format!("{label}: {value}")).with_response_line());
        }

        tracing::debug!(patient_id = %self.record.id, "built patient details form");
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"{
        "resourceType": "Patient",
        "id": "123",
        "name": [{"family": "Smith", "given": ["Ann", "Marie"], "prefix": ["Ms."]}],
        "gender": "female",
        "birthDate": "1980-02-29",
        "address": [{"line": ["1 Road", "Flat 3"], "city": "Leeds", "state": "WY", "postalCode": "LS1", "country": "UK"}],
        "maritalStatus": {"text": "Married"},
        "communication": [{"language": {"text": "English"}}],
        "telecom": [{"system": "phone", "value": "0113 496 0000"}],
        "identifier": [
            {"type": {"coding": [{"code": "DL"}]}, "value": "S99948707"},
            {"type": {"coding": [{"code": "SS"}]}, "value": "999-82-1234"}
        ]
    }"#;

    fn record() -> PatientRecord {
        PatientRecord::parse(RECORD).unwrap()
    }

    fn lines(model: &DocumentModel) -> Vec<String> {
        model
            .paragraphs()
            .filter(|p| p.response_line)
            .map(Paragraph::plain_text)
            .collect()
    }

    #[test]
    fn prints_eighteen_lines_each_with_a_response_line() {
        let record = record();
        let text = PatientInfoText::default();
        let model = PatientInfoDocument::new(&record, &text).build().unwrap();

        let lines = lines(&model);
        assert_eq!(lines.len(), PATIENT_INFO_LINE_COUNT);
        assert_eq!(
            lines,
            vec![
                "Patient ID: 123",
                "First name: Ann",
                "Last name: Smith",
                "Title: Ms.",
                "Preferred name: Ann",
                "Gender: female",
                "Date of birth: 1980-02-29",
                "Address: 1 Road, Flat 3",
                "City: Leeds",
                "State: WY",
                "Postcode: LS1",
                "Country: UK",
                "Marital status: Married",
                "Primary language: English",
                "Driving licence number: S99948707",
                "Social security number: 999-82-1234",
                "Telephone: 0113 496 0000",
                "Email: Not recorded",
            ]
        );
    }

    #[test]
    fn missing_driving_licence_fails_closed() {
        let mut record = record();
        record.identifiers.retain(|i| i.type_code.as_deref() != Some("DL"));
        let text = PatientInfoText::default();

        let err = PatientInfoDocument::new(&record, &text).build().unwrap_err();
        assert!(matches!(err, DocumentError::MissingIdentifier(code) if code == "DL"));
    }

    #[test]
    fn missing_social_security_fails_closed() {
        let mut record = record();
        record.identifiers.retain(|i| i.type_code.as_deref() != Some("SS"));
        let text = PatientInfoText::default();

        let err = PatientInfoDocument::new(&record, &text).build().unwrap_err();
        assert!(matches!(err, DocumentError::MissingIdentifier(code) if code == "SS"));
    }

    #[test]
    fn blank_identifier_value_counts_as_missing() {
        let mut record = record();
        for identifier in &mut record.identifiers {
            if identifier.type_code.as_deref() == Some("DL") {
                identifier.value = "  ".into();
            }
        }
        let text = PatientInfoText::default();
        assert!(PatientInfoDocument::new(&record, &text).build().is_err());
    }

    #[test]
    fn optional_fields_fall_back_to_not_recorded() {
        let mut record = record();
        record.addresses.clear();
        record.gender = None;
        let text = PatientInfoText::default();

        let model = PatientInfoDocument::new(&record, &text).build().unwrap();
        let lines = lines(&model);
        assert!(lines.contains(&"Gender: Not recorded".to_string()));
        assert!(lines.contains(&"Address: Not recorded".to_string()));
        assert!(lines.contains(&"Postcode: Not recorded".to_string()));
    }
}
