//! Declarative text catalog for patient documents.
//!
//! Every piece of fixed wording printed on a document lives here rather than in the builders:
//! titles, questions, Likert labels, field labels and the list of vital signs the health report
//! charts. The built-in [`TextCatalog::default`] reproduces the long-standing wording; a YAML file
//! may override any subset of it.
//!
//! ```yaml
//! feedback:
//!   title: Patient Feedback Form
//!   likert_options: [Extremely Likely, Likely, Unlikely, Extremely Unlikely]
//! health_report:
//!   vital_signs: [Body Weight, Heart rate]
//! ```
//!
//! Unknown keys are rejected so that a typo in an override does not silently fall back to the
//! default wording.

use crate::{DocumentError, DocumentResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of options on the recommendation scale.
pub const LIKERT_OPTION_COUNT: usize = 4;

// ============================================================================
// Catalog sections
// ============================================================================

/// The five prompts attached to every feedback document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedbackQuestionSet {
    pub intro: String,
    pub recommendation: String,
    pub comment: String,
    pub hospital: String,
    pub clinic: String,
}

impl Default for FeedbackQuestionSet {
    fn default() -> Self {
        Self {
            intro: "We welcome all feedback on the services we provide to tell us what we are \
                    doing right and where we can improve."
                .into(),
            recommendation: "Based on your recent experience of our services, how likely are you \
                             to recommend us to friends or family if they needed similar care or \
                             treatment?"
                .into(),
            comment: "With regards to your response to the previous question, what is the main \
                      reason you feel this way?"
                .into(),
            hospital: "What is the name of the hospital where you received treatment?".into(),
            clinic: "What is the name of the clinic/department where you were treated?".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedbackText {
    pub title: String,
    /// Salutation placed before the patient's name.
    pub greeting: String,
    pub questions: FeedbackQuestionSet,
    pub tick_instruction: String,
    pub likert_options: Vec<String>,
    /// Blank lines inside the free-text comment box.
    pub comment_box_lines: usize,
}

impl Default for FeedbackText {
    fn default() -> Self {
        Self {
            title: "Patient Feedback Form".into(),
            greeting: "Hello".into(),
            questions: FeedbackQuestionSet::default(),
            tick_instruction: "Please tick your choice from the options below.".into(),
            likert_options: vec![
                "Extremely Likely".into(),
                "Likely".into(),
                "Unlikely".into(),
                "Extremely Unlikely".into(),
            ],
            comment_box_lines: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthReportText {
    pub title: String,
    pub name_label: String,
    pub id_label: String,
    pub explanation: String,
    /// Vital signs charted, in section order.
    pub vital_signs: Vec<String>,
    /// Shown in place of a chart whose readings carry an unreadable date.
    pub chart_unavailable: String,
}

impl Default for HealthReportText {
    fn default() -> Self {
        Self {
            title: "Patient Health Data".into(),
            name_label: "Name: ".into(),
            id_label: "ID: ".into(),
            explanation: "The charts below show the readings recorded for each of your vital \
                          signs, in the order they were recorded."
                .into(),
            vital_signs: vec![
                "Body Weight".into(),
                "Heart rate".into(),
                "Respiratory rate".into(),
                "Body Mass Index".into(),
                "Diastolic Blood Pressure".into(),
                "Systolic Blood Pressure".into(),
            ],
            chart_unavailable: "Chart unavailable: one or more readings have an unreadable date."
                .into(),
        }
    }
}

/// Labels of the eighteen lines on the personal details form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatientInfoLabels {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub prefix: String,
    pub preferred_name: String,
    pub gender: String,
    pub birth_date: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
    pub marital_status: String,
    pub language: String,
    pub driving_licence: String,
    pub social_security: String,
    pub telephone: String,
    pub email: String,
}

impl Default for PatientInfoLabels {
    fn default() -> Self {
        Self {
            id: "Patient ID".into(),
            first_name: "First name".into(),
            last_name: "Last name".into(),
            prefix: "Title".into(),
            preferred_name: "Preferred name".into(),
            gender: "Gender".into(),
            birth_date: "Date of birth".into(),
            address: "Address".into(),
            city: "City".into(),
            state: "State".into(),
            postcode: "Postcode".into(),
            country: "Country".into(),
            marital_status: "Marital status".into(),
            language: "Primary language".into(),
            driving_licence: "Driving licence number".into(),
            social_security: "Social security number".into(),
            telephone: "Telephone".into(),
            email: "Email".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatientInfoText {
    pub title: String,
    pub intro: String,
    /// Printed for optional fields the record does not hold.
    pub not_recorded: String,
    pub labels: PatientInfoLabels,
}

impl Default for PatientInfoText {
    fn default() -> Self {
        Self {
            title: "Patient Details".into(),
            intro: "Please check the details we hold about you. If anything is wrong or missing, \
                    write the correct details on the line below it and return this form to us."
                .into(),
            not_recorded: "Not recorded".into(),
            labels: PatientInfoLabels::default(),
        }
    }
}

// ============================================================================
// TextCatalog
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextCatalog {
    pub feedback: FeedbackText,
    pub health_report: HealthReportText,
    pub patient_info: PatientInfoText,
}

impl TextCatalog {
    /// Parse a catalog from YAML; missing keys take their default wording.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Catalog`] naming the failing path (e.g. `feedback.likert_options`)
    /// if the YAML does not match the schema, or if [`TextCatalog::validate`] fails.
    pub fn from_yaml_str(yaml_text: &str) -> DocumentResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let catalog: TextCatalog = serde_path_to_error::deserialize(deserializer).map_err(|err| {
            let path = err.path().to_string();
            let source = err.into_inner();
            DocumentError::Catalog(format!("schema mismatch at {path}: {source}"))
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Read and parse a catalog file.
    pub fn load(path: &Path) -> DocumentResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DocumentError::Catalog(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml(&self) -> DocumentResult<String> {
        serde_yaml::to_string(self).map_err(|e| DocumentError::Catalog(e.to_string()))
    }

    /// Check the structural constraints builders rely on.
    pub fn validate(&self) -> DocumentResult<()> {
        let invalid = |msg: String| Err(DocumentError::Catalog(msg));

        if self.feedback.likert_options.len() != LIKERT_OPTION_COUNT {
            return invalid(format!(
                "feedback.likert_options must have exactly {LIKERT_OPTION_COUNT} entries, found {}",
                self.feedback.likert_options.len()
            ));
        }
        if self.feedback.comment_box_lines == 0 {
            return invalid("feedback.comment_box_lines must be at least 1".into());
        }

        let vitals = &self.health_report.vital_signs;
        if vitals.is_empty() {
            return invalid("health_report.vital_signs must not be empty".into());
        }
        for (index, label) in vitals.iter().enumerate() {
            if label.trim().is_empty() {
                return invalid(format!("health_report.vital_signs[{index}] is blank"));
            }
            if vitals[..index].contains(label) {
                return invalid(format!("health_report.vital_signs lists '{label}' twice"));
            }
        }

        for (field, title) in [
            ("feedback.title", &self.feedback.title),
            ("health_report.title", &self.health_report.title),
            ("patient_info.title", &self.patient_info.title),
        ] {
            if title.trim().is_empty() {
                return invalid(format!("{field} must not be empty"));
            }
        }

        Ok(())
    }
}
