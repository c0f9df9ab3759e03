//! Constants used throughout the patient documents core crate.
//!
//! This module contains the sentinel values, default container names and layout constants
//! shared by the builders, the persister and the configuration layer.

/// Observation category that marks a vital-sign reading. Anything else is ignored.
pub const VITAL_SIGNS_CATEGORY: &str = fhir::VITAL_SIGNS_CATEGORY;

/// Default container for feedback request documents.
pub const DEFAULT_FEEDBACK_CONTAINER: &str = "feedbackforms";

/// Default container for health data reports.
pub const DEFAULT_HEALTH_DATA_CONTAINER: &str = "patienthealthdata";

/// Default container for personal details forms.
pub const DEFAULT_PATIENT_INFO_CONTAINER: &str = "patientinfo";

/// Default upper bound on a single document request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Display height of each vital-sign chart in the health report.
pub const CHART_DISPLAY_HEIGHT_INCHES: f32 = 3.5;

/// Prefix of scratch files staged by the persister.
pub const SCRATCH_FILE_PREFIX: &str = "pdoc-";

/// Line printed under a question for the patient to write on.
pub const RESPONSE_LINE: &str = "________________________________________________________";

/// Identifier type code for a driving licence number.
pub const DRIVING_LICENCE_CODE: &str = "DL";

/// Identifier type code for a social security number.
pub const SOCIAL_SECURITY_CODE: &str = "SS";
