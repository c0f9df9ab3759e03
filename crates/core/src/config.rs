//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.
//!
//! The `*_from_env_value` helpers take the raw value of an environment variable (or `None`) so
//! binaries can read the environment once and tests can exercise parsing without touching it.

use crate::catalog::TextCatalog;
use crate::constants::{
    DEFAULT_FEEDBACK_CONTAINER, DEFAULT_HEALTH_DATA_CONTAINER, DEFAULT_PATIENT_INFO_CONTAINER,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::vitals::UnitPolicy;
use crate::{DocumentError, DocumentResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// ContainerNames
// ============================================================================

/// Storage container per document kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerNames {
    feedback: String,
    health_data: String,
    patient_info: String,
}

impl ContainerNames {
    /// Create a validated set of container names.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidConfig`] if any name fails
    /// [`pdoc_files::validate_container_name`].
    pub fn new(
        feedback: impl Into<String>,
        health_data: impl Into<String>,
        patient_info: impl Into<String>,
    ) -> DocumentResult<Self> {
        let names = Self {
            feedback: feedback.into(),
            health_data: health_data.into(),
            patient_info: patient_info.into(),
        };
        for name in [&names.feedback, &names.health_data, &names.patient_info] {
            pdoc_files::validate_container_name(name)
                .map_err(|e| DocumentError::InvalidConfig(e.to_string()))?;
        }
        Ok(names)
    }

    /// Override individual names from optional environment values, keeping defaults otherwise.
    pub fn from_env_values(
        feedback: Option<String>,
        health_data: Option<String>,
        patient_info: Option<String>,
    ) -> DocumentResult<Self> {
        fn or_default(value: Option<String>, default: &str) -> String {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        }

        Self::new(
            or_default(feedback, DEFAULT_FEEDBACK_CONTAINER),
            or_default(health_data, DEFAULT_HEALTH_DATA_CONTAINER),
            or_default(patient_info, DEFAULT_PATIENT_INFO_CONTAINER),
        )
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    pub fn health_data(&self) -> &str {
        &self.health_data
    }

    pub fn patient_info(&self) -> &str {
        &self.patient_info
    }
}

impl Default for ContainerNames {
    fn default() -> Self {
        Self {
            feedback: DEFAULT_FEEDBACK_CONTAINER.into(),
            health_data: DEFAULT_HEALTH_DATA_CONTAINER.into(),
            patient_info: DEFAULT_PATIENT_INFO_CONTAINER.into(),
        }
    }
}

// ============================================================================
// CoreConfig
// ============================================================================

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    containers: ContainerNames,
    scratch_dir: Option<PathBuf>,
    request_timeout: Duration,
    unit_policy: UnitPolicy,
    catalog: TextCatalog,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Arguments
    ///
    /// * `containers` - Storage container per document kind.
    /// * `scratch_dir` - Directory for staged scratch files, or `None` to render in memory only.
    /// * `request_timeout` - Upper bound on one document request.
    /// * `unit_policy` - What to do when a series mixes units.
    /// * `catalog` - Validated document wording.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidConfig`] if the timeout is zero or the scratch directory
    /// is not an existing directory.
    pub fn new(
        containers: ContainerNames,
        scratch_dir: Option<PathBuf>,
        request_timeout: Duration,
        unit_policy: UnitPolicy,
        catalog: TextCatalog,
    ) -> DocumentResult<Self> {
        if request_timeout.is_zero() {
            return Err(DocumentError::InvalidConfig(
                "request timeout must be greater than zero".into(),
            ));
        }

        if let Some(dir) = &scratch_dir {
            if !dir.is_dir() {
                return Err(DocumentError::InvalidConfig(format!(
                    "scratch directory does not exist: {}",
                    dir.display()
                )));
            }
        }

        Ok(Self {
            containers,
            scratch_dir,
            request_timeout,
            unit_policy,
            catalog,
        })
    }

    pub fn containers(&self) -> &ContainerNames {
        &self.containers
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn unit_policy(&self) -> UnitPolicy {
        self.unit_policy
    }

    pub fn catalog(&self) -> &TextCatalog {
        &self.catalog
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            containers: ContainerNames::default(),
            scratch_dir: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            unit_policy: UnitPolicy::default(),
            catalog: TextCatalog::default(),
        }
    }
}

// ============================================================================
// Environment value parsing
// ============================================================================

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the unit policy from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`UnitPolicy::LastWriteWins`].
pub fn unit_policy_from_env_value(value: Option<String>) -> DocumentResult<UnitPolicy> {
    let parsed = non_blank(value).map(|v| v.parse::<UnitPolicy>()).transpose()?;
    Ok(parsed.unwrap_or_default())
}

/// Parse the request timeout in whole seconds.
///
/// If `value` is `None` or empty/whitespace, returns the default of
/// [`DEFAULT_REQUEST_TIMEOUT_SECS`] seconds.
pub fn request_timeout_from_env_value(value: Option<String>) -> DocumentResult<Duration> {
    let Some(value) = non_blank(value) else {
        return Ok(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
    };

    let secs = value.parse::<u64>().map_err(|_| {
        DocumentError::InvalidConfig(format!(
            "request timeout must be a whole number of seconds, got '{value}'"
        ))
    })?;
    if secs == 0 {
        return Err(DocumentError::InvalidConfig(
            "request timeout must be greater than zero".into(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Resolve the optional scratch directory.
pub fn scratch_dir_from_env_value(value: Option<String>) -> Option<PathBuf> {
    non_blank(value).map(PathBuf::from)
}

/// Load the text catalog from an optional file path, falling back to the built-in wording.
pub fn catalog_from_env_value(value: Option<String>) -> DocumentResult<TextCatalog> {
    match non_blank(value) {
        Some(path) => TextCatalog::load(Path::new(&path)),
        None => Ok(TextCatalog::default()),
    }
}
