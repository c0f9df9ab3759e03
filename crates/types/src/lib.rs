//! Validated primitives shared across the patient documents workspace.
//!
//! These types are constructed once at a boundary (HTTP query, CLI argument, FHIR record) and
//! then passed around without re-validation.

use std::fmt;

/// Maximum length accepted for a patient identifier.
pub const MAX_PATIENT_ID_LEN: usize = 64;

/// Errors that can occur when creating validated primitive types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypesError {
    /// The input text was empty or contained only whitespace
    #[error("text cannot be empty")]
    Empty,

    /// The patient identifier cannot be used as an identifier or artifact name prefix
    #[error("invalid patient id '{value}': {reason}")]
    InvalidPatientId { value: String, reason: &'static str },
}

// ============================================================================
// NonEmptyText
// ============================================================================

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::Empty`] if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TypesError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TypesError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// PatientId
// ============================================================================

/// Identifier of a patient in the clinical record source.
///
/// The identifier is opaque to this workspace, but it is embedded in artifact names
/// (`"{id} health data.pdf"`) and in record-source paths, so it must be usable as a single
/// path component: no separators, no `..`, no control characters, at most
/// [`MAX_PATIENT_ID_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatientId(String);

impl PatientId {
    /// Parses and validates a patient identifier.
    ///
    /// Leading and trailing whitespace is trimmed before validation.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::Empty`] for blank input, or [`TypesError::InvalidPatientId`] when
    /// the identifier cannot be used as a single path component.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TypesError> {
        let value = input.as_ref().trim();
        if value.is_empty() {
            return Err(TypesError::Empty);
        }

        let invalid = |reason| TypesError::InvalidPatientId {
            value: value.to_owned(),
            reason,
        };

        if value.chars().count() > MAX_PATIENT_ID_LEN {
            return Err(invalid("longer than 64 characters"));
        }
        if value.contains('/') || value.contains('\\') {
            return Err(invalid("contains a path separator"));
        }
        if value == "." || value.contains("..") {
            return Err(invalid("contains a relative path segment"));
        }
        if value.chars().any(char::is_control) {
            return Err(invalid("contains control characters"));
        }

        Ok(Self(value.to_owned()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PatientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for PatientId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for PatientId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for PatientId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PatientId::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Timestamp
// ============================================================================

/// Issue time of an observation, exactly as the record source reported it.
///
/// Timestamps stay opaque (compared and ordered as text) until a chart needs to place them on a
/// date axis; only then are they parsed, and only that chart fails if parsing does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Timestamp {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Timestamp {
    fn from(value: String) -> Self {
        Self(value)
    }
}
