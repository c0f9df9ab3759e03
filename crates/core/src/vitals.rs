//! Vital-sign extraction and aggregation.
//!
//! Turns a patient's observations into one time series per requested vital sign:
//!
//! 1. [`extract`] scans observations in source order, keeps only those in the
//!    [`VITAL_SIGNS_CATEGORY`], and collects every component whose label matches exactly.
//! 2. [`aggregate`] runs the extractor once per requested label and keeps the caller's label
//!    order.
//!
//! Series are never sorted: readings appear in the order the record source returned them.
//!
//! # Units
//!
//! A series reports one unit. Under [`UnitPolicy::LastWriteWins`] that is the unit of the last
//! matching component, even if earlier readings used a different one. Every distinct unit seen is
//! kept on the series so mixed units can be logged or, under [`UnitPolicy::Reject`], refused.

use crate::constants::VITAL_SIGNS_CATEGORY;
use crate::{DocumentError, DocumentResult};
use fhir::Observation;
use pdoc_types::Timestamp;
use std::str::FromStr;

// ============================================================================
// Types
// ============================================================================

/// A single reading on a series.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: Timestamp,
    pub value: f64,
}

/// Readings for one vital sign in source order.
#[derive(Clone, Debug, PartialEq)]
pub struct VitalSignSeries {
    label: String,
    points: Vec<SeriesPoint>,
    unit: String,
    units_seen: Vec<String>,
}

impl VitalSignSeries {
    /// An empty series: no readings and an empty unit.
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            points: Vec::new(),
            unit: String::new(),
            units_seen: Vec::new(),
        }
    }

    fn push(&mut self, timestamp: Timestamp, value: f64, unit: &str) {
        self.points.push(SeriesPoint { timestamp, value });
        self.unit = unit.to_owned();
        if !self.units_seen.iter().any(|u| u == unit) {
            self.units_seen.push(unit.to_owned());
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    /// Declared unit: the unit of the last reading, or `""` when there are none.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Distinct units in the order they were first seen.
    pub fn units_seen(&self) -> &[String] {
        &self.units_seen
    }

    pub fn has_conflicting_units(&self) -> bool {
        self.units_seen.len() > 1
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

/// Series keyed by vital-sign label, iterated in the order the labels were requested.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VitalSeriesSet(Vec<VitalSignSeries>);

impl VitalSeriesSet {
    pub fn iter(&self) -> std::slice::Iter<'_, VitalSignSeries> {
        self.0.iter()
    }

    pub fn get(&self, label: &str) -> Option<&VitalSignSeries> {
        self.0.iter().find(|s| s.label == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a VitalSeriesSet {
    type Item = &'a VitalSignSeries;
    type IntoIter = std::slice::Iter<'a, VitalSignSeries>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// What to do when one vital sign is reported in more than one unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitPolicy {
    /// Keep every reading and declare the last unit seen.
    #[default]
    LastWriteWins,
    /// Refuse to build a series from mixed units.
    Reject,
}

impl UnitPolicy {
    /// Apply the policy to an aggregated set.
    ///
    /// Mixed units are always logged; under [`UnitPolicy::Reject`] the first offending series
    /// fails with [`DocumentError::ConflictingUnit`].
    pub fn enforce(self, set: &VitalSeriesSet) -> DocumentResult<()> {
        for series in set.iter().filter(|s| s.has_conflicting_units()) {
            tracing::warn!(
                vital_sign = series.label(),
                units = ?series.units_seen(),
                declared_unit = series.unit(),
                policy = ?self,
                "vital sign reported in mixed units"
            );
            if self == UnitPolicy::Reject {
                return Err(DocumentError::ConflictingUnit {
                    label: series.label().to_owned(),
                    units: series.units_seen().to_vec(),
                });
            }
        }
        Ok(())
    }
}

impl FromStr for UnitPolicy {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-write-wins" | "last_write_wins" => Ok(UnitPolicy::LastWriteWins),
            "reject" => Ok(UnitPolicy::Reject),
            other => Err(DocumentError::InvalidConfig(format!(
                "unknown unit policy '{other}' (expected 'last-write-wins' or 'reject')"
            ))),
        }
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Collect the readings for one vital sign.
///
/// Only observations whose category is [`VITAL_SIGNS_CATEGORY`] are considered, and only
/// components whose label equals `vital_sign` exactly (case-sensitive). Each match appends
/// `(observation.issued_at, component.value)` and sets the declared unit.
///
/// No match is not an error: the result is an empty series with unit `""`.
pub fn extract(observations: &[Observation], vital_sign: &str) -> VitalSignSeries {
    let mut series = VitalSignSeries::empty(vital_sign);

    let vital_observations = observations
        .iter()
        .filter(|o| o.category.as_deref() == Some(VITAL_SIGNS_CATEGORY));

    for observation in vital_observations {
        for component in observation.components.iter().filter(|c| c.label == vital_sign) {
            series.push(observation.issued_at.clone(), component.value, &component.unit);
        }
    }

    series
}

/// Extract one series per requested label, in request order.
///
/// Repeated labels are collapsed to their first occurrence. Never fails: labels with no readings
/// produce empty series.
pub fn aggregate<S: AsRef<str>>(observations: &[Observation], vital_signs: &[S]) -> VitalSeriesSet {
    let mut set: Vec<VitalSignSeries> = Vec::with_capacity(vital_signs.len());

    for label in vital_signs.iter().map(AsRef::as_ref) {
        if set.iter().any(|s| s.label == label) {
            continue;
        }
        set.push(extract(observations, label));
    }

    tracing::debug!(
        observations = observations.len(),
        series = set.len(),
        readings = set.iter().map(VitalSignSeries::len).sum::<usize>(),
        "aggregated vital signs"
    );
    VitalSeriesSet(set)
}
