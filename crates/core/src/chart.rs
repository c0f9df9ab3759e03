//! Chart rendering seam.
//!
//! The health report asks a [`ChartRenderer`] for one image per vital sign. Timestamps stay opaque
//! text until this point; [`parse_series`] turns them into dates for the X axis and fails with
//! [`DocumentError::MalformedTimestamp`] on the first reading it cannot place.

use crate::vitals::VitalSignSeries;
use crate::{DocumentError, DocumentResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use pdoc_types::Timestamp;

/// A rendered chart.
#[derive(Clone, PartialEq, Eq)]
pub struct ChartImage {
    pub png: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

impl std::fmt::Debug for ChartImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartImage")
            .field("png", &format_args!("<{} bytes>", self.png.len()))
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .finish()
    }
}

/// Draws a series as a date-scaled scatter plot.
///
/// Implementations are shared across the threads that render a report's charts in parallel.
pub trait ChartRenderer: Send + Sync {
    /// Render `series` with `title` above the plot and the series unit on the Y axis.
    ///
    /// An empty series still yields a valid, empty plot.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::MalformedTimestamp`] if a reading's timestamp cannot be parsed
    /// - [`DocumentError::Rendering`] if the backend fails
    fn render_chart(&self, series: &VitalSignSeries, title: &str) -> DocumentResult<ChartImage>;
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an observation timestamp into a UTC date-time.
///
/// Accepts RFC 3339 (`2019-06-03T10:15:00+01:00`), the space-separated form with offset
/// (`2019-06-03 10:15:00+01:00`), naive date-times, and bare dates (`2023-01-01`, midnight).
/// Offsets are normalised to UTC.
pub fn parse_timestamp(timestamp: &Timestamp) -> Option<NaiveDateTime> {
    let text = timestamp.as_str().trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.naive_utc());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse every reading of a series into `(date-time, value)` pairs, in series order.
///
/// # Errors
///
/// Returns [`DocumentError::MalformedTimestamp`] for the first unparseable timestamp.
pub fn parse_series(series: &VitalSignSeries) -> DocumentResult<Vec<(NaiveDateTime, f64)>> {
    series
        .points()
        .iter()
        .map(|point| {
            parse_timestamp(&point.timestamp)
                .map(|at| (at, point.value))
                .ok_or_else(|| DocumentError::MalformedTimestamp {
                    series: series.label().to_owned(),
                    value: point.timestamp.to_string(),
                })
        })
        .collect()
}
