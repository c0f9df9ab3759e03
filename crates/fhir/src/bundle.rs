//! FHIR `Bundle` (searchset) support.
//!
//! Observation searches come back as bundles, possibly paged via `link[relation=next]`.
//! Entries that are not observations (for example an `OperationOutcome` included by the server)
//! are skipped. An observation outside the vital-signs category that cannot be translated (a lab
//! result timed by `effectivePeriod`, say) is skipped with a warning; a malformed vital-signs
//! observation fails the whole bundle with the entry index in the error.

use crate::observation::{raw_category, Observation};
use crate::{FhirError, FhirResult, VITAL_SIGNS_CATEGORY};
use serde::Deserialize;

/// A parsed searchset page.
#[derive(Clone, Debug, PartialEq)]
pub struct Bundle {
    pub observations: Vec<Observation>,

    /// URL of the next page, if the server paged the results.
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BundleWire {
    #[serde(default)]
    link: Vec<LinkWire>,
    #[serde(default)]
    entry: Vec<EntryWire>,
}

#[derive(Debug, Deserialize)]
struct LinkWire {
    relation: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct EntryWire {
    #[serde(default)]
    resource: Option<serde_json::Value>,
}

impl Bundle {
    /// Parse a `Bundle` of observations from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the text is not a bundle or any observation entry is malformed.
    pub fn parse(json_text: &str) -> FhirResult<Self> {
        let value = crate::parse_resource_text(json_text, "Bundle")?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> FhirResult<Self> {
        let wire: BundleWire = crate::from_json_value(value, "Bundle")?;

        let next = wire
            .link
            .into_iter()
            .find(|l| l.relation == "next")
            .map(|l| l.url);

        let mut observations = Vec::new();
        for (index, entry) in wire.entry.into_iter().enumerate() {
            let Some(resource) = entry.resource else {
                continue;
            };
            let resource_type = resource.get("resourceType").and_then(|v| v.as_str());
            if resource_type != Some("Observation") {
                continue;
            }
            let vital_sign = raw_category(&resource) == Some(VITAL_SIGNS_CATEGORY);
            match Observation::from_value(resource) {
                Ok(observation) => observations.push(observation),
                Err(e) if !vital_sign => {
                    tracing::warn!(entry = index, error = %e, "skipping untranslatable non-vital-signs observation");
                }
                Err(e) => {
                    return Err(FhirError::Translation(format!("Bundle entry[{index}]: {e}")));
                }
            }
        }

        Ok(Self { observations, next })
    }
}
