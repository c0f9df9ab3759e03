//! FHIR-aligned patient wire models and translation helpers.
//!
//! This module provides both domain-level types and the wire model for `Patient` resources,
//! which carry the demographics and identification details printed on patient documents.
//!
//! Responsibilities:
//! - Define public domain-level types for document assembly
//! - Define a wire model for deserialisation of FHIR R4 JSON
//! - Provide translation helpers from the wire model to the domain record
//! - Derive the [`PatientIdentity`] (name + first address) that letters are addressed to
//!
//! Notes:
//! - Only the first name and the first address are used for letters; the full lists are kept
//!   on [`PatientRecord`] for completeness.

use crate::datatypes::CodeableConceptWire;
use crate::{FhirError, FhirResult};
use pdoc_types::PatientId;
use serde::{Deserialize, Serialize};

// ============================================================================
// Public domain-level types
// ============================================================================

/// A person's name split into the parts letters are addressed with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersonName {
    /// Honorific, e.g. `"Mrs."`. Multiple FHIR prefixes are joined with a space.
    pub prefix: Option<String>,

    /// Given names (first name, middle names).
    pub given: Vec<String>,

    /// Family name (surname).
    pub family: Option<String>,
}

impl PersonName {
    /// First given name, if any.
    pub fn first_name(&self) -> Option<&str> {
        self.given.first().map(String::as_str)
    }
}

/// Postal address as printed in a letter's address block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub address_lines: Vec<String>,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
}

/// A telecom entry (`phone`, `email`, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactPoint {
    pub system: Option<String>,
    pub value: String,
}

/// A business identifier keyed by its type code (e.g. `DL` driving licence, `SS` social
/// security number).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identifier {
    pub type_code: Option<String>,
    pub value: String,
}

/// The name and address a patient-facing letter is addressed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientIdentity {
    pub prefix: String,
    pub first_name: String,
    pub last_name: String,
    pub address: PostalAddress,
}

/// Domain-level carrier for a patient's demographics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientRecord {
    pub id: PatientId,

    /// First listed name, if any.
    pub name: Option<PersonName>,

    /// Addresses in source order.
    pub addresses: Vec<PostalAddress>,

    pub gender: Option<String>,

    /// Date of birth as reported (ISO 8601 date).
    pub birth_date: Option<String>,

    pub marital_status: Option<String>,

    /// First communication language.
    pub language: Option<String>,

    pub telecom: Vec<ContactPoint>,

    pub identifiers: Vec<Identifier>,
}

impl PatientRecord {
    /// Parse a `Patient` resource from JSON text.
    ///
    /// This uses `serde_path_to_error` to surface the path (e.g. `address[0].line`) of the
    /// failing field when the JSON does not match the wire schema.
    ///
    /// # Arguments
    ///
    /// * `json_text` - JSON text expected to represent a FHIR R4 `Patient` resource.
    ///
    /// # Returns
    ///
    /// Returns a [`PatientRecord`] with domain-level fields extracted from the resource.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - the text is not JSON,
    /// - resourceType is not "Patient",
    /// - any declared field has an unexpected type,
    /// - `id` is missing or is not a usable patient identifier.
    pub fn parse(json_text: &str) -> FhirResult<Self> {
        let value = crate::parse_resource_text(json_text, "Patient")?;
        let wire: PatientWire = crate::from_json_value(value, "Patient")?;
        wire_to_domain(wire)
    }

    /// Derive the addressee of a letter: first name entry and first address.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Translation`] if the record has no given name, no family name or no
    /// address. A letter cannot be addressed without them.
    pub fn identity(&self) -> FhirResult<PatientIdentity> {
        let missing = |what: &str| {
            FhirError::Translation(format!("Patient {} has no {what}", self.id))
        };

        let name = self.name.as_ref().ok_or_else(|| missing("name"))?;
        let first_name = name.first_name().ok_or_else(|| missing("given name"))?;
        let last_name = name.family.as_deref().ok_or_else(|| missing("family name"))?;
        let address = self.addresses.first().ok_or_else(|| missing("address"))?;

        Ok(PatientIdentity {
            prefix: name.prefix.clone().unwrap_or_default(),
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            address: address.clone(),
        })
    }

    /// Full display name: prefix, given names and family name joined by spaces.
    ///
    /// Falls back to the patient id when the record has no name.
    pub fn full_name(&self) -> String {
        let Some(name) = &self.name else {
            return self.id.to_string();
        };

        let parts: Vec<&str> = name
            .prefix
            .as_deref()
            .into_iter()
            .chain(name.given.iter().map(String::as_str))
            .chain(name.family.as_deref())
            .filter(|part| !part.trim().is_empty())
            .collect();

        if parts.is_empty() {
            self.id.to_string()
        } else {
            parts.join(" ")
        }
    }

    /// Look up an identifier value by its type code (e.g. `"DL"`).
    pub fn identifier(&self, type_code: &str) -> Option<&str> {
        self.identifiers
            .iter()
            .find(|i| i.type_code.as_deref() == Some(type_code))
            .map(|i| i.value.as_str())
    }

    /// First telecom value for the given system (`"phone"`, `"email"`).
    pub fn telecom(&self, system: &str) -> Option<&str> {
        self.telecom
            .iter()
            .find(|t| t.system.as_deref() == Some(system))
            .map(|t| t.value.as_str())
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
struct PatientWire {
    id: Option<String>,

    #[serde(default)]
    name: Vec<HumanNameWire>,

    #[serde(default)]
    gender: Option<String>,

    #[serde(rename = "birthDate", default)]
    birth_date: Option<String>,

    #[serde(default)]
    address: Vec<AddressWire>,

    #[serde(rename = "maritalStatus", default)]
    marital_status: Option<CodeableConceptWire>,

    #[serde(default)]
    communication: Vec<CommunicationWire>,

    #[serde(default)]
    telecom: Vec<ContactPointWire>,

    #[serde(default)]
    identifier: Vec<IdentifierWire>,
}

#[derive(Clone, Debug, Deserialize)]
struct HumanNameWire {
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    given: Vec<String>,
    #[serde(default)]
    prefix: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct AddressWire {
    #[serde(default)]
    line: Vec<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(rename = "postalCode", default)]
    postal_code: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct CommunicationWire {
    language: CodeableConceptWire,
}

#[derive(Clone, Debug, Deserialize)]
struct ContactPointWire {
    #[serde(default)]
    system: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct IdentifierWire {
    #[serde(rename = "type", default)]
    type_: Option<CodeableConceptWire>,
    #[serde(default)]
    value: Option<String>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn wire_to_domain(wire: PatientWire) -> FhirResult<PatientRecord> {
    let id = wire
        .id
        .ok_or_else(|| FhirError::Translation("Patient resource has no id".into()))?;
    let id = PatientId::parse(&id)?;

    let name = wire.name.into_iter().next().map(|n| PersonName {
        prefix: (!n.prefix.is_empty()).then(|| n.prefix.join(" ")),
        given: n.given,
        family: n.family,
    });

    let addresses = wire
        .address
        .into_iter()
        .map(|a| PostalAddress {
            address_lines: a.line,
            city: a.city.unwrap_or_default(),
            state: a.state.unwrap_or_default(),
            postcode: a.postal_code.unwrap_or_default(),
            country: a.country.unwrap_or_default(),
        })
        .collect();

    let language = wire
        .communication
        .first()
        .and_then(|c| c.language.text_label())
        .map(str::to_owned);

    let marital_status = wire
        .marital_status
        .as_ref()
        .and_then(CodeableConceptWire::text_label)
        .map(str::to_owned);

    let telecom = wire
        .telecom
        .into_iter()
        .filter_map(|t| {
            Some(ContactPoint {
                system: t.system,
                value: t.value?,
            })
        })
        .collect();

    let identifiers = wire
        .identifier
        .into_iter()
        .filter_map(|i| {
            Some(Identifier {
                type_code: i.type_.as_ref().and_then(|t| t.first_code()).map(str::to_owned),
                value: i.value?,
            })
        })
        .collect();

    Ok(PatientRecord {
        id,
        name,
        addresses,
        gender: wire.gender,
        birth_date: wire.birth_date,
        marital_status,
        language,
        telecom,
        identifiers,
    })
}
