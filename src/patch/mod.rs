//! Partial updates of incidents and incident reports.
//!
//! A patch document is a JSON object naming only the fields to change.
//! Applying one happens in two phases: the whole document is validated and
//! cast to domain types first, then each present field is written through
//! its own storage setter. A rejection therefore never leaves partial
//! writes behind; a storage failure during the second phase does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::model::report::ReportEntry;

pub mod incident;
pub mod report;

pub use incident::{apply_incident_patch, IncidentEdits, IncidentPatch, LocationPatch};
pub use report::{
    apply_incident_report_patch, AttachAction, IncidentReportEdits, IncidentReportPatch,
    ReportAttachment,
};

// ---------------------------------------------------------------------------
// Patch<T>: three-way field update
// ---------------------------------------------------------------------------

/// Presence of a single field in a patch document.
///
/// - `Keep`: the key is absent; leave the field alone
/// - `Clear`: the key is present with `null`
/// - `Set(T)`: the key is present with a value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Patch<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    /// `None` when absent; `Some(None)` for null; `Some(Some(v))` for a value.
    pub fn into_update(self) -> Option<Option<T>> {
        match self {
            Patch::Keep => None,
            Patch::Clear => Some(None),
            Patch::Set(value) => Some(Some(value)),
        }
    }

    /// Like [`Patch::into_update`] for fields that may not be null.
    pub fn into_required(self, field: &'static str) -> Result<Option<T>, PatchRejection> {
        match self {
            Patch::Keep => Ok(None),
            Patch::Clear => Err(PatchRejection::invalid(field, "may not be null")),
            Patch::Set(value) => Ok(Some(value)),
        }
    }

    pub fn try_map<U, F>(self, cast: F) -> Result<Patch<U>, PatchRejection>
    where
        F: FnOnce(T) -> Result<U, PatchRejection>,
    {
        Ok(match self {
            Patch::Keep => Patch::Keep,
            Patch::Clear => Patch::Clear,
            Patch::Set(value) => Patch::Set(cast(value)?),
        })
    }
}

// Absent keys are handled by `#[serde(default)]`; anything that reaches the
// deserializer is present.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            None => Patch::Clear,
            Some(value) => Patch::Set(value),
        })
    }
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Incident,
    IncidentReport,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Incident => "Incident",
            EntityKind::IncidentReport => "Incident report",
        })
    }
}

/// Why a patch document was refused before any write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchRejection {
    #[error("JSON {} must be a dictionary", .kind.to_string().to_lowercase())]
    NotAnObject { kind: EntityKind },

    #[error("{kind} number may not be modified")]
    NumberModified { kind: EntityKind },

    #[error("{kind} created time may not be modified")]
    CreatedModified { kind: EntityKind },

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Invalid incident state: {0}")]
    InvalidState(String),

    #[error("Invalid incident priority: {0}")]
    InvalidPriority(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),
}

impl PatchRejection {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PatchRejection::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared validation
// ---------------------------------------------------------------------------

const NUMBER_KEY: &str = "number";
const CREATED_KEY: &str = "created";

/// Check the document root and its immutable identity keys.
pub(crate) fn check_identity(
    document: &Value,
    kind: EntityKind,
    number: u32,
) -> Result<&Map<String, Value>, PatchRejection> {
    let object = document
        .as_object()
        .ok_or(PatchRejection::NotAnObject { kind })?;

    if let Some(given) = object.get(NUMBER_KEY) {
        if !same_number(given, number) {
            return Err(PatchRejection::NumberModified { kind });
        }
    }

    if object.contains_key(CREATED_KEY) {
        return Err(PatchRejection::CreatedModified { kind });
    }

    Ok(object)
}

/// Integers and floats compare by value: `7.0` names entity 7.
fn same_number(given: &Value, number: u32) -> bool {
    match given.as_u64() {
        Some(given) => given == u64::from(number),
        None => given.as_f64() == Some(f64::from(number)),
    }
}

/// Deserialize a checked document into its wire patch type.
pub(crate) fn parse_document<T>(object: &Map<String, Value>) -> Result<T, PatchRejection>
where
    T: for<'de> Deserialize<'de>,
{
    T::deserialize(Value::Object(object.clone()))
        .map_err(|err| PatchRejection::invalid("document", err.to_string()))
}

/// A report entry as submitted in a patch; only `text` is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportEntryPatch {
    #[serde(default)]
    pub text: Option<String>,
}

/// Texts of the entries to append; empty or missing texts are skipped.
pub(crate) fn entry_texts(
    entries: Patch<Vec<ReportEntryPatch>>,
) -> Result<Option<Vec<String>>, PatchRejection> {
    let entries = match entries.into_required("report_entries")? {
        Some(entries) => entries,
        None => return Ok(None),
    };
    Ok(Some(
        entries
            .into_iter()
            .filter_map(|entry| entry.text)
            .filter(|text| !text.is_empty())
            .collect(),
    ))
}

/// Build the entries for one request, all sharing one timestamp.
pub(crate) fn new_entries(texts: Vec<String>, author: &str, now: DateTime<Utc>) -> Vec<ReportEntry> {
    texts
        .into_iter()
        .map(|text| ReportEntry::new(author, text, now))
        .collect()
}
