use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single narrative line attached to an incident or incident report.
/// Entries are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub author: String,
    pub text: String,
    pub created: DateTime<Utc>,
    /// True for entries written by the system itself (e.g. change logs).
    #[serde(default)]
    pub system_entry: bool,
}

impl ReportEntry {
    pub fn new(author: impl Into<String>, text: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            created,
            system_entry: false,
        }
    }
}

/// A report filed by anyone, optionally attached to one or more incidents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentReport {
    /// Global number, assigned by the store on creation.
    pub number: u32,
    pub version: u64,
    pub created: DateTime<Utc>,
    pub summary: Option<String>,
    pub report_entries: Vec<ReportEntry>,
}

impl IncidentReport {
    pub fn new(created: DateTime<Utc>) -> Self {
        Self {
            number: 0,
            version: 0,
            created,
            summary: None,
            report_entries: Vec::new(),
        }
    }

    pub fn has_author(&self, handle: &str) -> bool {
        self.report_entries
            .iter()
            .any(|entry| !entry.system_entry && entry.author == handle)
    }
}
