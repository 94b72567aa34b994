use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::event::Event;
use crate::model::report::ReportEntry;

// ---------------------------------------------------------------------------
// Incident: an event-scoped record of something rangers responded to
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub event: Event,
    /// Per-event number, assigned by the store on creation.
    pub number: u32,
    /// Bumped by the store on every write.
    pub version: u64,
    pub created: DateTime<Utc>,
    pub priority: IncidentPriority,
    pub state: IncidentState,
    pub summary: Option<String>,
    pub location: Location,
    pub ranger_handles: Vec<String>,
    pub incident_types: Vec<String>,
    pub report_entries: Vec<ReportEntry>,
}

impl Incident {
    /// A fresh, unnumbered incident in the `new` state.
    pub fn new(event: Event, created: DateTime<Utc>) -> Self {
        Self {
            event,
            number: 0,
            version: 0,
            created,
            priority: IncidentPriority::Normal,
            state: IncidentState::New,
            summary: None,
            location: Location::default(),
            ranger_handles: Vec::new(),
            incident_types: Vec::new(),
            report_entries: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// IncidentState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentState {
    New,
    OnHold,
    Dispatched,
    OnScene,
    Closed,
}

impl IncidentState {
    pub const ALL: [IncidentState; 5] = [
        IncidentState::New,
        IncidentState::OnHold,
        IncidentState::Dispatched,
        IncidentState::OnScene,
        IncidentState::Closed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IncidentState::New => "new",
            IncidentState::OnHold => "on_hold",
            IncidentState::Dispatched => "dispatched",
            IncidentState::OnScene => "on_scene",
            IncidentState::Closed => "closed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.name() == name)
    }
}

impl FromStr for IncidentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown incident state '{s}'"))
    }
}

impl fmt::Display for IncidentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// IncidentPriority: integers on the wire, three buckets in the domain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum IncidentPriority {
    High,
    Normal,
    Low,
}

impl IncidentPriority {
    pub fn from_integer(value: i64) -> Option<Self> {
        match value {
            1 | 2 => Some(IncidentPriority::High),
            3 => Some(IncidentPriority::Normal),
            4 | 5 => Some(IncidentPriority::Low),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> i64 {
        match self {
            IncidentPriority::High => 1,
            IncidentPriority::Normal => 3,
            IncidentPriority::Low => 4,
        }
    }
}

impl TryFrom<i64> for IncidentPriority {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_integer(value).ok_or_else(|| format!("invalid incident priority {value}"))
    }
}

impl From<IncidentPriority> for i64 {
    fn from(priority: IncidentPriority) -> Self {
        priority.as_integer()
    }
}

// ---------------------------------------------------------------------------
// Location: a named place plus a Rod Garett (clock + concentric) address
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type", default)]
    pub address_type: AddressType,
    #[serde(default)]
    pub name: Option<String>,
    /// Concentric street id within the event's street table.
    #[serde(default)]
    pub concentric: Option<String>,
    #[serde(default)]
    pub radial_hour: Option<u8>,
    #[serde(default)]
    pub radial_minute: Option<u8>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    #[default]
    Garett,
}
