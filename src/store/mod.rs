use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::ImsResult;
use crate::model::event::Event;
use crate::model::incident::{Incident, IncidentPriority, IncidentState};
use crate::model::report::{IncidentReport, ReportEntry};

#[cfg(test)]
pub(crate) mod failing;
pub mod memory;

pub use memory::InMemoryStorage;

// ---------------------------------------------------------------------------
// Storage trait: everything the API layer reads from or writes to
// ---------------------------------------------------------------------------

/// Backend for events, incidents, incident reports and their administrative
/// tables. Every setter is a single committed write; nothing spans calls.
#[async_trait]
pub trait Storage: Send + Sync {
    // -- Events and access control ------------------------------------------

    /// All known events, ordered by id.
    async fn events(&self) -> ImsResult<Vec<Event>>;

    /// Create an event. Creating an existing event is a no-op.
    async fn create_event(&self, event: &Event) -> ImsResult<()>;

    async fn readers(&self, event: &Event) -> ImsResult<Vec<String>>;

    async fn set_readers(&self, event: &Event, readers: Vec<String>) -> ImsResult<()>;

    async fn writers(&self, event: &Event) -> ImsResult<Vec<String>>;

    async fn set_writers(&self, event: &Event, writers: Vec<String>) -> ImsResult<()>;

    // -- Streets and incident types -----------------------------------------

    /// Concentric streets of an event, keyed by street id.
    async fn concentric_streets(&self, event: &Event) -> ImsResult<BTreeMap<String, String>>;

    async fn create_concentric_street(&self, event: &Event, id: &str, name: &str)
        -> ImsResult<()>;

    /// Incident type names in creation order.
    async fn incident_types(&self, include_hidden: bool) -> ImsResult<Vec<String>>;

    async fn create_incident_type(&self, name: &str, hidden: bool) -> ImsResult<()>;

    async fn show_incident_types(&self, names: &[String]) -> ImsResult<()>;

    async fn hide_incident_types(&self, names: &[String]) -> ImsResult<()>;

    // -- Incidents ----------------------------------------------------------

    async fn incidents(&self, event: &Event) -> ImsResult<Vec<Incident>>;

    async fn incident_with_number(&self, event: &Event, number: u32) -> ImsResult<Incident>;

    /// Store a new incident, assigning its number. Returns the stored copy.
    async fn create_incident(&self, incident: Incident, author: &str) -> ImsResult<Incident>;

    async fn set_incident_priority(
        &self,
        event: &Event,
        number: u32,
        priority: IncidentPriority,
        author: &str,
    ) -> ImsResult<()>;

    async fn set_incident_state(
        &self,
        event: &Event,
        number: u32,
        state: IncidentState,
        author: &str,
    ) -> ImsResult<()>;

    async fn set_incident_summary(
        &self,
        event: &Event,
        number: u32,
        summary: Option<String>,
        author: &str,
    ) -> ImsResult<()>;

    async fn set_incident_location_name(
        &self,
        event: &Event,
        number: u32,
        name: Option<String>,
        author: &str,
    ) -> ImsResult<()>;

    async fn set_incident_location_concentric_street(
        &self,
        event: &Event,
        number: u32,
        street_id: Option<String>,
        author: &str,
    ) -> ImsResult<()>;

    async fn set_incident_location_radial_hour(
        &self,
        event: &Event,
        number: u32,
        hour: Option<u8>,
        author: &str,
    ) -> ImsResult<()>;

    async fn set_incident_location_radial_minute(
        &self,
        event: &Event,
        number: u32,
        minute: Option<u8>,
        author: &str,
    ) -> ImsResult<()>;

    async fn set_incident_location_description(
        &self,
        event: &Event,
        number: u32,
        description: Option<String>,
        author: &str,
    ) -> ImsResult<()>;

    async fn set_incident_ranger_handles(
        &self,
        event: &Event,
        number: u32,
        handles: Vec<String>,
        author: &str,
    ) -> ImsResult<()>;

    async fn set_incident_incident_types(
        &self,
        event: &Event,
        number: u32,
        incident_types: Vec<String>,
        author: &str,
    ) -> ImsResult<()>;

    async fn add_report_entries_to_incident(
        &self,
        event: &Event,
        number: u32,
        entries: Vec<ReportEntry>,
        author: &str,
    ) -> ImsResult<()>;

    // -- Incident reports ---------------------------------------------------

    /// Reports not attached to any incident.
    async fn detached_incident_reports(&self) -> ImsResult<Vec<IncidentReport>>;

    async fn incident_reports_attached_to_incident(
        &self,
        event: &Event,
        incident_number: u32,
    ) -> ImsResult<Vec<IncidentReport>>;

    /// Incidents a report is attached to, as `(event, incident number)`.
    async fn incidents_attached_to_incident_report(
        &self,
        report_number: u32,
    ) -> ImsResult<Vec<(Event, u32)>>;

    async fn incident_report_with_number(&self, number: u32) -> ImsResult<IncidentReport>;

    async fn create_incident_report(
        &self,
        report: IncidentReport,
        author: &str,
    ) -> ImsResult<IncidentReport>;

    async fn set_incident_report_summary(
        &self,
        number: u32,
        summary: Option<String>,
        author: &str,
    ) -> ImsResult<()>;

    async fn add_report_entries_to_incident_report(
        &self,
        number: u32,
        entries: Vec<ReportEntry>,
        author: &str,
    ) -> ImsResult<()>;

    async fn attach_incident_report_to_incident(
        &self,
        report_number: u32,
        event: &Event,
        incident_number: u32,
    ) -> ImsResult<()>;

    async fn detach_incident_report_from_incident(
        &self,
        report_number: u32,
        event: &Event,
        incident_number: u32,
    ) -> ImsResult<()>;
}
