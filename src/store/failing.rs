//! Test double: in-memory storage whose setter for one field always fails.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::{ImsError, ImsResult};
use crate::model::event::Event;
use crate::model::incident::{Incident, IncidentPriority, IncidentState};
use crate::model::report::{IncidentReport, ReportEntry};
use crate::store::{InMemoryStorage, Storage};

pub struct FailingStorage {
    pub inner: InMemoryStorage,
    fail_on: &'static str,
}

impl FailingStorage {
    /// Fail every write to `field` (the name the hub announces it under).
    pub fn new(inner: InMemoryStorage, fail_on: &'static str) -> Self {
        Self { inner, fail_on }
    }

    fn check(&self, field: &str) -> ImsResult<()> {
        if field == self.fail_on {
            return Err(ImsError::Storage(format!("write to {field} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn events(&self) -> ImsResult<Vec<Event>> {
        self.inner.events().await
    }

    async fn create_event(&self, event: &Event) -> ImsResult<()> {
        self.inner.create_event(event).await
    }

    async fn readers(&self, event: &Event) -> ImsResult<Vec<String>> {
        self.inner.readers(event).await
    }

    async fn set_readers(&self, event: &Event, readers: Vec<String>) -> ImsResult<()> {
        self.check("readers")?;
        self.inner.set_readers(event, readers).await
    }

    async fn writers(&self, event: &Event) -> ImsResult<Vec<String>> {
        self.inner.writers(event).await
    }

    async fn set_writers(&self, event: &Event, writers: Vec<String>) -> ImsResult<()> {
        self.check("writers")?;
        self.inner.set_writers(event, writers).await
    }

    async fn concentric_streets(&self, event: &Event) -> ImsResult<BTreeMap<String, String>> {
        self.inner.concentric_streets(event).await
    }

    async fn create_concentric_street(
        &self,
        event: &Event,
        id: &str,
        name: &str,
    ) -> ImsResult<()> {
        self.inner.create_concentric_street(event, id, name).await
    }

    async fn incident_types(&self, include_hidden: bool) -> ImsResult<Vec<String>> {
        self.inner.incident_types(include_hidden).await
    }

    async fn create_incident_type(&self, name: &str, hidden: bool) -> ImsResult<()> {
        self.inner.create_incident_type(name, hidden).await
    }

    async fn show_incident_types(&self, names: &[String]) -> ImsResult<()> {
        self.inner.show_incident_types(names).await
    }

    async fn hide_incident_types(&self, names: &[String]) -> ImsResult<()> {
        self.inner.hide_incident_types(names).await
    }

    async fn incidents(&self, event: &Event) -> ImsResult<Vec<Incident>> {
        self.inner.incidents(event).await
    }

    async fn incident_with_number(&self, event: &Event, number: u32) -> ImsResult<Incident> {
        self.inner.incident_with_number(event, number).await
    }

    async fn create_incident(&self, incident: Incident, author: &str) -> ImsResult<Incident> {
        self.inner.create_incident(incident, author).await
    }

    async fn set_incident_priority(
        &self,
        event: &Event,
        number: u32,
        priority: IncidentPriority,
        author: &str,
    ) -> ImsResult<()> {
        self.check("priority")?;
        self.inner.set_incident_priority(event, number, priority, author).await
    }

    async fn set_incident_state(
        &self,
        event: &Event,
        number: u32,
        state: IncidentState,
        author: &str,
    ) -> ImsResult<()> {
        self.check("state")?;
        self.inner.set_incident_state(event, number, state, author).await
    }

    async fn set_incident_summary(
        &self,
        event: &Event,
        number: u32,
        summary: Option<String>,
        author: &str,
    ) -> ImsResult<()> {
        self.check("summary")?;
        self.inner.set_incident_summary(event, number, summary, author).await
    }

    async fn set_incident_location_name(
        &self,
        event: &Event,
        number: u32,
        name: Option<String>,
        author: &str,
    ) -> ImsResult<()> {
        self.check("location_name")?;
        self.inner.set_incident_location_name(event, number, name, author).await
    }

    async fn set_incident_location_concentric_street(
        &self,
        event: &Event,
        number: u32,
        street_id: Option<String>,
        author: &str,
    ) -> ImsResult<()> {
        self.check("location_concentric")?;
        self.inner
            .set_incident_location_concentric_street(event, number, street_id, author)
            .await
    }

    async fn set_incident_location_radial_hour(
        &self,
        event: &Event,
        number: u32,
        hour: Option<u8>,
        author: &str,
    ) -> ImsResult<()> {
        self.check("location_radial_hour")?;
        self.inner.set_incident_location_radial_hour(event, number, hour, author).await
    }

    async fn set_incident_location_radial_minute(
        &self,
        event: &Event,
        number: u32,
        minute: Option<u8>,
        author: &str,
    ) -> ImsResult<()> {
        self.check("location_radial_minute")?;
        self.inner.set_incident_location_radial_minute(event, number, minute, author).await
    }

    async fn set_incident_location_description(
        &self,
        event: &Event,
        number: u32,
        description: Option<String>,
        author: &str,
    ) -> ImsResult<()> {
        self.check("location_description")?;
        self.inner
            .set_incident_location_description(event, number, description, author)
            .await
    }

    async fn set_incident_ranger_handles(
        &self,
        event: &Event,
        number: u32,
        handles: Vec<String>,
        author: &str,
    ) -> ImsResult<()> {
        self.check("ranger_handles")?;
        self.inner.set_incident_ranger_handles(event, number, handles, author).await
    }

    async fn set_incident_incident_types(
        &self,
        event: &Event,
        number: u32,
        incident_types: Vec<String>,
        author: &str,
    ) -> ImsResult<()> {
        self.check("incident_types")?;
        self.inner
            .set_incident_incident_types(event, number, incident_types, author)
            .await
    }

    async fn add_report_entries_to_incident(
        &self,
        event: &Event,
        number: u32,
        entries: Vec<ReportEntry>,
        author: &str,
    ) -> ImsResult<()> {
        self.check("report_entries")?;
        self.inner.add_report_entries_to_incident(event, number, entries, author).await
    }

    async fn detached_incident_reports(&self) -> ImsResult<Vec<IncidentReport>> {
        self.inner.detached_incident_reports().await
    }

    async fn incident_reports_attached_to_incident(
        &self,
        event: &Event,
        incident_number: u32,
    ) -> ImsResult<Vec<IncidentReport>> {
        self.inner.incident_reports_attached_to_incident(event, incident_number).await
    }

    async fn incidents_attached_to_incident_report(
        &self,
        report_number: u32,
    ) -> ImsResult<Vec<(Event, u32)>> {
        self.inner.incidents_attached_to_incident_report(report_number).await
    }

    async fn incident_report_with_number(&self, number: u32) -> ImsResult<IncidentReport> {
        self.inner.incident_report_with_number(number).await
    }

    async fn create_incident_report(
        &self,
        report: IncidentReport,
        author: &str,
    ) -> ImsResult<IncidentReport> {
        self.inner.create_incident_report(report, author).await
    }

    async fn set_incident_report_summary(
        &self,
        number: u32,
        summary: Option<String>,
        author: &str,
    ) -> ImsResult<()> {
        self.check("summary")?;
        self.inner.set_incident_report_summary(number, summary, author).await
    }

    async fn add_report_entries_to_incident_report(
        &self,
        number: u32,
        entries: Vec<ReportEntry>,
        author: &str,
    ) -> ImsResult<()> {
        self.check("report_entries")?;
        self.inner.add_report_entries_to_incident_report(number, entries, author).await
    }

    async fn attach_incident_report_to_incident(
        &self,
        report_number: u32,
        event: &Event,
        incident_number: u32,
    ) -> ImsResult<()> {
        self.inner
            .attach_incident_report_to_incident(report_number, event, incident_number)
            .await
    }

    async fn detach_incident_report_from_incident(
        &self,
        report_number: u32,
        event: &Event,
        incident_number: u32,
    ) -> ImsResult<()> {
        self.inner
            .detach_incident_report_from_incident(report_number, event, incident_number)
            .await
    }
}
