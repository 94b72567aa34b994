use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

use crate::error::{ImsError, ImsResult};
use crate::model::event::Event;
use crate::model::incident::{Incident, IncidentPriority, IncidentState};
use crate::model::report::{IncidentReport, ReportEntry};
use crate::notify::{ChangeTarget, NotificationHub};
use crate::store::Storage;

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct EventRecord {
    incidents: BTreeMap<u32, Incident>,
    readers: Vec<String>,
    writers: Vec<String>,
    streets: BTreeMap<String, String>,
}

#[derive(Default)]
struct State {
    events: BTreeMap<Event, EventRecord>,
    /// `(name, hidden)` in creation order.
    incident_types: Vec<(String, bool)>,
    reports: BTreeMap<u32, IncidentReport>,
    /// `(report number, event, incident number)`
    attachments: BTreeSet<(u32, Event, u32)>,
}

/// Storage kept entirely in process memory. Every committed write is
/// announced on the notification hub.
pub struct InMemoryStorage {
    state: RwLock<State>,
    hub: NotificationHub,
}

impl InMemoryStorage {
    pub fn new(hub: NotificationHub) -> Self {
        Self {
            state: RwLock::new(State::default()),
            hub,
        }
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    fn no_event(event: &Event) -> ImsError {
        ImsError::NoSuchEvent(event.id().to_string())
    }

    fn no_incident(event: &Event, number: u32) -> ImsError {
        ImsError::NoSuchIncident {
            event: event.id().to_string(),
            number,
        }
    }

    async fn update_event<F>(&self, event: &Event, field: &'static str, apply: F) -> ImsResult<()>
    where
        F: FnOnce(&mut EventRecord) -> ImsResult<()> + Send,
    {
        {
            let mut state = self.state.write().await;
            let record = state
                .events
                .get_mut(event)
                .ok_or_else(|| Self::no_event(event))?;
            apply(record)?;
        }
        self.hub.publish(
            ChangeTarget::Event {
                event_id: event.clone(),
            },
            field,
            None,
        );
        Ok(())
    }

    async fn update_incident<F>(
        &self,
        event: &Event,
        number: u32,
        field: &'static str,
        author: &str,
        apply: F,
    ) -> ImsResult<()>
    where
        F: FnOnce(&mut Incident) + Send,
    {
        {
            let mut state = self.state.write().await;
            let incident = state
                .events
                .get_mut(event)
                .ok_or_else(|| Self::no_event(event))?
                .incidents
                .get_mut(&number)
                .ok_or_else(|| Self::no_incident(event, number))?;
            apply(incident);
            incident.version += 1;
        }
        self.hub.publish(
            ChangeTarget::Incident {
                event_id: event.clone(),
                incident_number: number,
            },
            field,
            Some(author),
        );
        Ok(())
    }

    async fn update_report<F>(
        &self,
        number: u32,
        field: &'static str,
        author: &str,
        apply: F,
    ) -> ImsResult<()>
    where
        F: FnOnce(&mut IncidentReport) + Send,
    {
        {
            let mut state = self.state.write().await;
            let report = state
                .reports
                .get_mut(&number)
                .ok_or(ImsError::NoSuchIncidentReport(number))?;
            apply(report);
            report.version += 1;
        }
        self.hub.publish(
            ChangeTarget::IncidentReport {
                incident_report_number: number,
            },
            field,
            Some(author),
        );
        Ok(())
    }

    fn set_hidden(&self, state: &mut State, names: &[String], hidden: bool) -> ImsResult<()> {
        for name in names {
            let entry = state
                .incident_types
                .iter_mut()
                .find(|(known, _)| known == name)
                .ok_or_else(|| ImsError::InvalidInput(format!("unknown incident type '{name}'")))?;
            entry.1 = hidden;
        }
        Ok(())
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new(NotificationHub::default())
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn events(&self) -> ImsResult<Vec<Event>> {
        let state = self.state.read().await;
        Ok(state.events.keys().cloned().collect())
    }

    async fn create_event(&self, event: &Event) -> ImsResult<()> {
        let created = {
            let mut state = self.state.write().await;
            if state.events.contains_key(event) {
                false
            } else {
                state.events.insert(event.clone(), EventRecord::default());
                true
            }
        };
        if created {
            tracing::info!(event = %event, "created event");
            self.hub.publish(
                ChangeTarget::Event {
                    event_id: event.clone(),
                },
                "created",
                None,
            );
        }
        Ok(())
    }

    async fn readers(&self, event: &Event) -> ImsResult<Vec<String>> {
        let state = self.state.read().await;
        let record = state.events.get(event).ok_or_else(|| Self::no_event(event))?;
        Ok(record.readers.clone())
    }

    async fn set_readers(&self, event: &Event, readers: Vec<String>) -> ImsResult<()> {
        self.update_event(event, "readers", move |record| {
            record.readers = readers;
            Ok(())
        })
        .await
    }

    async fn writers(&self, event: &Event) -> ImsResult<Vec<String>> {
        let state = self.state.read().await;
        let record = state.events.get(event).ok_or_else(|| Self::no_event(event))?;
        Ok(record.writers.clone())
    }

    async fn set_writers(&self, event: &Event, writers: Vec<String>) -> ImsResult<()> {
        self.update_event(event, "writers", move |record| {
            record.writers = writers;
            Ok(())
        })
        .await
    }

    async fn concentric_streets(&self, event: &Event) -> ImsResult<BTreeMap<String, String>> {
        let state = self.state.read().await;
        let record = state.events.get(event).ok_or_else(|| Self::no_event(event))?;
        Ok(record.streets.clone())
    }

    async fn create_concentric_street(
        &self,
        event: &Event,
        id: &str,
        name: &str,
    ) -> ImsResult<()> {
        let (id, name) = (id.to_string(), name.to_string());
        self.update_event(event, "concentric_streets", move |record| {
            if record.streets.contains_key(&id) {
                return Err(ImsError::InvalidInput(format!("street '{id}' already exists")));
            }
            record.streets.insert(id, name);
            Ok(())
        })
        .await
    }

    async fn incident_types(&self, include_hidden: bool) -> ImsResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .incident_types
            .iter()
            .filter(|(_, hidden)| include_hidden || !hidden)
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn create_incident_type(&self, name: &str, hidden: bool) -> ImsResult<()> {
        {
            let mut state = self.state.write().await;
            if state.incident_types.iter().any(|(known, _)| known == name) {
                return Err(ImsError::InvalidInput(format!(
                    "incident type '{name}' already exists"
                )));
            }
            state.incident_types.push((name.to_string(), hidden));
        }
        self.hub.publish(ChangeTarget::IncidentTypes, "created", None);
        Ok(())
    }

    async fn show_incident_types(&self, names: &[String]) -> ImsResult<()> {
        {
            let mut state = self.state.write().await;
            self.set_hidden(&mut state, names, false)?;
        }
        self.hub.publish(ChangeTarget::IncidentTypes, "hidden", None);
        Ok(())
    }

    async fn hide_incident_types(&self, names: &[String]) -> ImsResult<()> {
        {
            let mut state = self.state.write().await;
            self.set_hidden(&mut state, names, true)?;
        }
        self.hub.publish(ChangeTarget::IncidentTypes, "hidden", None);
        Ok(())
    }

    async fn incidents(&self, event: &Event) -> ImsResult<Vec<Incident>> {
        let state = self.state.read().await;
        let record = state.events.get(event).ok_or_else(|| Self::no_event(event))?;
        Ok(record.incidents.values().cloned().collect())
    }

    async fn incident_with_number(&self, event: &Event, number: u32) -> ImsResult<Incident> {
        let state = self.state.read().await;
        state
            .events
            .get(event)
            .ok_or_else(|| Self::no_event(event))?
            .incidents
            .get(&number)
            .cloned()
            .ok_or_else(|| Self::no_incident(event, number))
    }

    async fn create_incident(&self, mut incident: Incident, author: &str) -> ImsResult<Incident> {
        {
            let mut state = self.state.write().await;
            let record = state
                .events
                .get_mut(&incident.event)
                .ok_or_else(|| Self::no_event(&incident.event))?;
            let number = record.incidents.keys().next_back().copied().unwrap_or(0) + 1;
            incident.number = number;
            incident.version = 1;
            record.incidents.insert(number, incident.clone());
        }
        tracing::info!(
            event = %incident.event,
            number = incident.number,
            author,
            "created incident"
        );
        self.hub.publish(
            ChangeTarget::Incident {
                event_id: incident.event.clone(),
                incident_number: incident.number,
            },
            "created",
            Some(author),
        );
        Ok(incident)
    }

    async fn set_incident_priority(
        &self,
        event: &Event,
        number: u32,
        priority: IncidentPriority,
        author: &str,
    ) -> ImsResult<()> {
        self.update_incident(event, number, "priority", author, |incident| {
            incident.priority = priority;
        })
        .await
    }

    async fn set_incident_state(
        &self,
        event: &Event,
        number: u32,
        state: IncidentState,
        author: &str,
    ) -> ImsResult<()> {
        self.update_incident(event, number, "state", author, |incident| {
            incident.state = state;
        })
        .await
    }

    async fn set_incident_summary(
        &self,
        event: &Event,
        number: u32,
        summary: Option<String>,
        author: &str,
    ) -> ImsResult<()> {
        self.update_incident(event, number, "summary", author, |incident| {
            incident.summary = summary;
        })
        .await
    }

    async fn set_incident_location_name(
        &self,
        event: &Event,
        number: u32,
        name: Option<String>,
        author: &str,
    ) -> ImsResult<()> {
        self.update_incident(event, number, "location_name", author, |incident| {
            incident.location.name = name;
        })
        .await
    }

    async fn set_incident_location_concentric_street(
        &self,
        event: &Event,
        number: u32,
        street_id: Option<String>,
        author: &str,
    ) -> ImsResult<()> {
        self.update_incident(event, number, "location_concentric", author, |incident| {
            incident.location.concentric = street_id;
        })
        .await
    }

    async fn set_incident_location_radial_hour(
        &self,
        event: &Event,
        number: u32,
        hour: Option<u8>,
        author: &str,
    ) -> ImsResult<()> {
        self.update_incident(event, number, "location_radial_hour", author, |incident| {
            incident.location.radial_hour = hour;
        })
        .await
    }

    async fn set_incident_location_radial_minute(
        &self,
        event: &Event,
        number: u32,
        minute: Option<u8>,
        author: &str,
    ) -> ImsResult<()> {
        self.update_incident(event, number, "location_radial_minute", author, |incident| {
            incident.location.radial_minute = minute;
        })
        .await
    }

    async fn set_incident_location_description(
        &self,
        event: &Event,
        number: u32,
        description: Option<String>,
        author: &str,
    ) -> ImsResult<()> {
        self.update_incident(event, number, "location_description", author, |incident| {
            incident.location.description = description;
        })
        .await
    }

    async fn set_incident_ranger_handles(
        &self,
        event: &Event,
        number: u32,
        handles: Vec<String>,
        author: &str,
    ) -> ImsResult<()> {
        self.update_incident(event, number, "ranger_handles", author, |incident| {
            incident.ranger_handles = handles;
        })
        .await
    }

    async fn set_incident_incident_types(
        &self,
        event: &Event,
        number: u32,
        incident_types: Vec<String>,
        author: &str,
    ) -> ImsResult<()> {
        self.update_incident(event, number, "incident_types", author, |incident| {
            incident.incident_types = incident_types;
        })
        .await
    }

    async fn add_report_entries_to_incident(
        &self,
        event: &Event,
        number: u32,
        entries: Vec<ReportEntry>,
        author: &str,
    ) -> ImsResult<()> {
        self.update_incident(event, number, "report_entries", author, |incident| {
            incident.report_entries.extend(entries);
        })
        .await
    }

    async fn detached_incident_reports(&self) -> ImsResult<Vec<IncidentReport>> {
        let state = self.state.read().await;
        let attached: BTreeSet<u32> = state.attachments.iter().map(|(r, _, _)| *r).collect();
        Ok(state
            .reports
            .values()
            .filter(|report| !attached.contains(&report.number))
            .cloned()
            .collect())
    }

    async fn incident_reports_attached_to_incident(
        &self,
        event: &Event,
        incident_number: u32,
    ) -> ImsResult<Vec<IncidentReport>> {
        let state = self.state.read().await;
        if !state
            .events
            .get(event)
            .ok_or_else(|| Self::no_event(event))?
            .incidents
            .contains_key(&incident_number)
        {
            return Err(Self::no_incident(event, incident_number));
        }
        Ok(state
            .attachments
            .iter()
            .filter(|(_, e, n)| e == event && *n == incident_number)
            .filter_map(|(r, _, _)| state.reports.get(r).cloned())
            .collect())
    }

    async fn incidents_attached_to_incident_report(
        &self,
        report_number: u32,
    ) -> ImsResult<Vec<(Event, u32)>> {
        let state = self.state.read().await;
        if !state.reports.contains_key(&report_number) {
            return Err(ImsError::NoSuchIncidentReport(report_number));
        }
        Ok(state
            .attachments
            .iter()
            .filter(|(r, _, _)| *r == report_number)
            .map(|(_, event, number)| (event.clone(), *number))
            .collect())
    }

    async fn incident_report_with_number(&self, number: u32) -> ImsResult<IncidentReport> {
        let state = self.state.read().await;
        state
            .reports
            .get(&number)
            .cloned()
            .ok_or(ImsError::NoSuchIncidentReport(number))
    }

    async fn create_incident_report(
        &self,
        mut report: IncidentReport,
        author: &str,
    ) -> ImsResult<IncidentReport> {
        {
            let mut state = self.state.write().await;
            let number = state.reports.keys().next_back().copied().unwrap_or(0) + 1;
            report.number = number;
            report.version = 1;
            state.reports.insert(number, report.clone());
        }
        tracing::info!(number = report.number, author, "created incident report");
        self.hub.publish(
            ChangeTarget::IncidentReport {
                incident_report_number: report.number,
            },
            "created",
            Some(author),
        );
        Ok(report)
    }

    async fn set_incident_report_summary(
        &self,
        number: u32,
        summary: Option<String>,
        author: &str,
    ) -> ImsResult<()> {
        self.update_report(number, "summary", author, |report| {
            report.summary = summary;
        })
        .await
    }

    async fn add_report_entries_to_incident_report(
        &self,
        number: u32,
        entries: Vec<ReportEntry>,
        author: &str,
    ) -> ImsResult<()> {
        self.update_report(number, "report_entries", author, |report| {
            report.report_entries.extend(entries);
        })
        .await
    }

    async fn attach_incident_report_to_incident(
        &self,
        report_number: u32,
        event: &Event,
        incident_number: u32,
    ) -> ImsResult<()> {
        {
            let mut state = self.state.write().await;
            if !state.reports.contains_key(&report_number) {
                return Err(ImsError::NoSuchIncidentReport(report_number));
            }
            let record = state.events.get(event).ok_or_else(|| Self::no_event(event))?;
            if !record.incidents.contains_key(&incident_number) {
                return Err(Self::no_incident(event, incident_number));
            }
            state
                .attachments
                .insert((report_number, event.clone(), incident_number));
        }
        self.hub.publish(
            ChangeTarget::IncidentReport {
                incident_report_number: report_number,
            },
            "attached",
            None,
        );
        Ok(())
    }

    async fn detach_incident_report_from_incident(
        &self,
        report_number: u32,
        event: &Event,
        incident_number: u32,
    ) -> ImsResult<()> {
        {
            let mut state = self.state.write().await;
            if !state.reports.contains_key(&report_number) {
                return Err(ImsError::NoSuchIncidentReport(report_number));
            }
            state
                .attachments
                .remove(&(report_number, event.clone(), incident_number));
        }
        self.hub.publish(
            ChangeTarget::IncidentReport {
                incident_report_number: report_number,
            },
            "detached",
            None,
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
