use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::Authorization;
use crate::error::ImsError;
use crate::model::event::Event;
use crate::model::incident::{Incident, IncidentPriority, IncidentState, Location};
use crate::patch::apply_incident_patch;
use crate::server::extract::{path_event, path_number};
use crate::server::{
    created_response, creation_defaults, json_bytes_response, json_response, read_json,
    streamed_array_response,
    ApiResult, AppState, AuthenticatedUser, NewReportEntry, API_PREFIX,
};
use crate::stream::result_set_etag;

/// Body of a new incident. The store assigns the number.
#[derive(Debug, Deserialize)]
struct NewIncident {
    #[serde(default)]
    event: Option<Event>,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    priority: Option<IncidentPriority>,
    #[serde(default)]
    state: Option<IncidentState>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    location: Option<Location>,
    #[serde(default)]
    ranger_handles: Vec<String>,
    #[serde(default)]
    incident_types: Vec<String>,
    #[serde(default)]
    report_entries: Vec<NewReportEntry>,
}

fn incident_etag<'a>(incidents: impl IntoIterator<Item = &'a Incident>) -> String {
    result_set_etag(
        incidents
            .into_iter()
            .map(|incident| format!("{}:{}", incident.number, incident.version)),
    )
}

pub async fn list_incidents(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<Response> {
    let event = path_event(&event_id)?;
    state
        .auth
        .authorize(&user, Some(&event), Authorization::READ_INCIDENTS)
        .await?;

    let incidents = state.storage.incidents(&event).await?;
    let etag = incident_etag(&incidents);
    streamed_array_response(incidents, Some(etag))
}

/// Locations an incident may be placed at. The same list is served for every
/// event, but reading it needs the event's read permission.
pub async fn list_locations(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<Response> {
    let event = path_event(&event_id)?;
    state
        .auth
        .authorize(&user, Some(&event), Authorization::READ_INCIDENTS)
        .await?;

    json_bytes_response(state.locations.clone(), Some(state.locations_etag.clone()))
}

pub async fn new_incident(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let event = path_event(&event_id)?;
    state
        .auth
        .authorize(&user, Some(&event), Authorization::WRITE_INCIDENTS)
        .await?;

    let new: NewIncident = read_json(&body)?;
    if let Some(given) = &new.event {
        if *given != event {
            return Err(ImsError::InvalidInput(format!(
                "Incident's event {given} does not match event in URL {event}"
            ))
            .into());
        }
    }
    if let Some(location) = &new.location {
        if location.radial_hour.is_some_and(|hour| hour > 23)
            || location.radial_minute.is_some_and(|minute| minute > 59)
        {
            return Err(ImsError::InvalidInput("Invalid location radial address".to_string()).into());
        }
    }

    let (created, report_entries) = creation_defaults(new.created, new.report_entries, &user.handle)?;

    let mut incident = Incident::new(event.clone(), created);
    if let Some(priority) = new.priority {
        incident.priority = priority;
    }
    if let Some(incident_state) = new.state {
        incident.state = incident_state;
    }
    incident.summary = new.summary;
    incident.location = new.location.unwrap_or_default();
    incident.ranger_handles = new.ranger_handles;
    incident.incident_types = new.incident_types;
    incident.report_entries = report_entries;

    let incident = state.storage.create_incident(incident, &user.handle).await?;
    tracing::info!(
        author = %user.handle,
        event = %event,
        number = incident.number,
        "created new incident via JSON"
    );

    created_response(
        "incident-number",
        incident.number,
        &format!("{API_PREFIX}/events/{event}/incidents/{}", incident.number),
    )
}

pub async fn read_incident(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
    Path((event_id, number)): Path<(String, String)>,
) -> ApiResult<Response> {
    let event = path_event(&event_id)?;
    state
        .auth
        .authorize(&user, Some(&event), Authorization::READ_INCIDENTS)
        .await?;

    let number = path_number(&number)?;
    let incident = state.storage.incident_with_number(&event, number).await?;
    json_response(&incident, Some(incident_etag([&incident])))
}

pub async fn edit_incident(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
    Path((event_id, number)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Response> {
    let event = path_event(&event_id)?;
    state
        .auth
        .authorize(&user, Some(&event), Authorization::WRITE_INCIDENTS)
        .await?;

    let number = path_number(&number)?;
    let document: Value = read_json(&body)?;
    apply_incident_patch(state.storage.as_ref(), &event, number, &document, &user.handle).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
