//! Administrative endpoints: incident types, events, access lists and
//! concentric streets.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::auth::Authorization;
use crate::error::ImsError;
use crate::model::event::Event;
use crate::server::{
    json_response, read_json, streamed_array_response, ApiResult, AppState, AuthenticatedUser,
};

// ---------------------------------------------------------------------------
// Incident types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct IncidentTypesQuery {
    pub hidden: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IncidentTypeEdits {
    #[serde(default)]
    add: Vec<String>,
    #[serde(default)]
    show: Vec<String>,
    #[serde(default)]
    hide: Vec<String>,
}

pub async fn list_incident_types(
    AuthenticatedUser(_user): AuthenticatedUser,
    State(state): State<AppState>,
    Query(query): Query<IncidentTypesQuery>,
) -> ApiResult<Response> {
    let include_hidden = query.hidden.as_deref() == Some("true");
    let incident_types = state.storage.incident_types(include_hidden).await?;
    streamed_array_response(incident_types, None)
}

pub async fn edit_incident_types(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Response> {
    state
        .auth
        .authorize(&user, None, Authorization::IMS_ADMIN)
        .await?;

    let edits: IncidentTypeEdits = read_json(&body)?;
    for name in &edits.add {
        state.storage.create_incident_type(name, false).await?;
    }
    if !edits.show.is_empty() {
        state.storage.show_incident_types(&edits.show).await?;
    }
    if !edits.hide.is_empty() {
        state.storage.hide_incident_types(&edits.hide).await?;
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct EventEdits {
    #[serde(default)]
    add: Vec<String>,
}

/// Events the requester may read incidents in.
pub async fn list_events(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
) -> ApiResult<Response> {
    let mut readable = Vec::new();
    for event in state.storage.events().await? {
        let granted = state.auth.authorizations_for(&user, Some(&event)).await?;
        if granted.contains(Authorization::READ_INCIDENTS) {
            readable.push(event);
        }
    }
    streamed_array_response(readable, None)
}

pub async fn edit_events(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Response> {
    state
        .auth
        .authorize(&user, None, Authorization::IMS_ADMIN)
        .await?;

    let edits: EventEdits = read_json(&body)?;
    let events = edits
        .add
        .into_iter()
        .map(Event::new)
        .collect::<Result<Vec<_>, _>>()?;
    for event in &events {
        state.storage.create_event(event).await?;
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------------------------------------------------------------------------
// Access control lists
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EventAccess {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writers: Option<Vec<String>>,
}

pub async fn read_access(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
) -> ApiResult<Response> {
    state
        .auth
        .authorize(&user, None, Authorization::IMS_ADMIN)
        .await?;

    let mut access = BTreeMap::new();
    for event in state.storage.events().await? {
        let entry = EventAccess {
            readers: Some(state.storage.readers(&event).await?),
            writers: Some(state.storage.writers(&event).await?),
        };
        access.insert(event.id().to_string(), entry);
    }
    json_response(&access, None)
}

/// Replace the reader and/or writer lists of each named event.
pub async fn edit_access(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Response> {
    state
        .auth
        .authorize(&user, None, Authorization::IMS_ADMIN)
        .await?;

    let edits: BTreeMap<String, EventAccess> = read_json(&body)?;
    for (event_id, access) in edits {
        let event = Event::new(event_id)?;
        if let Some(readers) = access.readers {
            state.storage.set_readers(&event, readers).await?;
        }
        if let Some(writers) = access.writers {
            state.storage.set_writers(&event, writers).await?;
        }
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------------------------------------------------------------------------
// Concentric streets
// ---------------------------------------------------------------------------

pub async fn read_streets(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
) -> ApiResult<Response> {
    state
        .auth
        .authorize(&user, None, Authorization::IMS_ADMIN)
        .await?;

    let mut streets = BTreeMap::new();
    for event in state.storage.events().await? {
        let table = state.storage.concentric_streets(&event).await?;
        streets.insert(event.id().to_string(), table);
    }
    json_response(&streets, None)
}

/// Add streets. Every existing street of an edited event must be present
/// in the submitted table with its current name.
pub async fn edit_streets(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Response> {
    state
        .auth
        .authorize(&user, None, Authorization::IMS_ADMIN)
        .await?;

    let edits: BTreeMap<String, BTreeMap<String, String>> = read_json(&body)?;

    let mut additions = Vec::new();
    for (event_id, streets) in edits {
        let event = Event::new(event_id)?;
        let existing = state.storage.concentric_streets(&event).await?;

        for (id, name) in &existing {
            if streets.get(id) != Some(name) {
                return Err(ImsError::NotAuthorized(
                    "Removal of streets is not allowed.".to_string(),
                )
                .into());
            }
        }

        additions.extend(
            streets
                .into_iter()
                .filter(|(id, _)| !existing.contains_key(id))
                .map(|(id, name)| (event.clone(), id, name)),
        );
    }

    for (event, id, name) in additions {
        state
            .storage
            .create_concentric_street(&event, &id, &name)
            .await?;
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}
