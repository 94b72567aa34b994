use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ImsResult;
use crate::model::event::Event;
use crate::model::incident::{IncidentPriority, IncidentState};
use crate::patch::{
    check_identity, entry_texts, new_entries, parse_document, EntityKind, Patch, PatchRejection,
    ReportEntryPatch,
};
use crate::store::Storage;

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

/// An incident patch document as sent by clients. `number` and `created`
/// are checked separately and never reach this type.
#[derive(Debug, Default, Deserialize)]
pub struct IncidentPatch {
    #[serde(default)]
    pub priority: Patch<i64>,
    #[serde(default)]
    pub state: Patch<String>,
    #[serde(default)]
    pub summary: Patch<String>,
    #[serde(default)]
    pub location: Patch<LocationPatch>,
    #[serde(default)]
    pub ranger_handles: Patch<Vec<String>>,
    #[serde(default)]
    pub incident_types: Patch<Vec<String>>,
    #[serde(default)]
    pub report_entries: Patch<Vec<ReportEntryPatch>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocationPatch {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub concentric: Patch<String>,
    #[serde(default)]
    pub radial_hour: Patch<u8>,
    #[serde(default)]
    pub radial_minute: Patch<u8>,
    #[serde(default)]
    pub description: Patch<String>,
}

// ---------------------------------------------------------------------------
// Validated form
// ---------------------------------------------------------------------------

/// Location sub-field updates; `Some(None)` clears the sub-field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationEdits {
    pub name: Option<Option<String>>,
    pub concentric: Option<Option<String>>,
    pub radial_hour: Option<Option<u8>>,
    pub radial_minute: Option<Option<u8>>,
    pub description: Option<Option<String>>,
}

impl LocationEdits {
    fn clear_all() -> Self {
        Self {
            name: Some(None),
            concentric: Some(None),
            radial_hour: Some(None),
            radial_minute: Some(None),
            description: Some(None),
        }
    }
}

/// Every edit of one incident patch, already cast to domain types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentEdits {
    pub priority: Option<IncidentPriority>,
    pub state: Option<IncidentState>,
    pub summary: Option<Option<String>>,
    pub location: Option<LocationEdits>,
    pub ranger_handles: Option<Vec<String>>,
    pub incident_types: Option<Vec<String>>,
    /// Non-empty entry texts to append.
    pub report_entries: Option<Vec<String>>,
}

impl IncidentPatch {
    pub fn validate(self) -> Result<IncidentEdits, PatchRejection> {
        let priority = self
            .priority
            .into_required("priority")?
            .map(|value| {
                IncidentPriority::from_integer(value)
                    .ok_or_else(|| PatchRejection::InvalidPriority(value.to_string()))
            })
            .transpose()?;

        let state = self
            .state
            .into_required("state")?
            .map(|name| {
                IncidentState::from_name(&name).ok_or(PatchRejection::InvalidState(name))
            })
            .transpose()?;

        let location = match self.location {
            Patch::Keep => None,
            Patch::Clear => Some(LocationEdits::clear_all()),
            Patch::Set(location) => Some(location.validate()?),
        };

        Ok(IncidentEdits {
            priority,
            state,
            summary: self.summary.into_update(),
            location,
            ranger_handles: self.ranger_handles.into_required("ranger_handles")?,
            incident_types: self.incident_types.into_required("incident_types")?,
            report_entries: entry_texts(self.report_entries)?,
        })
    }
}

impl LocationPatch {
    fn validate(self) -> Result<LocationEdits, PatchRejection> {
        let radial_hour = self.radial_hour.try_map(|hour| {
            if hour < 24 {
                Ok(hour)
            } else {
                Err(PatchRejection::invalid("location.radial_hour", format!("{hour} is not an hour")))
            }
        })?;
        let radial_minute = self.radial_minute.try_map(|minute| {
            if minute < 60 {
                Ok(minute)
            } else {
                Err(PatchRejection::invalid(
                    "location.radial_minute",
                    format!("{minute} is not a minute"),
                ))
            }
        })?;

        Ok(LocationEdits {
            name: self.name.into_update(),
            concentric: self.concentric.into_update(),
            radial_hour: radial_hour.into_update(),
            radial_minute: radial_minute.into_update(),
            description: self.description.into_update(),
        })
    }
}

impl IncidentEdits {
    /// Validate a raw patch document against incident `number`.
    pub fn parse(document: &Value, number: u32) -> Result<Self, PatchRejection> {
        let object = check_identity(document, EntityKind::Incident, number)?;
        parse_document::<IncidentPatch>(object)?.validate()
    }

    pub fn is_empty(&self) -> bool {
        *self == IncidentEdits::default()
    }

    /// Write each edit through its own storage setter, in field order.
    pub async fn apply(
        self,
        storage: &dyn Storage,
        event: &Event,
        number: u32,
        author: &str,
    ) -> ImsResult<()> {
        if let Some(priority) = self.priority {
            storage.set_incident_priority(event, number, priority, author).await?;
        }

        if let Some(state) = self.state {
            storage.set_incident_state(event, number, state, author).await?;
        }

        if let Some(summary) = self.summary {
            storage.set_incident_summary(event, number, summary, author).await?;
        }

        if let Some(location) = self.location {
            if let Some(name) = location.name {
                storage.set_incident_location_name(event, number, name, author).await?;
            }
            if let Some(concentric) = location.concentric {
                storage
                    .set_incident_location_concentric_street(event, number, concentric, author)
                    .await?;
            }
            if let Some(hour) = location.radial_hour {
                storage
                    .set_incident_location_radial_hour(event, number, hour, author)
                    .await?;
            }
            if let Some(minute) = location.radial_minute {
                storage
                    .set_incident_location_radial_minute(event, number, minute, author)
                    .await?;
            }
            if let Some(description) = location.description {
                storage
                    .set_incident_location_description(event, number, description, author)
                    .await?;
            }
        }

        if let Some(handles) = self.ranger_handles {
            storage.set_incident_ranger_handles(event, number, handles, author).await?;
        }

        if let Some(incident_types) = self.incident_types {
            storage
                .set_incident_incident_types(event, number, incident_types, author)
                .await?;
        }

        if let Some(texts) = self.report_entries {
            let now = Utc::now();
            let entries = new_entries(texts, author, now);
            if !entries.is_empty() {
                storage
                    .add_report_entries_to_incident(event, number, entries, author)
                    .await?;
            }
        }

        Ok(())
    }
}

/// Apply a client patch document to incident `number` of `event`.
///
/// The document is fully validated before the first write; see the module
/// docs for what happens when storage fails part way through.
pub async fn apply_incident_patch(
    storage: &dyn Storage,
    event: &Event,
    number: u32,
    document: &Value,
    author: &str,
) -> ImsResult<()> {
    let edits = IncidentEdits::parse(document, number)?;

    // Unknown incidents are not found even when the patch is empty.
    storage.incident_with_number(event, number).await?;

    tracing::debug!(event = %event, number, author, ?edits, "applying incident patch");
    edits.apply(storage, event, number, author).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImsError;
    use crate::model::incident::Incident;
    use crate::notify::StoreChange;
    use crate::store::failing::FailingStorage;
    use crate::store::InMemoryStorage;
    use serde_json::json;

    fn event() -> Event {
        Event::new("2025").unwrap()
    }

    async fn make_store() -> (InMemoryStorage, u32) {
        let store = InMemoryStorage::default();
        store.create_event(&event()).await.unwrap();
        let mut incident = Incident::new(event(), Utc::now());
        incident.summary = Some("Original".into());
        incident.location.name = Some("Camp".into());
        incident.location.radial_hour = Some(9);
        let incident = store.create_incident(incident, "Tool").await.unwrap();
        (store, incident.number)
    }

    async fn patch(store: &InMemoryStorage, number: u32, document: Value) -> (ImsResult<()>, Vec<StoreChange>) {
        let mut sub = store.hub().subscribe();
        let result = apply_incident_patch(store, &event(), number, &document, "Hubcap").await;
        (result, sub.drain())
    }

    #[tokio::test]
    async fn test_created_always_rejected() {
        let (store, number) = make_store().await;
        let created = store.incident_with_number(&event(), number).await.unwrap().created;

        for value in [json!(created), json!(null), json!("2020-01-01T00:00:00Z")] {
            let (result, writes) =
                patch(&store, number, json!({"created": value, "summary": "S"})).await;
            assert!(matches!(
                result,
                Err(ImsError::Rejected(PatchRejection::CreatedModified { .. }))
            ));
            assert!(writes.is_empty());
        }
    }

    #[tokio::test]
    async fn test_number_change_rejected() {
        let (store, number) = make_store().await;
        let (result, writes) = patch(&store, number, json!({"number": number + 1, "summary": "S"})).await;
        assert!(matches!(
            result,
            Err(ImsError::Rejected(PatchRejection::NumberModified { .. }))
        ));
        assert!(writes.is_empty());

        let (result, writes) = patch(&store, number, json!({"number": number, "summary": "S"})).await;
        assert!(result.is_ok());
        assert_eq!(writes.len(), 1);
    }

    #[tokio::test]
    async fn test_non_object_rejected() {
        let (store, number) = make_store().await;
        let (result, writes) = patch(&store, number, json!(["summary"])).await;
        assert!(matches!(
            result,
            Err(ImsError::Rejected(PatchRejection::NotAnObject { .. }))
        ));
        assert!(writes.is_empty());
    }

    #[tokio::test]
    async fn test_summary_is_a_single_write() {
        let (store, number) = make_store().await;
        let (result, writes) = patch(&store, number, json!({"summary": "S"})).await;
        result.unwrap();

        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].field, "summary");
        assert_eq!(writes[0].author.as_deref(), Some("Hubcap"));

        let incident = store.incident_with_number(&event(), number).await.unwrap();
        assert_eq!(incident.summary.as_deref(), Some("S"));
        assert_eq!(incident.location.name.as_deref(), Some("Camp"));
    }

    #[tokio::test]
    async fn test_null_location_clears_every_sub_field() {
        let (store, number) = make_store().await;
        let (result, writes) = patch(&store, number, json!({"location": null})).await;
        result.unwrap();

        let fields: Vec<&str> = writes.iter().map(|w| w.field).collect();
        assert_eq!(
            fields,
            vec![
                "location_name",
                "location_concentric",
                "location_radial_hour",
                "location_radial_minute",
                "location_description",
            ]
        );

        let incident = store.incident_with_number(&event(), number).await.unwrap();
        assert_eq!(incident.location.name, None);
        assert_eq!(incident.location.radial_hour, None);
    }

    #[tokio::test]
    async fn test_partial_location() {
        let (store, number) = make_store().await;
        let (result, writes) = patch(
            &store,
            number,
            json!({"location": {"type": "garett", "radial_minute": 30, "name": null}}),
        )
        .await;
        result.unwrap();

        assert_eq!(writes.len(), 2);
        let incident = store.incident_with_number(&event(), number).await.unwrap();
        assert_eq!(incident.location.name, None);
        assert_eq!(incident.location.radial_hour, Some(9));
        assert_eq!(incident.location.radial_minute, Some(30));
    }

    #[tokio::test]
    async fn test_report_entries_share_one_timestamp() {
        let (store, number) = make_store().await;
        let (result, writes) = patch(
            &store,
            number,
            json!({"report_entries": [{"text": "a"}, {"text": ""}, {"text": "b"}]}),
        )
        .await;
        result.unwrap();
        assert_eq!(writes.len(), 1);

        let incident = store.incident_with_number(&event(), number).await.unwrap();
        let entries = &incident.report_entries;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "a");
        assert_eq!(entries[1].text, "b");
        assert_eq!(entries[0].created, entries[1].created);
        assert!(entries.iter().all(|e| !e.system_entry && e.author == "Hubcap"));
    }

    #[tokio::test]
    async fn test_only_empty_entries_write_nothing() {
        let (store, number) = make_store().await;
        let (result, writes) = patch(&store, number, json!({"report_entries": [{"text": ""}]})).await;
        result.unwrap();
        assert!(writes.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_state_rejected_without_writes() {
        let (store, number) = make_store().await;
        let (result, writes) =
            patch(&store, number, json!({"summary": "S", "state": "onScene"})).await;
        assert!(matches!(
            result,
            Err(ImsError::Rejected(PatchRejection::InvalidState(ref name))) if name == "onScene"
        ));
        assert!(writes.is_empty());
        let incident = store.incident_with_number(&event(), number).await.unwrap();
        assert_eq!(incident.summary.as_deref(), Some("Original"));
    }

    #[tokio::test]
    async fn test_scalar_casts() {
        let (store, number) = make_store().await;
        let (result, writes) = patch(
            &store,
            number,
            json!({
                "priority": 1,
                "state": "on_scene",
                "ranger_handles": ["Tool", "Bucket"],
                "incident_types": ["Medical"],
            }),
        )
        .await;
        result.unwrap();

        let fields: Vec<&str> = writes.iter().map(|w| w.field).collect();
        assert_eq!(fields, vec!["priority", "state", "ranger_handles", "incident_types"]);

        let incident = store.incident_with_number(&event(), number).await.unwrap();
        assert_eq!(incident.priority, IncidentPriority::High);
        assert_eq!(incident.state, IncidentState::OnScene);
        assert_eq!(incident.ranger_handles, vec!["Tool", "Bucket"]);
    }

    #[tokio::test]
    async fn test_invalid_values_rejected() {
        let (store, number) = make_store().await;
        for document in [
            json!({"priority": 9}),
            json!({"priority": null}),
            json!({"state": null}),
            json!({"ranger_handles": "Tool"}),
            json!({"location": {"radial_hour": 24}}),
            json!({"location": "Camp"}),
            json!({"report_entries": null}),
            json!({"report_entries": ["a"]}),
        ] {
            let (result, writes) = patch(&store, number, document.clone()).await;
            assert!(
                matches!(result, Err(ImsError::Rejected(_))),
                "expected rejection for {document}"
            );
            assert!(writes.is_empty());
        }
    }

    #[tokio::test]
    async fn test_missing_incident_not_found() {
        let (store, _) = make_store().await;
        let (result, _) = patch(&store, 99, json!({})).await;
        assert!(matches!(result, Err(ImsError::NoSuchIncident { number: 99, .. })));
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_earlier_writes() {
        let (store, number) = make_store().await;
        let store = FailingStorage::new(store, "state");
        let mut sub = store.inner.hub().subscribe();

        let result = apply_incident_patch(
            &store,
            &event(),
            number,
            &json!({"priority": 1, "state": "closed", "summary": "S"}),
            "Hubcap",
        )
        .await;
        assert!(matches!(result, Err(ImsError::Storage(_))));

        let writes = sub.drain();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].field, "priority");

        let incident = store.inner.incident_with_number(&event(), number).await.unwrap();
        assert_eq!(incident.priority, IncidentPriority::High);
        assert_eq!(incident.state, IncidentState::New);
        assert_eq!(incident.summary.as_deref(), Some("Original"));
    }

    #[test]
    fn test_empty_patch_parses_to_no_edits() {
        assert!(IncidentEdits::parse(&json!({"number": 3}), 3).unwrap().is_empty());
    }
}
