use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use crate::error::{ImsError, ImsResult};
use crate::model::event::Event;
use crate::patch::{
    check_identity, entry_texts, new_entries, parse_document, EntityKind, Patch, PatchRejection,
    ReportEntryPatch,
};
use crate::store::Storage;

#[derive(Debug, Default, Deserialize)]
pub struct IncidentReportPatch {
    #[serde(default)]
    pub summary: Patch<String>,
    #[serde(default)]
    pub report_entries: Patch<Vec<ReportEntryPatch>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentReportEdits {
    pub summary: Option<Option<String>>,
    pub report_entries: Option<Vec<String>>,
}

impl IncidentReportPatch {
    pub fn validate(self) -> Result<IncidentReportEdits, PatchRejection> {
        Ok(IncidentReportEdits {
            summary: self.summary.into_update(),
            report_entries: entry_texts(self.report_entries)?,
        })
    }
}

impl IncidentReportEdits {
    pub fn parse(document: &Value, number: u32) -> Result<Self, PatchRejection> {
        let object = check_identity(document, EntityKind::IncidentReport, number)?;
        parse_document::<IncidentReportPatch>(object)?.validate()
    }

    pub async fn apply(self, storage: &dyn Storage, number: u32, author: &str) -> ImsResult<()> {
        if let Some(summary) = self.summary {
            storage.set_incident_report_summary(number, summary, author).await?;
        }

        if let Some(texts) = self.report_entries {
            let now = Utc::now();
            let entries = new_entries(texts, author, now);
            if !entries.is_empty() {
                storage
                    .add_report_entries_to_incident_report(number, entries, author)
                    .await?;
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Attaching reports to incidents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachAction {
    Attach,
    Detach,
}

impl FromStr for AttachAction {
    type Err = PatchRejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attach" => Ok(AttachAction::Attach),
            "detach" => Ok(AttachAction::Detach),
            other => Err(PatchRejection::InvalidAction(other.to_string())),
        }
    }
}

/// A link/unlink request carried next to a report patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportAttachment {
    pub action: AttachAction,
    pub event: Event,
    pub incident_number: u32,
}

impl ReportAttachment {
    /// Build from the `action`, `event` and `incident` query parameters.
    /// No `action` means no attachment change.
    pub fn from_query(
        action: Option<&str>,
        event: Option<&str>,
        incident: Option<&str>,
    ) -> ImsResult<Option<Self>> {
        let Some(action) = action else {
            return Ok(None);
        };

        let event = event.ok_or_else(|| ImsError::missing_query("event"))?;
        let incident = incident.ok_or_else(|| ImsError::missing_query("incident"))?;

        let event = Event::new(event).map_err(|_| ImsError::invalid_query("event", event))?;
        let incident_number = incident
            .parse::<u32>()
            .map_err(|_| ImsError::invalid_query("incident", incident))?;

        Ok(Some(Self {
            action: action.parse()?,
            event,
            incident_number,
        }))
    }

    async fn apply(&self, storage: &dyn Storage, report_number: u32) -> ImsResult<()> {
        match self.action {
            AttachAction::Attach => {
                storage
                    .attach_incident_report_to_incident(
                        report_number,
                        &self.event,
                        self.incident_number,
                    )
                    .await
            }
            AttachAction::Detach => {
                storage
                    .detach_incident_report_from_incident(
                        report_number,
                        &self.event,
                        self.incident_number,
                    )
                    .await
            }
        }
    }
}

/// Apply a client patch document to incident report `number`, first
/// attaching or detaching it if requested.
pub async fn apply_incident_report_patch(
    storage: &dyn Storage,
    number: u32,
    attachment: Option<&ReportAttachment>,
    document: &Value,
    author: &str,
) -> ImsResult<()> {
    let edits = IncidentReportEdits::parse(document, number)?;

    storage.incident_report_with_number(number).await?;

    if let Some(attachment) = attachment {
        tracing::debug!(
            number,
            action = ?attachment.action,
            event = %attachment.event,
            incident = attachment.incident_number,
            "changing incident report attachment"
        );
        attachment.apply(storage, number).await?;
    }

    tracing::debug!(number, author, ?edits, "applying incident report patch");
    edits.apply(storage, number, author).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::incident::Incident;
    use crate::model::report::IncidentReport;
    use crate::notify::StoreChange;
    use crate::store::InMemoryStorage;
    use serde_json::json;

    fn event() -> Event {
        Event::new("2025").unwrap()
    }

    async fn make_store() -> (InMemoryStorage, u32) {
        let store = InMemoryStorage::default();
        store.create_event(&event()).await.unwrap();
        for _ in 0..7 {
            store
                .create_incident(Incident::new(event(), Utc::now()), "Tool")
                .await
                .unwrap();
        }
        let report = store
            .create_incident_report(IncidentReport::new(Utc::now()), "Tool")
            .await
            .unwrap();
        (store, report.number)
    }

    async fn patch(
        store: &InMemoryStorage,
        number: u32,
        attachment: Option<&ReportAttachment>,
        document: Value,
    ) -> (ImsResult<()>, Vec<StoreChange>) {
        let mut sub = store.hub().subscribe();
        let result =
            apply_incident_report_patch(store, number, attachment, &document, "Hubcap").await;
        (result, sub.drain())
    }

    #[test]
    fn test_attachment_from_query() {
        assert_eq!(ReportAttachment::from_query(None, None, None).unwrap(), None);

        let attachment = ReportAttachment::from_query(Some("attach"), Some("2025"), Some("7"))
            .unwrap()
            .unwrap();
        assert_eq!(attachment.action, AttachAction::Attach);
        assert_eq!(attachment.event, event());
        assert_eq!(attachment.incident_number, 7);

        assert!(matches!(
            ReportAttachment::from_query(Some("attach"), None, Some("7")),
            Err(ImsError::InvalidQuery { name: "event", value: None })
        ));
        assert!(matches!(
            ReportAttachment::from_query(Some("attach"), Some("2025"), Some("seven")),
            Err(ImsError::InvalidQuery { name: "incident", .. })
        ));
        assert!(matches!(
            ReportAttachment::from_query(Some("merge"), Some("2025"), Some("7")),
            Err(ImsError::Rejected(PatchRejection::InvalidAction(_)))
        ));
    }

    #[tokio::test]
    async fn test_attach_happens_before_body_edits() {
        let (store, number) = make_store().await;
        let attachment = ReportAttachment::from_query(Some("attach"), Some("2025"), Some("7"))
            .unwrap()
            .unwrap();

        let (result, writes) = patch(&store, number, Some(&attachment), json!({"summary": "S"})).await;
        result.unwrap();

        let fields: Vec<&str> = writes.iter().map(|w| w.field).collect();
        assert_eq!(fields, vec!["attached", "summary"]);
        assert_eq!(
            store.incidents_attached_to_incident_report(number).await.unwrap(),
            vec![(event(), 7)]
        );
    }

    #[tokio::test]
    async fn test_detach() {
        let (store, number) = make_store().await;
        store
            .attach_incident_report_to_incident(number, &event(), 7)
            .await
            .unwrap();
        let attachment = ReportAttachment::from_query(Some("detach"), Some("2025"), Some("7"))
            .unwrap()
            .unwrap();

        let (result, _) = patch(&store, number, Some(&attachment), json!({})).await;
        result.unwrap();
        assert!(store
            .incidents_attached_to_incident_report(number)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_rejected_body_skips_attachment() {
        let (store, number) = make_store().await;
        let attachment = ReportAttachment::from_query(Some("attach"), Some("2025"), Some("7"))
            .unwrap()
            .unwrap();

        let (result, writes) =
            patch(&store, number, Some(&attachment), json!({"created": "now"})).await;
        assert!(matches!(
            result,
            Err(ImsError::Rejected(PatchRejection::CreatedModified {
                kind: EntityKind::IncidentReport
            }))
        ));
        assert!(writes.is_empty());
    }

    #[tokio::test]
    async fn test_summary_and_entries() {
        let (store, number) = make_store().await;
        let (result, writes) = patch(
            &store,
            number,
            None,
            json!({"number": number, "summary": "Lost camera", "report_entries": [{"text": "at 9:00"}, {}]}),
        )
        .await;
        result.unwrap();
        assert_eq!(writes.len(), 2);

        let report = store.incident_report_with_number(number).await.unwrap();
        assert_eq!(report.summary.as_deref(), Some("Lost camera"));
        assert_eq!(report.report_entries.len(), 1);
        assert_eq!(report.report_entries[0].author, "Hubcap");
        assert!(!report.report_entries[0].system_entry);
    }

    #[tokio::test]
    async fn test_number_change_rejected() {
        let (store, number) = make_store().await;
        let (result, writes) = patch(&store, number, None, json!({"number": 99})).await;
        assert!(matches!(
            result,
            Err(ImsError::Rejected(PatchRejection::NumberModified { .. }))
        ));
        assert!(writes.is_empty());
    }

    #[tokio::test]
    async fn test_missing_report() {
        let (store, _) = make_store().await;
        let (result, _) = patch(&store, 404, None, json!({"summary": "S"})).await;
        assert!(matches!(result, Err(ImsError::NoSuchIncidentReport(404))));
    }
}
