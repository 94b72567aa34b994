use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::auth::{AuthProvider, Authorization, User};
use crate::error::{ImsError, ImsResult};
use crate::model::event::Event;
use crate::store::Storage;

/// Authorization from configured administrators plus the per-event reader
/// and writer lists kept in storage.
///
/// An ACL entry matches a user when it is `*`, the user's handle, or
/// `person:<handle>`.
pub struct AclAuthProvider {
    storage: Arc<dyn Storage>,
    admins: HashSet<String>,
}

impl AclAuthProvider {
    pub fn new(storage: Arc<dyn Storage>, admins: impl IntoIterator<Item = String>) -> Self {
        Self {
            storage,
            admins: admins.into_iter().collect(),
        }
    }

    fn matches(acl: &[String], user: &User) -> bool {
        acl.iter().any(|entry| {
            entry == "*"
                || *entry == user.handle
                || entry.strip_prefix("person:") == Some(user.handle.as_str())
        })
    }
}

#[async_trait]
impl AuthProvider for AclAuthProvider {
    async fn authorizations_for(
        &self,
        user: &User,
        event: Option<&Event>,
    ) -> ImsResult<Authorization> {
        let mut granted = Authorization::READ_PERSONNEL | Authorization::WRITE_INCIDENT_REPORTS;

        if self.admins.contains(&user.handle) {
            granted |= Authorization::IMS_ADMIN | Authorization::READ_INCIDENT_REPORTS;
        }

        if let Some(event) = event {
            if Self::matches(&self.storage.writers(event).await?, user) {
                granted |= Authorization::READ_INCIDENTS
                    | Authorization::WRITE_INCIDENTS
                    | Authorization::READ_INCIDENT_REPORTS;
            } else if Self::matches(&self.storage.readers(event).await?, user) {
                granted |= Authorization::READ_INCIDENTS;
            }
        }

        Ok(granted)
    }

    async fn authorize_for_incident_report(&self, user: &User, number: u32) -> ImsResult<()> {
        let global = self.authorizations_for(user, None).await?;
        if global.contains(Authorization::READ_INCIDENT_REPORTS) {
            return Ok(());
        }

        let report = self.storage.incident_report_with_number(number).await?;
        if report.has_author(&user.handle) {
            return Ok(());
        }

        for (event, _) in self.storage.incidents_attached_to_incident_report(number).await? {
            let granted = self.authorizations_for(user, Some(&event)).await?;
            if granted.contains(Authorization::READ_INCIDENTS) {
                return Ok(());
            }
        }

        Err(ImsError::NotAuthorized(format!(
            "{} may not read incident report #{}",
            user.handle, number
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::incident::Incident;
    use crate::model::report::{IncidentReport, ReportEntry};
    use crate::store::InMemoryStorage;
    use chrono::Utc;

    fn event() -> Event {
        Event::new("2025").unwrap()
    }

    async fn make_provider() -> (Arc<InMemoryStorage>, AclAuthProvider) {
        let storage = Arc::new(InMemoryStorage::default());
        storage.create_event(&event()).await.unwrap();
        storage
            .set_writers(&event(), vec!["person:Tool".into()])
            .await
            .unwrap();
        storage
            .set_readers(&event(), vec!["Bucket".into()])
            .await
            .unwrap();
        let provider = AclAuthProvider::new(storage.clone(), vec!["Admin".to_string()]);
        (storage, provider)
    }

    #[tokio::test]
    async fn test_event_capabilities() {
        let (_, provider) = make_provider().await;

        let writer = provider
            .authorizations_for(&User::new("Tool"), Some(&event()))
            .await
            .unwrap();
        assert!(writer.contains(Authorization::WRITE_INCIDENTS));

        let reader = provider
            .authorizations_for(&User::new("Bucket"), Some(&event()))
            .await
            .unwrap();
        assert!(reader.contains(Authorization::READ_INCIDENTS));
        assert!(!reader.contains(Authorization::WRITE_INCIDENTS));

        let stranger = provider
            .authorizations_for(&User::new("Nobody"), Some(&event()))
            .await
            .unwrap();
        assert!(!stranger.contains(Authorization::READ_INCIDENTS));
        assert!(stranger.contains(Authorization::WRITE_INCIDENT_REPORTS));
    }

    #[tokio::test]
    async fn test_admin_is_not_implicitly_an_event_writer() {
        let (_, provider) = make_provider().await;
        let admin = User::new("Admin");
        assert!(provider.authorize(&admin, None, Authorization::IMS_ADMIN).await.is_ok());
        let err = provider
            .authorize(&admin, Some(&event()), Authorization::WRITE_INCIDENTS)
            .await
            .unwrap_err();
        assert!(matches!(err, ImsError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn test_wildcard_readers() {
        let (storage, provider) = make_provider().await;
        storage.set_readers(&event(), vec!["*".into()]).await.unwrap();
        assert!(provider
            .authorize(&User::new("Anyone"), Some(&event()), Authorization::READ_INCIDENTS)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_incident_report_access() {
        let (storage, provider) = make_provider().await;
        let mut report = IncidentReport::new(Utc::now());
        report
            .report_entries
            .push(ReportEntry::new("Author", "I saw a thing", Utc::now()));
        let report = storage.create_incident_report(report, "Author").await.unwrap();

        assert!(provider
            .authorize_for_incident_report(&User::new("Author"), report.number)
            .await
            .is_ok());
        assert!(provider
            .authorize_for_incident_report(&User::new("Admin"), report.number)
            .await
            .is_ok());
        assert!(provider
            .authorize_for_incident_report(&User::new("Bucket"), report.number)
            .await
            .is_err());

        let incident = storage
            .create_incident(Incident::new(event(), Utc::now()), "Tool")
            .await
            .unwrap();
        storage
            .attach_incident_report_to_incident(report.number, &event(), incident.number)
            .await
            .unwrap();
        assert!(provider
            .authorize_for_incident_report(&User::new("Bucket"), report.number)
            .await
            .is_ok());
    }
}
