use async_trait::async_trait;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::error::{ImsError, ImsResult};
use crate::model::event::Event;

pub mod acl;
pub mod token;

pub use acl::AclAuthProvider;
pub use token::{Claims, TokenIssuer};

// ---------------------------------------------------------------------------
// Authorization: a set of capability bits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Authorization(u8);

impl Authorization {
    pub const NONE: Authorization = Authorization(0);
    pub const IMS_ADMIN: Authorization = Authorization(1 << 0);
    pub const READ_PERSONNEL: Authorization = Authorization(1 << 1);
    pub const READ_INCIDENTS: Authorization = Authorization(1 << 2);
    pub const WRITE_INCIDENTS: Authorization = Authorization(1 << 3);
    pub const READ_INCIDENT_REPORTS: Authorization = Authorization(1 << 4);
    pub const WRITE_INCIDENT_REPORTS: Authorization = Authorization(1 << 5);

    const NAMES: [(Authorization, &'static str); 6] = [
        (Authorization::IMS_ADMIN, "imsAdmin"),
        (Authorization::READ_PERSONNEL, "readPersonnel"),
        (Authorization::READ_INCIDENTS, "readIncidents"),
        (Authorization::WRITE_INCIDENTS, "writeIncidents"),
        (Authorization::READ_INCIDENT_REPORTS, "readIncidentReports"),
        (Authorization::WRITE_INCIDENT_REPORTS, "writeIncidentReports"),
    ];

    pub fn contains(&self, other: Authorization) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Authorization {
    type Output = Authorization;

    fn bitor(self, rhs: Self) -> Self::Output {
        Authorization(self.0 | rhs.0)
    }
}

impl BitOrAssign for Authorization {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

// ---------------------------------------------------------------------------
// User and AuthProvider
// ---------------------------------------------------------------------------

/// The authenticated principal of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub handle: String,
}

impl User {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
        }
    }
}

/// Decides what an authenticated user may do.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Capabilities held by `user`, globally or within `event`.
    async fn authorizations_for(&self, user: &User, event: Option<&Event>)
        -> ImsResult<Authorization>;

    /// May `user` read incident report `number`?
    async fn authorize_for_incident_report(&self, user: &User, number: u32) -> ImsResult<()>;

    async fn authorize(
        &self,
        user: &User,
        event: Option<&Event>,
        required: Authorization,
    ) -> ImsResult<()> {
        let granted = self.authorizations_for(user, event).await?;
        if granted.contains(required) {
            return Ok(());
        }

        tracing::debug!(
            user = %user.handle,
            event = event.map(Event::id),
            %required,
            %granted,
            "authorization denied"
        );
        Err(ImsError::NotAuthorized(match event {
            Some(event) => format!("{} requires {} on event {}", user.handle, required, event),
            None => format!("{} requires {}", user.handle, required),
        }))
    }
}
