use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RangerConfig;
use crate::error::{ImsError, ImsResult};
use crate::model::ranger::Ranger;

struct Member {
    ranger: Ranger,
    password_hash: String,
}

/// The personnel roster. Loaded once from configuration; read-only after.
#[derive(Clone, Default)]
pub struct PersonnelDirectory {
    members: Arc<Vec<Member>>,
    by_handle: Arc<HashMap<String, usize>>,
}

impl PersonnelDirectory {
    pub fn from_config(personnel: &[RangerConfig]) -> Self {
        let members: Vec<Member> = personnel
            .iter()
            .map(|entry| Member {
                ranger: Ranger {
                    handle: entry.handle.clone(),
                    name: entry.name.clone(),
                    status: entry.status.clone(),
                    email: entry.email.clone(),
                },
                password_hash: entry.password_hash.clone(),
            })
            .collect();
        let by_handle = members
            .iter()
            .enumerate()
            .map(|(index, member)| (member.ranger.handle.clone(), index))
            .collect();

        Self {
            members: Arc::new(members),
            by_handle: Arc::new(by_handle),
        }
    }

    pub fn rangers(&self) -> Vec<Ranger> {
        self.members.iter().map(|m| m.ranger.clone()).collect()
    }

    pub fn ranger(&self, handle: &str) -> Option<Ranger> {
        self.by_handle
            .get(handle)
            .map(|&index| self.members[index].ranger.clone())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check credentials. `identification` may be a handle or an email
    /// address (case-insensitive). Blocks on bcrypt; call from a blocking
    /// context.
    pub fn verify_credentials(&self, identification: &str, password: &str) -> Option<Ranger> {
        let member = self.members.iter().find(|member| {
            member.ranger.handle == identification
                || member
                    .ranger
                    .email
                    .as_deref()
                    .is_some_and(|email| email.eq_ignore_ascii_case(identification))
        })?;

        match bcrypt::verify(password, &member.password_hash) {
            Ok(true) => Some(member.ranger.clone()),
            Ok(false) => None,
            Err(err) => {
                tracing::warn!(handle = %member.ranger.handle, error = %err, "unusable password hash");
                None
            }
        }
    }
}

/// Hash a password for the personnel table.
pub fn hash_password(password: &str) -> ImsResult<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|err| ImsError::Internal(format!("failed to hash password: {err}")))
}
