use thiserror::Error;

use crate::patch::PatchRejection;

/// Central error type for IMS operations.
#[derive(Error, Debug)]
pub enum ImsError {
    #[error("No such event: {0}")]
    NoSuchEvent(String),

    #[error("No such incident: {event}#{number}")]
    NoSuchIncident { event: String, number: u32 },

    #[error("No such incident report: #{0}")]
    NoSuchIncidentReport(u32),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Rejected(#[from] PatchRejection),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid query parameter {name}{}", .value.as_ref().map(|v| format!(": {v}")).unwrap_or_default())]
    InvalidQuery {
        name: &'static str,
        value: Option<String>,
    },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImsError {
    pub fn missing_query(name: &'static str) -> Self {
        ImsError::InvalidQuery { name, value: None }
    }

    pub fn invalid_query(name: &'static str, value: impl Into<String>) -> Self {
        ImsError::InvalidQuery {
            name,
            value: Some(value.into()),
        }
    }
}

/// Convenience type alias for IMS results.
pub type ImsResult<T> = Result<T, ImsError>;
