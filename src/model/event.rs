use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ImsError, ImsResult};

/// An event (typically one year's gathering) which owns incidents and
/// their access control lists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Event {
    id: String,
}

impl Event {
    pub fn new(id: impl Into<String>) -> ImsResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ImsError::InvalidInput("event id may not be empty".to_string()));
        }
        Ok(Self { id })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl TryFrom<String> for Event {
    type Error = ImsError;

    fn try_from(id: String) -> ImsResult<Self> {
        Event::new(id)
    }
}

impl From<Event> for String {
    fn from(event: Event) -> Self {
        event.id
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_id_rejected() {
        assert!(Event::new("").is_err());
        assert!(Event::new("  ").is_err());
        assert_eq!(Event::new("2025").unwrap().id(), "2025");
    }

    #[test]
    fn test_serializes_as_string() {
        let event = Event::new("2025").unwrap();
        assert_eq!(serde_json::to_string(&event).unwrap(), "\"2025\"");
        assert!(serde_json::from_str::<Event>("\"\"").is_err());
    }
}
