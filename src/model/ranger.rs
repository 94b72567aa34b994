use serde::{Deserialize, Serialize};

/// A member of the personnel roster, as vended by the personnel endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ranger {
    pub handle: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub email: Option<String>,
}
