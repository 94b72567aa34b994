use axum::{async_trait, extract::FromRequestParts, http::header, http::request::Parts};

use crate::auth::User;
use crate::error::{ImsError, ImsResult};
use crate::model::event::Event;
use crate::server::{ApiError, AppState};

/// The user named by a valid bearer token. Rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        Ok(AuthenticatedUser(state.tokens.authenticate(header)?))
    }
}

/// Event named in a URL path.
pub(crate) fn path_event(id: &str) -> ImsResult<Event> {
    Event::new(id).map_err(|_| ImsError::NoSuchEvent(id.to_string()))
}

/// Entity number from a URL path; anything unparseable is not found.
pub(crate) fn path_number(text: &str) -> ImsResult<u32> {
    text.parse()
        .map_err(|_| ImsError::NotFound(format!("no such number: {text}")))
}
