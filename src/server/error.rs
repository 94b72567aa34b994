use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::ImsError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// An `ImsError` on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ImsError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ImsError::Rejected(_) | ImsError::InvalidInput(_) | ImsError::InvalidQuery { .. } => {
                StatusCode::BAD_REQUEST
            }
            ImsError::NoSuchEvent(_)
            | ImsError::NoSuchIncident { .. }
            | ImsError::NoSuchIncidentReport(_)
            | ImsError::NotFound(_) => StatusCode::NOT_FOUND,
            ImsError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ImsError::NotAuthorized(_) => StatusCode::FORBIDDEN,
            ImsError::Storage(_)
            | ImsError::Config(_)
            | ImsError::Serialization(_)
            | ImsError::Io(_)
            | ImsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ImsError> for ApiError {
    fn from(err: ImsError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self.0, "request rejected");
        }

        let mut response = (status, Json(ErrorResponse { error: self.0.to_string() })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
