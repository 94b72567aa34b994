use axum::{body::Bytes, extract::State, response::Response, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Authorization;
use crate::error::{ImsError, ImsResult};
use crate::server::{read_json, streamed_array_response, ApiResult, AppState, AuthenticatedUser};
use crate::stream::{result_set_etag, to_json_bytes};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Handle or email address.
    pub identification: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub handle: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn login(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<LoginResponse>> {
    let request: LoginRequest = read_json(&body)?;

    let personnel = state.personnel.clone();
    let identification = request.identification.clone();
    let ranger = tokio::task::spawn_blocking(move || {
        personnel.verify_credentials(&request.identification, &request.password)
    })
    .await
    .map_err(|err| ImsError::Internal(format!("credential check failed: {err}")))?;

    let Some(ranger) = ranger else {
        tracing::warn!(identification = %identification, "failed login");
        return Err(ImsError::NotAuthenticated.into());
    };

    let (token, expires_at) = state.tokens.issue(&ranger.handle)?;
    tracing::info!(handle = %ranger.handle, "issued token");

    Ok(Json(LoginResponse {
        token,
        handle: ranger.handle,
        expires_at,
    }))
}

pub async fn list_personnel(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
) -> ApiResult<Response> {
    state
        .auth
        .authorize(&user, None, Authorization::READ_PERSONNEL)
        .await?;

    let rangers = state.personnel.rangers();
    let etag = result_set_etag(rangers.iter().map(to_json_bytes).collect::<ImsResult<Vec<_>>>()?);
    streamed_array_response(rangers, Some(etag))
}
