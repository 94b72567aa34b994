use axum::{
    body::{Body, Bytes},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AclAuthProvider, AuthProvider, TokenIssuer};
use crate::config::AppConfig;
use crate::error::{ImsError, ImsResult};
use crate::model::event::Event;
use crate::model::report::ReportEntry;
use crate::notify::NotificationHub;
use crate::personnel::PersonnelDirectory;
use crate::store::{InMemoryStorage, Storage};
use crate::stream::{json_array_body, result_set_etag};

pub mod admin;
pub mod error;
pub mod eventsource;
pub mod extract;
pub mod incidents;
pub mod personnel;
pub mod reports;

pub use error::{ApiError, ApiResult};
pub use extract::AuthenticatedUser;

/// Prefix of every JSON API route.
pub const API_PREFIX: &str = "/ims/api";

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub auth: Arc<dyn AuthProvider>,
    pub personnel: PersonnelDirectory,
    pub hub: NotificationHub,
    pub tokens: TokenIssuer,
    /// Configured locations, serialized once at startup.
    pub locations: Bytes,
    pub locations_etag: String,
}

/// Build the shared state from configuration, seeding the in-memory store
/// with the configured events and incident types.
pub async fn build_state(config: &AppConfig) -> ImsResult<AppState> {
    let hub = NotificationHub::default();
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new(hub.clone()));

    for id in &config.store.events {
        storage.create_event(&Event::new(id.as_str())?).await?;
    }
    for name in &config.store.incident_types {
        storage.create_incident_type(name, false).await?;
    }

    let auth: Arc<dyn AuthProvider> = Arc::new(AclAuthProvider::new(
        storage.clone(),
        config.auth.admins.iter().cloned(),
    ));

    let locations = Bytes::from(serde_json::to_vec(&config.store.locations)?);
    let locations_etag = result_set_etag([&locations]);

    Ok(AppState {
        storage,
        auth,
        personnel: PersonnelDirectory::from_config(&config.personnel),
        hub,
        tokens: TokenIssuer::new(&config.auth.jwt_secret, config.auth.token_lifetime_secs),
        locations,
        locations_etag,
    })
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/ping/", get(ping))
        .route("/personnel/", get(personnel::list_personnel))
        .route(
            "/incident_types/",
            get(admin::list_incident_types).post(admin::edit_incident_types),
        )
        .route("/events/", get(admin::list_events).post(admin::edit_events))
        .route("/events/:event/locations/", get(incidents::list_locations))
        .route(
            "/events/:event/incidents/",
            get(incidents::list_incidents).post(incidents::new_incident),
        )
        .route(
            "/events/:event/incidents/:number",
            get(incidents::read_incident).post(incidents::edit_incident),
        )
        .route(
            "/incident_reports/",
            get(reports::list_incident_reports).post(reports::new_incident_report),
        )
        .route(
            "/incident_reports/:number",
            get(reports::read_incident_report).post(reports::edit_incident_report),
        )
        .route("/access", get(admin::read_access).post(admin::edit_access))
        .route("/streets", get(admin::read_streets).post(admin::edit_streets))
        .route("/eventsource", get(eventsource::event_source));

    Router::new()
        .nest(API_PREFIX, api)
        .route("/ims/auth/login", axum::routing::post(personnel::login))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn run_http_server(config: AppConfig) -> ImsResult<()> {
    let state = build_state(&config).await?;
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|err| ImsError::Config(format!("invalid server address: {err}")))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| ImsError::Internal(format!("failed to bind server: {err}")))?;

    tracing::info!(bind_addr = %addr, "ims listening");

    axum::serve(listener, app)
        .await
        .map_err(|err| ImsError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn ping() -> ApiResult<Response> {
    const ACK: &[u8] = br#""ack""#;
    json_bytes_response(Bytes::from_static(ACK), Some(result_set_etag([ACK])))
}

// ---------------------------------------------------------------------------
// Response helpers shared by the handler modules
// ---------------------------------------------------------------------------

fn header_value(value: &str) -> ImsResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|err| ImsError::Internal(format!("invalid header value {value:?}: {err}")))
}

fn with_etag(mut response: Response, etag: Option<String>) -> ImsResult<Response> {
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Some(etag) = etag {
        response.headers_mut().insert(header::ETAG, header_value(&etag)?);
    }
    Ok(response)
}

pub(crate) fn json_bytes_response(body: Bytes, etag: Option<String>) -> ApiResult<Response> {
    Ok(with_etag(Body::from(body).into_response(), etag)?)
}

/// A single JSON document.
pub(crate) fn json_response<T: Serialize>(value: &T, etag: Option<String>) -> ApiResult<Response> {
    let body = serde_json::to_vec(value).map_err(ImsError::from)?;
    json_bytes_response(Bytes::from(body), etag)
}

/// A JSON array written element by element as the body is polled.
pub(crate) fn streamed_array_response<T>(items: Vec<T>, etag: Option<String>) -> ApiResult<Response>
where
    T: Serialize + Send + 'static,
{
    Ok(with_etag(json_array_body(items).into_response(), etag)?)
}

/// 201 with the new entity's number under `number_header` and its URL.
pub(crate) fn created_response(
    number_header: &'static str,
    number: u32,
    location: &str,
) -> ApiResult<Response> {
    let mut response = axum::http::StatusCode::CREATED.into_response();
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static(number_header),
        header_value(&number.to_string())?,
    );
    headers.insert(header::LOCATION, header_value(location)?);
    Ok(response)
}

pub(crate) fn read_json<T: DeserializeOwned>(body: &Bytes) -> ImsResult<T> {
    serde_json::from_slice(body).map_err(|err| ImsError::InvalidInput(format!("Invalid JSON: {err}")))
}

// ---------------------------------------------------------------------------
// Creation defaults shared by incidents and incident reports
// ---------------------------------------------------------------------------

/// A report entry as submitted with a new entity.
#[derive(Debug, Deserialize)]
pub(crate) struct NewReportEntry {
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    system_entry: bool,
}

/// Fill in entry authors and times, then settle the entity's `created`:
/// the given time if not in the future, else the earliest entry time (or
/// now when there are no earlier entries).
pub(crate) fn creation_defaults(
    created: Option<DateTime<Utc>>,
    entries: Vec<NewReportEntry>,
    author: &str,
) -> ImsResult<(DateTime<Utc>, Vec<ReportEntry>)> {
    let now = Utc::now();

    let entries: Vec<ReportEntry> = entries
        .into_iter()
        .filter(|entry| !entry.text.is_empty())
        .map(|entry| ReportEntry {
            author: entry.author.unwrap_or_else(|| author.to_string()),
            text: entry.text,
            created: entry.created.unwrap_or(now),
            system_entry: entry.system_entry,
        })
        .collect();

    let created = match created {
        Some(created) if created > now => {
            return Err(ImsError::InvalidInput(format!(
                "Created time {created} is in the future. Current time is {now}."
            )))
        }
        Some(created) => created,
        None => entries
            .iter()
            .map(|entry| entry.created)
            .fold(now, std::cmp::min),
    };

    Ok((created, entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(text: &str, created: Option<DateTime<Utc>>) -> NewReportEntry {
        NewReportEntry {
            author: None,
            text: text.to_string(),
            created,
            system_entry: false,
        }
    }

    #[test]
    fn test_created_defaults_to_earliest_entry() {
        let earlier = Utc::now() - Duration::hours(2);
        let (created, entries) = creation_defaults(
            None,
            vec![entry("a", None), entry("b", Some(earlier)), entry("", None)],
            "Hubcap",
        )
        .unwrap();

        assert_eq!(created, earlier);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.author == "Hubcap"));
    }

    #[test]
    fn test_future_created_rejected() {
        let future = Utc::now() + Duration::hours(1);
        assert!(matches!(
            creation_defaults(Some(future), Vec::new(), "Hubcap"),
            Err(ImsError::InvalidInput(_))
        ));
    }
}
