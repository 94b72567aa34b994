use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::Authorization;
use crate::error::ImsError;
use crate::model::event::Event;
use crate::model::report::IncidentReport;
use crate::patch::{apply_incident_report_patch, ReportAttachment};
use crate::server::extract::path_number;
use crate::server::{
    created_response, creation_defaults, json_response, read_json, streamed_array_response,
    ApiResult, AppState, AuthenticatedUser, NewReportEntry, API_PREFIX,
};
use crate::stream::result_set_etag;

#[derive(Debug, Default, Deserialize)]
pub struct ReportListQuery {
    pub event: Option<String>,
    pub incident: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportEditQuery {
    pub action: Option<String>,
    pub event: Option<String>,
    pub incident: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewIncidentReport {
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    report_entries: Vec<NewReportEntry>,
}

fn report_etag<'a>(reports: impl IntoIterator<Item = &'a IncidentReport>) -> String {
    result_set_etag(
        reports
            .into_iter()
            .map(|report| format!("{}:{}", report.number, report.version)),
    )
}

/// Reports attached to `?event=&incident=`, or the detached reports when
/// both are given empty.
pub async fn list_incident_reports(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
    Query(query): Query<ReportListQuery>,
) -> ApiResult<Response> {
    let event_id = query.event.ok_or_else(|| ImsError::missing_query("event"))?;
    let incident = query
        .incident
        .ok_or_else(|| ImsError::missing_query("incident"))?;

    let reports = if event_id.is_empty() && incident.is_empty() {
        state
            .auth
            .authorize(&user, None, Authorization::READ_INCIDENT_REPORTS)
            .await?;
        state.storage.detached_incident_reports().await?
    } else {
        let event = Event::new(event_id.as_str())
            .map_err(|_| ImsError::invalid_query("event", event_id.as_str()))?;
        let incident_number: u32 = incident
            .parse()
            .map_err(|_| ImsError::invalid_query("incident", incident.as_str()))?;

        state
            .auth
            .authorize(&user, Some(&event), Authorization::READ_INCIDENTS)
            .await?;
        state
            .storage
            .incident_reports_attached_to_incident(&event, incident_number)
            .await?
    };

    let etag = report_etag(&reports);
    streamed_array_response(reports, Some(etag))
}

pub async fn new_incident_report(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Response> {
    state
        .auth
        .authorize(&user, None, Authorization::WRITE_INCIDENT_REPORTS)
        .await?;

    let new: NewIncidentReport = read_json(&body)?;
    let (created, report_entries) = creation_defaults(new.created, new.report_entries, &user.handle)?;

    let mut report = IncidentReport::new(created);
    report.summary = new.summary;
    report.report_entries = report_entries;

    let report = state
        .storage
        .create_incident_report(report, &user.handle)
        .await?;
    tracing::info!(
        author = %user.handle,
        number = report.number,
        "created new incident report via JSON"
    );

    created_response(
        "incident-report-number",
        report.number,
        &format!("{API_PREFIX}/incident_reports/{}", report.number),
    )
}

pub async fn read_incident_report(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> ApiResult<Response> {
    let number = path_number(&number)?;
    state.auth.authorize_for_incident_report(&user, number).await?;

    let report = state.storage.incident_report_with_number(number).await?;
    json_response(&report, Some(report_etag([&report])))
}

pub async fn edit_incident_report(
    AuthenticatedUser(user): AuthenticatedUser,
    State(state): State<AppState>,
    Path(number): Path<String>,
    Query(query): Query<ReportEditQuery>,
    body: Bytes,
) -> ApiResult<Response> {
    state
        .auth
        .authorize(&user, None, Authorization::WRITE_INCIDENT_REPORTS)
        .await?;

    let number = path_number(&number)?;
    let attachment = ReportAttachment::from_query(
        query.action.as_deref(),
        query.event.as_deref(),
        query.incident.as_deref(),
    )?;
    let document: Value = read_json(&body)?;

    apply_incident_report_patch(
        state.storage.as_ref(),
        number,
        attachment.as_ref(),
        &document,
        &user.handle,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
