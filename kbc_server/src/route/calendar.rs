//! The subscribable feed endpoint.

use axum::extract::{Host, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use kbc_core::feed::{self, FeedOptions, ReminderTime, DEFAULT_CALENDAR_NAME, DEFAULT_REMINDER};
use serde::Deserialize;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    source: Option<String>,
    postcode: Option<String>,
    property: Option<String>,
    reminder: Option<String>,
    group: Option<String>,
    name: Option<String>,
    download: Option<String>,
}

/// Handle calendar requests.
///
/// `source`, `postcode` and `property` must be given in the query string;
/// the remaining parameters shape the feed per request.
pub async fn handler(
    State(state): State<AppState>,
    Host(host): Host,
    Query(params): Query<QueryParams>,
) -> Result<Response, ApiError> {
    let (Some(source), Some(postcode), Some(property)) =
        (&params.source, &params.postcode, &params.property)
    else {
        return Err(ApiError::Validation(
            "Missing required parameters: source, postcode, property".to_string(),
        ));
    };

    let reminder_raw = params.reminder.as_deref().unwrap_or(DEFAULT_REMINDER);
    let reminder = if reminder_raw.is_empty() {
        None
    } else {
        Some(ReminderTime::parse(reminder_raw).ok_or_else(|| {
            ApiError::Validation("reminder must be HH:MM".to_string())
        })?)
    };
    let options = FeedOptions {
        calendar_name: params
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_CALENDAR_NAME.to_string()),
        reminder,
        group_same_day: params.group.as_deref() != Some("false"),
    };

    let result = state.service.get_schedule(source, postcode, property).await?;
    if result.entries.is_empty() {
        return Err(ApiError::NoScheduleData);
    }

    // The UID/PRODID domain is whatever host the subscriber reached us on.
    let domain = host.split(':').next().unwrap_or(&host).to_string();
    let calendar = feed::encode(&result.entries, &options, &domain, Utc::now());

    let mut response = (
        [(CONTENT_TYPE, "text/calendar; charset=utf-8")],
        calendar,
    )
        .into_response();
    if params.download.is_some() {
        let disposition = format!("attachment; filename=\"{source}-bins.ics\"");
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            response.headers_mut().insert(CONTENT_DISPOSITION, value);
        }
    }
    Ok(response)
}
