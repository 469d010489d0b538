//! Schedule lookup as JSON, for the front-end.

use axum::extract::{Query, State};
use axum::response::Json;
use kbc_core::schedule::ScheduleEntry;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    source: Option<String>,
    postcode: Option<String>,
    property: Option<String>,
}

#[derive(Serialize)]
pub struct ScheduleResponse {
    data: Vec<ScheduleEntry>,
    cached: bool,
}

pub async fn handler(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let (Some(source), Some(postcode), Some(property)) =
        (&params.source, &params.postcode, &params.property)
    else {
        return Err(ApiError::Validation(
            "Missing required parameters: source, postcode, property".to_string(),
        ));
    };
    let result = state.service.get_schedule(source, postcode, property).await?;
    Ok(Json(ScheduleResponse {
        data: result.entries,
        cached: result.cached,
    }))
}
