//! Listing of the registered sources.

use axum::extract::State;
use axum::response::Json;
use kbc_core::schedule::SourceInfo;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct SourcesResponse {
    data: Vec<SourceInfo>,
}

pub async fn handler(State(state): State<AppState>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        data: state.service.sources(),
    })
}
