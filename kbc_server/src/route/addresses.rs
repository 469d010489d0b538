//! Postcode-to-address lookup for sources that support it.

use axum::extract::{Query, State};
use axum::response::Json;
use kbc_core::schedule::PropertyAddress;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    source: Option<String>,
    postcode: Option<String>,
}

#[derive(Serialize)]
pub struct AddressResponse {
    data: Vec<PropertyAddress>,
}

pub async fn handler(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<AddressResponse>, ApiError> {
    let (Some(source), Some(postcode)) = (&params.source, &params.postcode) else {
        return Err(ApiError::Validation(
            "Missing required parameters: source, postcode".to_string(),
        ));
    };
    let data = state.service.lookup_addresses(source, postcode).await?;
    Ok(Json(AddressResponse { data }))
}
