//! Request error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use kbc_core::error::ServiceError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub enum ApiError {
    /// Missing or malformed request parameters.
    Validation(String),
    Service(ServiceError),
    /// The fetch succeeded but resolved no entries; distinct from a fault.
    NoScheduleData,
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Validation(message) => (StatusCode::BAD_REQUEST, message),
            Self::Service(err @ ServiceError::UnknownSource(_)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            Self::Service(err @ ServiceError::UnsupportedLookup(_)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            Self::Service(ServiceError::Upstream(err)) => {
                tracing::error!(error = %err, "upstream fetch failed");
                // The Display string names the failure without internals.
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            Self::NoScheduleData => (
                StatusCode::NOT_FOUND,
                "No bin collection data found for this address".to_string(),
            ),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
