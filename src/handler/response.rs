//! Response type shared by every transport

use axum::{
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use super::StatsError;

/// Headers attached to every response, success or error
pub const CORS_HEADERS: [(HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
];

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Status code plus JSON body, independent of how it gets sent
#[derive(Debug, Clone, PartialEq)]
pub struct StatsResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl StatsResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }
}

impl From<StatsError> for StatsResponse {
    fn from(err: StatsError) -> Self {
        Self {
            status: err.status(),
            body: json!({ "error": err.to_string() }),
        }
    }
}

impl IntoResponse for StatsResponse {
    fn into_response(self) -> Response {
        // Json sets Content-Type: application/json
        (self.status, CORS_HEADERS, Json(self.body)).into_response()
    }
}
