//! Response envelope shared by every endpoint.
//!
//! ```json
//! { "statusCode": 200, "message": null, "data": 42 }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 200 with a payload.
    pub fn ok(data: T) -> Self {
        ApiResponse {
            status_code: StatusCode::OK.as_u16(),
            message: None,
            data: Some(data),
        }
    }

    /// Error envelope; `data` is always null.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        ApiResponse {
            status_code: status.as_u16(),
            message: Some(message.into()),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}
