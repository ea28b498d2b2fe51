use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::datatable::DataTableResponse;

/// Data-table response paired with the HTTP status it is sent with.
///
/// The body already carries the `success` discriminator, so it is written
/// as-is rather than wrapped in another envelope.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub body: DataTableResponse<T>,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Default 200 status, used for failures as well as successes
    pub fn success(body: DataTableResponse<T>) -> Self {
        Self {
            body,
            status_code: None,
        }
    }

    pub fn with_status(body: DataTableResponse<T>, status_code: StatusCode) -> Self {
        Self {
            body,
            status_code: Some(status_code),
        }
    }

    /// 201 when the row was created, 200 when the handler reported a failure
    pub fn created(body: DataTableResponse<T>) -> Self {
        if body.is_success() {
            Self::with_status(body, StatusCode::CREATED)
        } else {
            Self::success(body)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        match serde_json::to_value(&self.body) {
            Ok(value) => (status, Json(value)).into_response(),
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": "Failed to serialize response data"
                    })),
                )
                    .into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
