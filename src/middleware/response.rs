use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::pagination::Pagination;

/// Wrapper for API responses that automatically adds the success envelope:
/// `{ success, data, pagination?, message? }`
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub pagination: Option<Pagination>,
    pub message: Option<String>,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            pagination: None,
            message: None,
            status_code: None, // Default to 200 OK
        }
    }

    /// Create a list response with pagination metadata
    pub fn paginated(data: T, pagination: Pagination) -> Self {
        Self {
            data,
            pagination: Some(pagination),
            message: None,
            status_code: None,
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self {
            data,
            pagination: None,
            message: None,
            status_code: Some(StatusCode::CREATED),
        }
    }

    /// Attach a human-readable message to the envelope
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<Value> {
    /// Message-only envelope, e.g. after a soft delete
    pub fn message(message: impl Into<String>) -> Self {
        ApiResponse::success(Value::Null).with_message(message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        // Convert data to JSON Value for consistent envelope format
        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": "Failed to serialize response data"
                    })),
                )
                    .into_response();
            }
        };

        // Wrap in success envelope
        let mut envelope = json!({ "success": true });
        if !data_value.is_null() {
            envelope["data"] = data_value;
        }
        if let Some(pagination) = &self.pagination {
            envelope["pagination"] = json!(pagination);
        }
        if let Some(message) = &self.message {
            envelope["message"] = json!(message);
        }

        (status, Json(envelope)).into_response()
    }
}

/// Handler result type: success envelope or an ApiError response
pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
