use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Machine-readable error block carried by failed responses.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Stable error code (e.g. `VALIDATION_ERROR`, `CONFLICT`)
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Uniform response envelope used by every endpoint.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response
    pub fn success(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        let message = message.into();
        ApiResponse {
            success: true,
            status_code: status.as_u16(),
            message,
            timestamp: Utc::now().to_rfc3339(),
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        let message = message.into();
        ApiResponse {
            success: false,
            status_code: status.as_u16(),
            message: message.clone(),
            timestamp: Utc::now().to_rfc3339(),
            data: None,
            error: Some(ErrorBody {
                code: code.into(),
                message,
                details,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_skips_error_block() {
        let resp = ApiResponse::success(StatusCode::OK, "ok", serde_json::json!({"id": 1}));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["status_code"], 200);
        assert!(value.get("error").is_none());
        assert_eq!(value["data"]["id"], 1);
    }

    #[test]
    fn error_envelope_carries_code_and_message() {
        let resp = ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "CONFLICT",
            "request was already reviewed",
            None,
        );
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "CONFLICT");
        assert_eq!(value["error"]["message"], "request was already reviewed");
        assert!(value["error"].get("details").is_none());
        assert!(value.get("data").is_none());
    }
}
