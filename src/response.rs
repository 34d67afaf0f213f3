// src/response.rs

use axum::Json;
use serde::Serialize;

/// Uniform success envelope: `{ "success": true, "data": ..., "message": ... }`.
///
/// Errors use the mirror shape `{ "success": false, "error": ... }` produced
/// by `AppError::into_response`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
        })
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        })
    }
}

/// Envelope with a message and no data payload.
pub fn message_only(message: impl Into<String>) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        success: true,
        data: None,
        message: Some(message.into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_empty_fields() {
        let body = serde_json::to_value(&ApiResponse::data(42).0).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], 42);
        assert!(body.get("message").is_none());

        let body = serde_json::to_value(&message_only("done").0).unwrap();
        assert_eq!(body["message"], "done");
        assert!(body.get("data").is_none());
    }
}
