use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Error body shape shared by every non-2xx response: a stable machine
/// readable kind plus a human readable message.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

pub fn error(kind: &str, message: impl Into<String>, status: StatusCode) -> Response {
    let body = ErrorBody {
        error: kind.to_string(),
        message: message.into(),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_serializes_flat() {
        let body = ErrorBody {
            error: "not_found".to_string(),
            message: "policy not found".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "not_found");
        assert_eq!(json["message"], "policy not found");
    }
}
