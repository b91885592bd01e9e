// src/error.rs
//! Core error type shared by the document model, the pipeline and the sentiment services.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Required document field empty after normalization.
    #[error("Document.{field} is required")]
    Validation { field: &'static str },

    /// Pipeline input that is neither a Document nor a key-value object.
    #[error("input must be a Document or an object, got {kind}")]
    UnsupportedPayload { kind: &'static str },

    /// Inference failed. The cause is logged where it happens and not exposed.
    #[error("inference failed")]
    Inference,

    #[error("sentiment service unavailable")]
    ServiceUnavailable,

    #[error("too many rows (max {max})")]
    TooManyRows { max: usize },
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation { .. } | Error::UnsupportedPayload { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::Inference => StatusCode::BAD_GATEWAY,
            Error::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Error::TooManyRows { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_field_and_hide_inference_detail() {
        let e = Error::Validation { field: "source" };
        assert!(e.to_string().contains("source"));
        assert_eq!(Error::Inference.to_string(), "inference failed");
        assert_eq!(Error::Inference.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            Error::TooManyRows { max: 3 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}
