use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reviewer_core::{ErrorCode, ReviewError};
use serde::Serialize;

const BAD_REQUEST: &str = "BAD_REQUEST";
const INTERNAL_MESSAGE: &str = "internal error";

/// Error body: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorPayload<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorPayload<'a> {
    code: &'a str,
    message: &'a str,
}

/// A failed request, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: BAD_REQUEST,
            message: message.into(),
        }
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::TeamExists => StatusCode::BAD_REQUEST,
        ErrorCode::PrExists
        | ErrorCode::PrMerged
        | ErrorCode::NotAssigned
        | ErrorCode::NoCandidate => StatusCode::CONFLICT,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ReviewError> for ApiError {
    fn from(e: ReviewError) -> Self {
        let code = e.code();
        // Storage details stay in the logs.
        let message = if e.is_internal() {
            INTERNAL_MESSAGE.to_string()
        } else {
            e.to_string()
        };
        Self {
            status: status_for(code),
            code: code.as_str(),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            error: ErrorPayload {
                code: self.code,
                message: &self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}
