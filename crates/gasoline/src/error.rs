// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error kinds surfaced to the agent or the capture script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasolineError {
    UnknownQueryType,
    TargetResolutionFailed,
    MissingTarget,
    CspBlockedPage,
    QueryHandlerError,
    NoResult,
    NotImplemented,
    InvalidRequest,
    BufferOverflow,
    Internal,
}

impl GasolineError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::UnknownQueryType => 400,
            Self::TargetResolutionFailed => 409,
            Self::MissingTarget => 409,
            Self::CspBlockedPage => 200,
            Self::QueryHandlerError => 500,
            Self::NoResult => 500,
            Self::NotImplemented => 200,
            Self::InvalidRequest => 400,
            Self::BufferOverflow => 413,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownQueryType => "unknown_query_type",
            Self::TargetResolutionFailed => "target_resolution_failed",
            Self::MissingTarget => "missing_target",
            Self::CspBlockedPage => "csp_blocked_page",
            Self::QueryHandlerError => "query_handler_error",
            Self::NoResult => "no_result",
            Self::NotImplemented => "not_implemented",
            Self::InvalidRequest => "invalid_request",
            Self::BufferOverflow => "buffer_overflow",
            Self::Internal => "internal",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody {
            error: self.as_str().to_owned(),
            message: message.into(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn to_http_response(&self, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_error_body(message)))
    }
}

impl fmt::Display for GasolineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for GasolineError {}

impl IntoResponse for GasolineError {
    fn into_response(self) -> Response {
        self.to_http_response(self.as_str()).into_response()
    }
}

/// Structured error body: `{error, message, ...kind-specific fields}`.
///
/// Kind-specific fields (`csp_blocked`, `retryable`, `failure_cause`, ...)
/// are attached by call sites via [`ErrorBody::with_extra`] rather than
/// modeled as enum variants, since they vary per dispatch path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(flatten, skip_serializing_if = "serde_json::Map::is_empty", default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ErrorBody {
    pub fn with_extra(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extra.insert(key.to_owned(), value);
        self
    }
}
