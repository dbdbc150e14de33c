use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use linkhop_core::StoreError;
use linkhop_normalizer::NormalizeError;
use linkhop_ratelimit::RateLimitError;
use linkhop_redirector::RedirectorError;
use linkhop_shortener::ShortenerError;
use serde::Serialize;
use tracing::{error, warn};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    NotFound(String),
    AllocationExhausted(String),
    StoreUnavailable(String),
    Throttled { retry_after: Duration },
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AllocationExhausted(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::AllocationExhausted(_) => "allocation_exhausted",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::Throttled { .. } => "throttled",
            AppError::Internal(_) => "internal_error",
        }
    }
}

/// Whole seconds to wait, rounded up and at least one.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (message, retry_after) = match self {
            AppError::Throttled { retry_after } => (
                "too many requests".to_string(),
                Some(retry_after_secs(retry_after)),
            ),
            AppError::Validation(message)
            | AppError::NotFound(message)
            | AppError::AllocationExhausted(message)
            | AppError::StoreUnavailable(message)
            | AppError::Internal(message) => (message, None),
        };

        if status.is_server_error() {
            error!(code, message = %message, "request failed");
        }

        let body = ErrorBody {
            error: ErrorInfo { code, message },
        };
        let mut response = (status, Json(body)).into_response();

        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(_) | StoreError::Timeout(_) => {
                AppError::StoreUnavailable(e.to_string())
            }
            StoreError::InvalidData(_) | StoreError::Operation(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<NormalizeError> for AppError {
    fn from(e: NormalizeError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<ShortenerError> for AppError {
    fn from(e: ShortenerError) -> Self {
        match e {
            ShortenerError::AllocationExhausted { .. } => AppError::AllocationExhausted(e.to_string()),
            ShortenerError::InvalidConfig(message) => AppError::Internal(message),
            ShortenerError::Store(e) => e.into(),
        }
    }
}

impl From<RedirectorError> for AppError {
    fn from(e: RedirectorError) -> Self {
        match e {
            RedirectorError::Store(e) => e.into(),
        }
    }
}

impl From<RateLimitError> for AppError {
    fn from(e: RateLimitError) -> Self {
        match e {
            RateLimitError::Store(e) => e.into(),
            RateLimitError::InvalidConfig(message) => {
                warn!(message = %message, "rate limiter misconfigured");
                AppError::Internal(message)
            }
        }
    }
}
