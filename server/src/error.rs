//! API error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use trx_broker_core::{BrokerError, InvoiceId};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    /// Number shown to the user when an invoice could not be issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<InvoiceId>,
    pub retryable: bool,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::UnsupportedMediaType(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE")
            }
            ApiError::Broker(e) => match e {
                BrokerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
                BrokerError::InvalidCallbackPayload(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_CALLBACK_PAYLOAD")
                }
                BrokerError::InvoiceNotFound(_) => (StatusCode::NOT_FOUND, "INVOICE_NOT_FOUND"),
                BrokerError::NotOwner(_) => (StatusCode::FORBIDDEN, "NOT_OWNER"),
                BrokerError::Gateway(_) => (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR"),
                BrokerError::InvoiceNotIssued { .. } => {
                    (StatusCode::BAD_GATEWAY, "INVOICE_NOT_ISSUED")
                }
                BrokerError::UpstreamUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "UPSTREAM_UNAVAILABLE")
                }
                BrokerError::Persistence(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "Request failed");
        } else {
            tracing::debug!(error = %self, code, "Request rejected");
        }

        let (invoice_id, retryable) = match &self {
            ApiError::Broker(e @ BrokerError::InvoiceNotIssued { invoice_id, .. }) => {
                (Some(*invoice_id), e.is_retryable())
            }
            ApiError::Broker(e) => (None, e.is_retryable()),
            _ => (None, false),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            invoice_id,
            retryable,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
