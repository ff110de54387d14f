use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway errors with their client-facing HTTP mapping.
///
/// This enum is the single translation point from error kind to status code
/// and envelope `type`; translators and adapters only ever pick a kind.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The payload failed schema validation at ingress or in an adapter.
    #[error("{0}")]
    InvalidRequest(String),

    /// The requested model is not registered with any provider.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// The provider cannot fulfill the requested action.
    #[error("{0}")]
    UnsupportedOperation(String),

    /// The request body exceeded the ingress size cap.
    #[error("request body exceeds the 1 MiB limit")]
    PayloadTooLarge,

    /// The upstream returned a structured error payload.
    #[error("{provider} error ({error_type}): {message}")]
    Provider {
        provider: String,
        error_type: String,
        message: String,
    },

    /// The upstream returned a non-2xx status without a parseable error body.
    #[error("upstream error status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// The upstream could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The upstream answered 2xx but the response carried no usable content.
    #[error("{0}")]
    UpstreamEmpty(String),

    /// Internal server error.
    /// If `Some(message)`, the message is safe to show; if `None`, details
    /// must not leak to clients.
    #[error("internal server error")]
    Internal(Option<String>),
}

impl GatewayError {
    /// The HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::UnknownModel(_) | Self::UnsupportedOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Provider { .. } | Self::UpstreamStatus { .. } | Self::Connection(_) | Self::UpstreamEmpty(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The envelope `type` string for this error.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_)
            | Self::UnknownModel(_)
            | Self::UnsupportedOperation(_)
            | Self::PayloadTooLarge => "invalid_request_error",
            Self::Provider { .. } | Self::UpstreamStatus { .. } | Self::Connection(_) | Self::UpstreamEmpty(_) => {
                "upstream_error"
            }
            Self::Internal(_) => "server_error",
        }
    }

    /// Message that is safe to expose to API consumers.
    pub fn client_message(&self) -> String {
        match self {
            Self::Internal(Some(message)) => message.clone(),
            Self::Internal(None) => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Client-facing error message, attached to error responses as an extension
/// so the request-logging middleware can record it.
#[derive(Debug, Clone)]
pub struct ErrorMessage(pub String);

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    r#type: String,
    code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.client_message();

        let body = ErrorResponse {
            error: ErrorDetails {
                message: message.clone(),
                r#type: self.error_type().to_string(),
                code: status.as_u16(),
            },
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(ErrorMessage(message));

        response
    }
}
