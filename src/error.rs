use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

/// Errors surfaced by the backend bridge
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Backend answered 401; retrying with the same credentials is pointless
    #[error("Authentication failed against DVBViewer backend")]
    Authentication,
    /// Connection refused, DNS failure, timeout
    #[error("Network error: {0}")]
    Network(String),
    /// Non-2xx status other than 401
    #[error("HTTP error: {0}")]
    Http(u16),
    /// Unexpected XML shape or unparseable field
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Request cancelled")]
    Cancelled,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Authentication => StatusCode::UNAUTHORIZED,
            ServiceError::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Http(_) | ServiceError::Decode(_) => StatusCode::BAD_GATEWAY,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Authentication => "authentication",
            ServiceError::Network(_) => "backend_unreachable",
            ServiceError::Http(_) => "backend_http",
            ServiceError::Decode(_) => "backend_decode",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Cancelled => "cancelled",
            ServiceError::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl From<quick_xml::DeError> for ServiceError {
    fn from(err: quick_xml::DeError) -> Self {
        ServiceError::Decode(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "Request failed: {}", self);
        } else {
            tracing::warn!(code = self.code(), "Request rejected: {}", self);
        }

        (
            status,
            Json(serde_json::json!({
                "error": self.to_string(),
                "code": self.code(),
            })),
        )
            .into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
