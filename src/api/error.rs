//! Error types for the repository management API

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::manager::ManagerError;

/// Errors surfaced by the HTTP layer
#[derive(Error, Debug)]
pub enum ApiError {
    /// Uniform answer for anything that does not resolve to a resource
    #[error("not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Error response body
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Success message response body
#[derive(Debug, Deserialize, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Manager(err) => match err {
                ManagerError::InvalidName { .. }
                | ManagerError::ReservedName(_)
                | ManagerError::TagNameEmpty
                | ManagerError::InvalidTagName(_) => StatusCode::BAD_REQUEST,
                ManagerError::NotFound { .. } | ManagerError::NotAGroup(_) => StatusCode::NOT_FOUND,
                ManagerError::AlreadyExists { .. } | ManagerError::NotEmpty { .. } | ManagerError::Conflict(_) => {
                    StatusCode::CONFLICT
                }
                ManagerError::Git { .. } | ManagerError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
