use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use diesel::result::Error as DieselError;
use serde::Serialize;
use thiserror::Error;

use crate::usecases::{class_generation::ClassGenerationError, class_payments::ClassPaymentError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorDetails {
    /// Walks the cause chain for a diesel database error so operators see its kind.
    pub fn from_source(source: &anyhow::Error) -> Self {
        let code = source
            .chain()
            .find_map(|cause| cause.downcast_ref::<DieselError>())
            .and_then(|err| match err {
                DieselError::DatabaseError(kind, _) => Some(format!("{kind:?}")),
                _ => None,
            });

        Self {
            message: format!("{source:#}"),
            code,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{error}")]
    Internal {
        error: String,
        #[source]
        source: anyhow::Error,
    },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Unauthorized(error) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    success: false,
                    error,
                    details: None,
                },
            ),
            AppError::BadRequest(error) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    success: false,
                    error,
                    details: None,
                },
            ),
            AppError::Internal { error, source } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    success: false,
                    error,
                    details: Some(ErrorDetails::from_source(&source)),
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ClassPaymentError> for AppError {
    fn from(err: ClassPaymentError) -> Self {
        let status = err.status_code();
        let error = err.to_string();
        match err {
            ClassPaymentError::Provider(source) | ClassPaymentError::Persistence(source) => {
                AppError::Internal { error, source }
            }
            _ if status == StatusCode::UNAUTHORIZED => AppError::Unauthorized(error),
            _ => AppError::BadRequest(error),
        }
    }
}

impl From<ClassGenerationError> for AppError {
    fn from(err: ClassGenerationError) -> Self {
        match err {
            ClassGenerationError::InvalidRequest(reason) => {
                AppError::BadRequest(format!("invalid bulk class request: {reason}"))
            }
            ClassGenerationError::Internal(source) => AppError::Internal {
                error: "failed to create classes".to_string(),
                source,
            },
        }
    }
}
