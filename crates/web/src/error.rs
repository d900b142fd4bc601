//! Handler error type

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Failures a handler cannot turn into a redisplayed form
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(taxi_common::Error),
}

impl From<taxi_common::Error> for AppError {
    fn from(e: taxi_common::Error) -> Self {
        match e {
            taxi_common::Error::NotFound { kind, id } => {
                AppError::NotFound(format!("No {} found matching id {}", kind, id))
            }
            other => AppError::Store(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            AppError::Store(e) => {
                error!("Request failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
