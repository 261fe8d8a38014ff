//! Error responses for the REST API

use crate::error::{ErrorKind, MortalityError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Core(#[from] MortalityError),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Core(e) => match e.kind() {
                ErrorKind::Validation | ErrorKind::UnknownCategory | ErrorKind::UnsupportedModelFamily => {
                    StatusCode::BAD_REQUEST
                }
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::ActivationConflict => StatusCode::CONFLICT,
                ErrorKind::Training
                | ErrorKind::Storage
                | ErrorKind::Cancelled
                | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServerError::Internal(err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(detail = %self, "Internal server error");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (MortalityError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (MortalityError::UnsupportedModelFamily("svm".into()), StatusCode::BAD_REQUEST),
            (MortalityError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (MortalityError::ActivationConflict("x".into()), StatusCode::CONFLICT),
            (MortalityError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ServerError::from(err).status(), expected);
        }
    }
}
