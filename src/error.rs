use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::{auth::identity::IdentityError, meals::TrackerError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Identity(e) => match e {
                IdentityError::InvalidEmail | IdentityError::WeakPassword => StatusCode::BAD_REQUEST,
                IdentityError::EmailInUse => StatusCode::CONFLICT,
                IdentityError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                IdentityError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            AppError::Tracker(e) => match e {
                TrackerError::NotLoaded | TrackerError::LedgerFull => StatusCode::CONFLICT,
                TrackerError::UnknownMeal(_) => StatusCode::NOT_FOUND,
            },
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}
