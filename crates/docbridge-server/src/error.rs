//! Server errors and the OAuth JSON error response.

use std::io;

use axum::Json;
use axum::response::{IntoResponse, Response};
use docbridge_auth::{AuthConfigError, AuthError, StoreError};
use http::header::WWW_AUTHENTICATE;
use http::{HeaderValue, StatusCode};
use tracing::error;

use crate::config::ConfigError;

/// Fatal errors that stop the server from starting or running
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The authorization engine rejected its configuration
    #[error("invalid authorization settings: {0}")]
    Auth(#[from] AuthConfigError),

    /// The configured store could not be opened
    #[error("could not open authorization store: {0}")]
    Store(#[from] StoreError),

    /// Listener or socket failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// An [`AuthError`] rendered as `{ error, error_description }`.
#[derive(Debug)]
pub struct ApiError {
    error: AuthError,
    status: StatusCode,
    challenge: Option<String>,
}

impl ApiError {
    /// Response for `error` at the engine's status code
    pub fn new(error: AuthError) -> Self {
        let status = error.status();
        Self {
            error,
            status,
            challenge: None,
        }
    }

    /// `401` for `error`, carrying `challenge` as `WWW-Authenticate`
    pub fn unauthorized(error: AuthError, challenge: impl Into<String>) -> Self {
        Self {
            error,
            status: StatusCode::UNAUTHORIZED,
            challenge: Some(challenge.into()),
        }
    }

    /// Status code this error is answered with
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        Self::new(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.error.is_server_error() {
            error!(error = %self.error, "request failed on the server side");
        }
        let mut response = (self.status, Json(self.error.to_response())).into_response();
        if let Some(challenge) = self.challenge
            && let Ok(value) = HeaderValue::from_str(&challenge)
        {
            response.headers_mut().insert(WWW_AUTHENTICATE, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::new(AuthError::InvalidClient("unknown client_id")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::new(AuthError::Storage(StoreError::Backend("down".into()))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unauthorized_carries_challenge() {
        let response = ApiError::unauthorized(
            AuthError::InvalidClient("upstream credentials rejected"),
            "Bearer realm=\"upstream\"",
        )
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer realm=\"upstream\"");

        let response = ApiError::new(AuthError::InvalidGrant("expired")).into_response();
        assert!(!response.headers().contains_key(WWW_AUTHENTICATE));
    }
}
