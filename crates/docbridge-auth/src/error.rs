//! OAuth error taxonomy.
//!
//! Every failure the engine reports maps onto one of the registered OAuth
//! 2.0 error codes (RFC 6749 §5.2, RFC 6750 §3.1, RFC 7591 §3.2.2, RFC 8707)
//! so that the HTTP surface can serialize it without further translation.
//! Descriptions are static strings and never include token, code or store
//! contents.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

/// Result alias used throughout the engine.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors produced by the authorization engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// Unknown client or failed client identification
    #[error("invalid_client: {0}")]
    InvalidClient(&'static str),

    /// Code or refresh token is unknown, expired, redeemed, or bound elsewhere
    #[error("invalid_grant: {0}")]
    InvalidGrant(&'static str),

    /// Malformed or incomplete request
    #[error("invalid_request: {0}")]
    InvalidRequest(&'static str),

    /// Requested scope is unknown or exceeds the grant
    #[error("invalid_scope: {0}")]
    InvalidScope(&'static str),

    /// Bearer token is absent, unknown, expired, or revoked
    #[error("invalid_token: {0}")]
    InvalidToken(&'static str),

    /// Grant type other than `authorization_code` / `refresh_token`
    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(&'static str),

    /// Response type other than `code`
    #[error("unsupported_response_type: {0}")]
    UnsupportedResponseType(&'static str),

    /// Requested `resource` is not a configured tenant endpoint
    #[error("invalid_target: {0}")]
    InvalidTarget(&'static str),

    /// Registration metadata rejected
    #[error("invalid_client_metadata: {0}")]
    InvalidClientMetadata(&'static str),

    /// Registration redirect URI rejected
    #[error("invalid_redirect_uri: {0}")]
    InvalidRedirectUri(&'static str),

    /// The backing store failed; surfaced as `server_error`
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl AuthError {
    /// The OAuth `error` code for this failure.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidScope(_) => "invalid_scope",
            Self::InvalidToken(_) => "invalid_token",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::InvalidTarget(_) => "invalid_target",
            Self::InvalidClientMetadata(_) => "invalid_client_metadata",
            Self::InvalidRedirectUri(_) => "invalid_redirect_uri",
            Self::Storage(_) => "server_error",
        }
    }

    /// Human-readable description safe to return to the caller.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidClient(d)
            | Self::InvalidGrant(d)
            | Self::InvalidRequest(d)
            | Self::InvalidScope(d)
            | Self::InvalidToken(d)
            | Self::UnsupportedGrantType(d)
            | Self::UnsupportedResponseType(d)
            | Self::InvalidTarget(d)
            | Self::InvalidClientMetadata(d)
            | Self::InvalidRedirectUri(d) => d,
            Self::Storage(_) => "the authorization server could not complete the request",
        }
    }

    /// HTTP status this error is reported with.
    ///
    /// Only `invalid_token` maps to `401`; it is the one code that always
    /// travels with a bearer challenge. Clients are public, so an unknown
    /// `client_id` is a bad request rather than failed authentication.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Whether the failure is on the server side rather than the caller's.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Serializable `{error, error_description}` body.
    pub fn to_response(&self) -> OAuthErrorResponse {
        OAuthErrorResponse {
            error: self.error_code().to_string(),
            error_description: Some(self.description().to_string()),
        }
    }
}

/// OAuth error response body (RFC 6749 §5.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    /// Error code
    pub error: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}
