//! Protected session endpoint

use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use docbridge_auth::Principal;
use serde::Serialize;

/// The caller as seen by the protected API
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub client_id: String,
    pub subject: String,
    pub scope: String,
    /// Backend base URL requests are forwarded to
    pub tenant_endpoint: String,
    pub expires_at: DateTime<Utc>,
}

impl From<Principal> for SessionInfo {
    fn from(principal: Principal) -> Self {
        Self {
            scope: principal.scopes.join(" "),
            client_id: principal.client_id,
            subject: principal.subject,
            tenant_endpoint: principal.tenant_endpoint,
            expires_at: principal.expires_at,
        }
    }
}

/// `GET /v1/session` - the principal the bearer layer attached
pub async fn session_handler(Extension(principal): Extension<Principal>) -> Json<SessionInfo> {
    Json(principal.into())
}
