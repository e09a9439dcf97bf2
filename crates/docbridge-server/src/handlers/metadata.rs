//! Discovery endpoints
//!
//! - `/.well-known/oauth-protected-resource` (RFC 9728)
//! - `/.well-known/oauth-authorization-server` (RFC 8414)

use axum::Json;
use axum::extract::State;
use docbridge_auth::server::{ProtectedResourceMetadataBuilder, authorization_server_metadata};
use serde_json::Value;

use crate::state::AppState;

/// Protected Resource Metadata for the `/v1` API
pub async fn protected_resource_metadata_handler(State(state): State<AppState>) -> Json<Value> {
    let oauth = &state.auth.config().oauth;
    Json(
        ProtectedResourceMetadataBuilder::new(state.resource(), state.issuer())
            .with_scopes(oauth.scopes_supported.clone())
            .with_resource_name("docbridge")
            .build(),
    )
}

/// Authorization Server Metadata for this issuer
pub async fn authorization_server_metadata_handler(State(state): State<AppState>) -> Json<Value> {
    Json(authorization_server_metadata(
        state.issuer(),
        &state.auth.config().oauth,
    ))
}
