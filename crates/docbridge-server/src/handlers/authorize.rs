//! Authorization endpoint and upstream completion hook

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use docbridge_auth::crypto::constant_time_eq;
use docbridge_auth::server::BearerTokenValidator;
use docbridge_auth::{AuthError, AuthorizationParams, parse_scope};
use http::header::{AUTHORIZATION, LOCATION};
use http::{HeaderMap, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::no_store;
use crate::error::ApiError;
use crate::state::AppState;

/// Challenge sent when the upstream's completion secret is missing or wrong
const COMPLETION_CHALLENGE: &str = "Bearer realm=\"docbridge-upstream\"";

/// Query string of `GET /authorize`
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeQuery {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub response_type: Option<String>,
    pub resource: Option<String>,
}

/// `GET /authorize` - start an authorization
///
/// Success is a `302` to the upstream identity provider. Every failure is a
/// `400` JSON body; nothing is ever redirected to an unverified URI.
pub async fn authorize_handler(
    State(state): State<AppState>,
    query: Result<Query<AuthorizeQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|_| {
        ApiError::new(AuthError::InvalidRequest("malformed authorization request"))
    })?;

    let client_id = query
        .client_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or(AuthError::InvalidRequest("client_id is required"))
        .map_err(ApiError::new)?;

    let client = state
        .auth
        .registry()
        .resolve_client(client_id)
        .await
        .map_err(ApiError::new)?;

    // RFC 6749 §3.1.2.3: may be omitted when exactly one URI is registered
    let redirect_uri = match query.redirect_uri {
        Some(uri) => uri,
        None => match client.metadata.redirect_uris.as_slice() {
            [only] => only.clone(),
            _ => {
                return Err(ApiError::new(AuthError::InvalidRequest(
                    "redirect_uri is required",
                )));
            }
        },
    };

    let params = AuthorizationParams {
        redirect_uri,
        state: query.state,
        scopes: query.scope.as_deref().map(parse_scope).unwrap_or_default(),
        code_challenge: query.code_challenge,
        code_challenge_method: query.code_challenge_method,
        response_type: query.response_type,
        resource: query.resource,
    };

    let redirect = state
        .auth
        .orchestrator()
        .authorize(&client, params)
        .await
        .map_err(ApiError::new)?;

    debug!(client_id = %client.client_id, "redirecting to upstream identity provider");
    let response = (StatusCode::FOUND, [(LOCATION, redirect.location.to_string())]).into_response();
    Ok(no_store(response))
}

/// Body of `POST /authorize/complete`
#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    /// The code the upstream received as its correlation parameter
    pub code: String,
    /// Authenticated end user
    pub subject: String,
    /// Tenant the end user selected, if any
    pub tenant_endpoint: Option<String>,
}

/// `POST /authorize/complete` - upstream binds an end user to a pending code
///
/// Requires `Authorization: Bearer <completion_secret>`. Only mounted when a
/// secret is configured.
pub async fn complete_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CompletionRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Some(secret) = state.auth.config().upstream.completion_secret() else {
        return Err(ApiError::unauthorized(
            AuthError::InvalidClient("upstream completion is disabled"),
            COMPLETION_CHALLENGE,
        ));
    };

    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| BearerTokenValidator::extract_from_header(v).ok());
    if !presented.is_some_and(|p| constant_time_eq(&p, secret)) {
        warn!("upstream completion with bad credentials");
        return Err(ApiError::unauthorized(
            AuthError::InvalidClient("upstream credentials rejected"),
            COMPLETION_CHALLENGE,
        ));
    }

    let Json(request) = body.map_err(|_| {
        ApiError::new(AuthError::InvalidRequest("malformed completion request"))
    })?;

    state
        .auth
        .complete_authorization(
            &request.code,
            &request.subject,
            request.tenant_endpoint.as_deref(),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
