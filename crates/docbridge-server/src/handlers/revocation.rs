//! Revocation (RFC 7009) and introspection (RFC 7662) endpoints

use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use docbridge_auth::{AuthError, TokenTypeHint};
use http::StatusCode;
use serde::Deserialize;

use super::no_store;
use crate::error::ApiError;
use crate::state::AppState;

/// Form body shared by `/revoke` and `/introspect`
#[derive(Debug, Default, Deserialize)]
pub struct TokenActionRequest {
    pub token: Option<String>,
    pub client_id: Option<String>,
    pub token_type_hint: Option<String>,
}

impl TokenActionRequest {
    fn into_parts(self) -> Result<(String, String, Option<TokenTypeHint>), AuthError> {
        let token = self
            .token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidRequest("token is required"))?;
        let client_id = self
            .client_id
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::InvalidRequest("client_id is required"))?;
        // Unknown hints are ignored (RFC 7009 §2.1)
        let hint = self.token_type_hint.as_deref().and_then(TokenTypeHint::parse);
        Ok((token, client_id, hint))
    }
}

fn parse(form: Result<Form<TokenActionRequest>, FormRejection>) -> Result<TokenActionRequest, ApiError> {
    form.map(|Form(request)| request)
        .map_err(|_| ApiError::new(AuthError::InvalidRequest("malformed request body")))
}

/// `POST /revoke` - answers `200` whether or not the token was known
pub async fn revoke_handler(
    State(state): State<AppState>,
    form: Result<Form<TokenActionRequest>, FormRejection>,
) -> Result<StatusCode, ApiError> {
    let (token, client_id, hint) = parse(form)?.into_parts()?;
    state.auth.revoke(&client_id, &token, hint).await?;
    Ok(StatusCode::OK)
}

/// `POST /introspect` - `{ "active": false }` unless the caller owns a live token
pub async fn introspect_handler(
    State(state): State<AppState>,
    form: Result<Form<TokenActionRequest>, FormRejection>,
) -> Result<Response, ApiError> {
    let (token, client_id, _) = parse(form)?.into_parts()?;
    let introspection = state.auth.introspect(&client_id, &token).await?;
    Ok(no_store(Json(introspection).into_response()))
}
