//! Token endpoint

use axum::Form;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::response::{IntoResponse, Response};
use docbridge_auth::{AuthError, AuthResult, GrantType, TokenPair, parse_scope};
use serde::Deserialize;
use tracing::debug;

use super::no_store;
use crate::error::ApiError;
use crate::state::AppState;

/// Form body of `POST /token`
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

/// `POST /token` - redeem a code or rotate a refresh token
///
/// Both outcomes carry `Cache-Control: no-store`.
pub async fn token_handler(
    State(state): State<AppState>,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let result = match form {
        Ok(Form(request)) => exchange(&state, request).await,
        Err(_) => Err(AuthError::InvalidRequest("malformed token request")),
    };

    let response = match result {
        Ok(pair) => Json(pair).into_response(),
        Err(err) => {
            debug!(error = err.error_code(), "token request rejected");
            ApiError::new(err).into_response()
        }
    };
    no_store(response)
}

async fn exchange(state: &AppState, request: TokenRequest) -> AuthResult<TokenPair> {
    let grant_type: GrantType = required(request.grant_type.as_deref(), "grant_type is required")?
        .parse()?;
    let client_id = required(request.client_id.as_deref(), "client_id is required")?;

    match grant_type {
        GrantType::AuthorizationCode => {
            let code = required(request.code.as_deref(), "code is required")?;
            state
                .auth
                .exchange_authorization_code(
                    client_id,
                    code,
                    request.code_verifier.as_deref(),
                    request.redirect_uri.as_deref(),
                )
                .await
        }
        GrantType::RefreshToken => {
            let refresh_token =
                required(request.refresh_token.as_deref(), "refresh_token is required")?;
            let scopes = request.scope.as_deref().map(parse_scope);
            state
                .auth
                .exchange_refresh_token(client_id, refresh_token, scopes.as_deref())
                .await
        }
    }
}

fn required<'a>(value: Option<&'a str>, missing: &'static str) -> AuthResult<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::InvalidRequest(missing))
}
