//! Dynamic client registration endpoint

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use docbridge_auth::{AuthError, ClientMetadata, RegisteredClient};
use http::StatusCode;

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /register` - register a public client
///
/// Answers `201` with the issued `client_id` and the accepted metadata.
pub async fn register_handler(
    State(state): State<AppState>,
    body: Result<Json<ClientMetadata>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisteredClient>), ApiError> {
    let Json(metadata) = body.map_err(|_| {
        ApiError::new(AuthError::InvalidClientMetadata(
            "registration body must be a JSON client metadata document",
        ))
    })?;

    let client = state
        .auth
        .register_client(metadata)
        .await
        .map_err(ApiError::new)?;
    Ok((StatusCode::CREATED, Json(client)))
}
