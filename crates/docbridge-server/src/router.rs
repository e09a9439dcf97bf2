//! Router assembly and the serve loop

use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use docbridge_auth::server::{AUTHORIZATION_SERVER_METADATA_PATH, PROTECTED_RESOURCE_METADATA_PATH};
use docbridge_auth::tower::{BearerAuthConfig, BearerAuthLayer};
use docbridge_auth::{AuthorizationServer, Stores, spawn_sweeper};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handlers::{
    authorization_server_metadata_handler, authorize_handler, complete_handler, health_handler,
    introspect_handler, protected_resource_metadata_handler, register_handler, revoke_handler,
    session_handler, token_handler,
};
use crate::state::AppState;

/// Build the application router
///
/// `/v1/...` routes sit behind the bearer layer; everything else is public.
/// `/authorize/complete` is only mounted when a completion secret is set.
pub fn router(state: AppState) -> Router {
    let bearer = BearerAuthLayer::new(
        state.auth.verifier().clone(),
        BearerAuthConfig::new(state.resource_metadata_url()),
    );

    let protected = Router::new()
        .route("/session", get(session_handler))
        .route_layer(bearer);

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/register", post(register_handler))
        .route("/authorize", get(authorize_handler))
        .route("/token", post(token_handler))
        .route("/revoke", post(revoke_handler))
        .route("/introspect", post(introspect_handler))
        .route(
            PROTECTED_RESOURCE_METADATA_PATH,
            get(protected_resource_metadata_handler),
        )
        .route(
            AUTHORIZATION_SERVER_METADATA_PATH,
            get(authorization_server_metadata_handler),
        )
        .nest("/v1", protected);

    if state.auth.config().upstream.completion_secret().is_some() {
        router = router.route("/authorize/complete", post(complete_handler));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Open the configured stores and assemble the application state
///
/// # Errors
///
/// Returns [`ServerError`] if the store cannot be opened or the
/// authorization settings do not validate.
pub fn build_state(config: &ServerConfig) -> Result<(AppState, Stores), ServerError> {
    let stores = Stores::open(&config.storage)?;
    let auth = AuthorizationServer::new(config.auth_config(), stores.clone())?;
    Ok((AppState::new(auth, config.public_url()), stores))
}

/// Run the server until `shutdown` is cancelled
///
/// In-flight requests are drained before returning; the expiry sweeper is
/// stopped with the server.
///
/// # Errors
///
/// Returns [`ServerError`] if startup fails or the listener errors.
pub async fn serve(config: ServerConfig, shutdown: CancellationToken) -> Result<(), ServerError> {
    let addr = config.socket_addr()?;
    let (state, stores) = build_state(&config)?;

    let sweeper = match config.storage.sweep_interval {
        0 => None,
        secs => Some(spawn_sweeper(
            stores,
            Duration::from_secs(secs),
            shutdown.child_token(),
        )),
    };

    let listener = TcpListener::bind(addr).await?;
    info!(
        %addr,
        public_url = %state.public_url,
        backend = ?config.storage.backend,
        "docbridge listening"
    );

    let signal = shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .await?;

    shutdown.cancel();
    if let Some(sweeper) = sweeper {
        join_sweeper(sweeper).await;
    }
    info!("docbridge stopped");
    Ok(())
}

/// Wait for the sweeper to stop. Returns `false` if it panicked or was aborted.
async fn join_sweeper(sweeper: JoinHandle<()>) -> bool {
    match sweeper.await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "expiry sweeper did not stop cleanly");
            false
        }
    }
}
