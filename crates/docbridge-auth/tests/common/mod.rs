//! Common test utilities for integration tests
//!
//! Shared setup for driving the authorization server through complete
//! register / authorize / redeem flows.

#![allow(dead_code)]

use std::sync::Arc;

use docbridge_auth::crypto::code_challenge_s256;
use docbridge_auth::{
    AuthServerConfig, AuthorizationParams, AuthorizationServer, ClientMetadata,
    CodeChallengeMethod, RegisteredClient, Stores, TokenPair,
};

pub const REDIRECT_URI: &str = "https://app.example.com/callback";
pub const VERIFIER: &str = "verifier1";

/// Config with a fixed scope vocabulary
pub fn config() -> AuthServerConfig {
    let mut config = AuthServerConfig::default();
    config.oauth.scopes_supported = vec!["docs:read".into(), "docs:write".into()];
    config.oauth.default_scopes = vec!["docs:read".into()];
    config
}

/// In-memory server with the test config
pub fn server() -> AuthorizationServer {
    AuthorizationServer::in_memory(config()).expect("valid test config")
}

/// Server on the given stores with the test config
pub fn server_on(stores: Stores) -> AuthorizationServer {
    AuthorizationServer::new(config(), stores).expect("valid test config")
}

/// Register a public client redirecting to [`REDIRECT_URI`]
pub async fn register(server: &AuthorizationServer) -> RegisteredClient {
    server
        .register_client(ClientMetadata::new([REDIRECT_URI]).with_client_name("test client"))
        .await
        .expect("registration succeeds")
}

/// Authorize with an S256 challenge of [`VERIFIER`] and return the code
pub async fn authorize(server: &AuthorizationServer, client: &RegisteredClient, scope: &str) -> String {
    server
        .authorize(
            &client.client_id,
            AuthorizationParams::new(REDIRECT_URI)
                .with_state("state-123")
                .with_scope(scope)
                .with_code_challenge(code_challenge_s256(VERIFIER), CodeChallengeMethod::S256),
        )
        .await
        .expect("authorization succeeds")
        .code
}

/// Full flow up to a token pair
pub async fn tokens(server: &AuthorizationServer, client: &RegisteredClient, scope: &str) -> TokenPair {
    let code = authorize(server, client, scope).await;
    server
        .exchange_authorization_code(&client.client_id, &code, Some(VERIFIER), Some(REDIRECT_URI))
        .await
        .expect("redemption succeeds")
}

/// Race upstream completion against redemption of the same code `rounds`
/// times. Redemption must always succeed, and the token carries the upstream
/// subject exactly when completion won.
pub async fn race_completion_and_exchange(server: Arc<AuthorizationServer>, rounds: usize) {
    let client = register(&server).await;
    for _ in 0..rounds {
        let code = authorize(&server, &client, "docs:read").await;

        let completion = {
            let server = Arc::clone(&server);
            let code = code.clone();
            tokio::spawn(async move { server.complete_authorization(&code, "user-42", None).await })
        };
        let exchange = {
            let server = Arc::clone(&server);
            let client_id = client.client_id.clone();
            tokio::spawn(async move {
                server
                    .exchange_authorization_code(&client_id, &code, Some(VERIFIER), None)
                    .await
            })
        };

        let completed = match completion.await.unwrap() {
            Ok(()) => true,
            Err(err) => {
                assert_eq!(err.error_code(), "invalid_grant");
                false
            }
        };
        let pair = exchange.await.unwrap().expect("a live code always redeems");

        let principal = server.verify_access_token(&pair.access_token).await.unwrap();
        let expected = if completed { "user-42" } else { client.client_id.as_str() };
        assert_eq!(principal.subject, expected);
    }
}
