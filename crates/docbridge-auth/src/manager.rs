//! The assembled authorization server.
//!
//! [`AuthorizationServer`] wires the registry, orchestrator, exchange engine,
//! verifier and introspector onto one set of [`Stores`] and exposes the
//! operations transport layers need, addressed by `client_id`.

use std::sync::Arc;

use tracing::debug;

use crate::authorize::AuthorizationOrchestrator;
use crate::config::{AuthConfigError, AuthServerConfig};
use crate::error::AuthResult;
use crate::exchange::TokenExchangeEngine;
use crate::introspection::TokenIntrospector;
use crate::registry::ClientRegistry;
use crate::store::Stores;
use crate::types::{
    AuthorizationParams, AuthorizationRedirect, ClientMetadata, IntrospectionResponse, Principal,
    RegisteredClient, TokenPair, TokenTypeHint,
};
use crate::verifier::TokenVerifier;

/// Authorization-code engine over shared stores.
#[derive(Debug, Clone)]
pub struct AuthorizationServer {
    config: Arc<AuthServerConfig>,
    stores: Stores,
    registry: ClientRegistry,
    orchestrator: AuthorizationOrchestrator,
    exchange: TokenExchangeEngine,
    verifier: TokenVerifier,
    introspector: TokenIntrospector,
}

impl AuthorizationServer {
    /// Assemble a server on `stores`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthConfigError`] if `config` does not validate.
    pub fn new(config: AuthServerConfig, stores: Stores) -> Result<Self, AuthConfigError> {
        config.validate()?;
        let config = Arc::new(config);
        let oauth = Arc::new(config.oauth.clone());

        let server = Self {
            registry: ClientRegistry::new(stores.clients.clone()),
            orchestrator: AuthorizationOrchestrator::new(stores.pending.clone(), Arc::clone(&config))?,
            exchange: TokenExchangeEngine::new(
                stores.pending.clone(),
                stores.access_tokens.clone(),
                stores.refresh_grants.clone(),
                oauth,
            ),
            verifier: TokenVerifier::new(stores.access_tokens.clone()),
            introspector: TokenIntrospector::new(
                stores.access_tokens.clone(),
                stores.refresh_grants.clone(),
            ),
            config,
            stores,
        };
        debug!(
            code_ttl = server.config.oauth.effective_code_ttl(),
            access_ttl = server.config.oauth.access_token_ttl,
            require_pkce = server.config.oauth.require_pkce,
            "authorization server assembled"
        );
        Ok(server)
    }

    /// Assemble a server on fresh in-memory stores.
    ///
    /// # Errors
    ///
    /// Returns [`AuthConfigError`] if `config` does not validate.
    pub fn in_memory(config: AuthServerConfig) -> Result<Self, AuthConfigError> {
        Self::new(config, Stores::in_memory())
    }

    /// Active configuration.
    pub fn config(&self) -> &AuthServerConfig {
        &self.config
    }

    /// Underlying stores.
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Client registry.
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Authorization orchestrator.
    pub fn orchestrator(&self) -> &AuthorizationOrchestrator {
        &self.orchestrator
    }

    /// Token exchange engine.
    pub fn exchange(&self) -> &TokenExchangeEngine {
        &self.exchange
    }

    /// Token verifier.
    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Revocation and introspection.
    pub fn introspector(&self) -> &TokenIntrospector {
        &self.introspector
    }

    /// Register a client. See [`ClientRegistry::register_client`].
    ///
    /// # Errors
    ///
    /// Propagates registry errors.
    pub async fn register_client(&self, metadata: ClientMetadata) -> AuthResult<RegisteredClient> {
        self.registry.register_client(metadata).await
    }

    /// Start an authorization for `client_id`.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` for unknown clients, otherwise see
    /// [`AuthorizationOrchestrator::authorize`].
    pub async fn authorize(
        &self,
        client_id: &str,
        params: AuthorizationParams,
    ) -> AuthResult<AuthorizationRedirect> {
        let client = self.registry.resolve_client(client_id).await?;
        self.orchestrator.authorize(&client, params).await
    }

    /// Upstream completion. See [`AuthorizationOrchestrator::complete_authorization`].
    ///
    /// # Errors
    ///
    /// Propagates orchestrator errors.
    pub async fn complete_authorization(
        &self,
        code: &str,
        subject: &str,
        tenant_endpoint: Option<&str>,
    ) -> AuthResult<()> {
        self.orchestrator
            .complete_authorization(code, subject, tenant_endpoint)
            .await
    }

    /// Redeem a code on behalf of `client_id`.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` for unknown clients, otherwise see
    /// [`TokenExchangeEngine::exchange_authorization_code`].
    pub async fn exchange_authorization_code(
        &self,
        client_id: &str,
        code: &str,
        code_verifier: Option<&str>,
        redirect_uri: Option<&str>,
    ) -> AuthResult<TokenPair> {
        let client = self.registry.resolve_client(client_id).await?;
        self.exchange
            .exchange_authorization_code(&client, code, code_verifier, redirect_uri)
            .await
    }

    /// Rotate a refresh token on behalf of `client_id`.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` for unknown clients, otherwise see
    /// [`TokenExchangeEngine::exchange_refresh_token`].
    pub async fn exchange_refresh_token(
        &self,
        client_id: &str,
        refresh_token: &str,
        requested_scopes: Option<&[String]>,
    ) -> AuthResult<TokenPair> {
        let client = self.registry.resolve_client(client_id).await?;
        self.exchange
            .exchange_refresh_token(&client, refresh_token, requested_scopes)
            .await
    }

    /// Verify an access token. See [`TokenVerifier::verify_access_token`].
    ///
    /// # Errors
    ///
    /// Propagates verifier errors.
    pub async fn verify_access_token(&self, token: &str) -> AuthResult<Principal> {
        self.verifier.verify_access_token(token).await
    }

    /// Revoke a token on behalf of `client_id`.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` for unknown clients and `Storage` on store failure.
    pub async fn revoke(
        &self,
        client_id: &str,
        token: &str,
        hint: Option<TokenTypeHint>,
    ) -> AuthResult<()> {
        let client = self.registry.resolve_client(client_id).await?;
        self.introspector.revoke(&client, token, hint).await
    }

    /// Introspect a token on behalf of `client_id`.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` for unknown clients and `Storage` on store failure.
    pub async fn introspect(&self, client_id: &str, token: &str) -> AuthResult<IntrospectionResponse> {
        let client = self.registry.resolve_client(client_id).await?;
        self.introspector.introspect(&client, token).await
    }
}
