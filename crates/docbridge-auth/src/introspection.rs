//! Token revocation (RFC 7009) and introspection (RFC 7662).
//!
//! Both operations are scoped to the calling client: a client can only
//! revoke or inspect tokens that were issued to it. Anything else is treated
//! as an unknown token, which RFC 7009 answers with success and RFC 7662
//! with `{"active": false}`.

use chrono::Utc;
use tracing::{debug, info};

use crate::crypto::constant_time_eq;
use crate::error::AuthResult;
use crate::store::SharedStore;
use crate::types::{IntrospectionResponse, IssuedToken, RefreshGrant, RegisteredClient, TokenTypeHint};

/// Revokes and introspects tokens on behalf of their owning client.
#[derive(Debug, Clone)]
pub struct TokenIntrospector {
    access_tokens: SharedStore<IssuedToken>,
    refresh_grants: SharedStore<RefreshGrant>,
}

impl TokenIntrospector {
    /// Introspector over the token stores.
    pub fn new(
        access_tokens: SharedStore<IssuedToken>,
        refresh_grants: SharedStore<RefreshGrant>,
    ) -> Self {
        Self {
            access_tokens,
            refresh_grants,
        }
    }

    /// Revoke `token` if it belongs to `client`.
    ///
    /// Revoking a refresh token also revokes the access token issued with it.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if a store is unavailable. Unknown and foreign tokens
    /// are not errors.
    pub async fn revoke(
        &self,
        client: &RegisteredClient,
        token: &str,
        hint: Option<TokenTypeHint>,
    ) -> AuthResult<()> {
        let revoked = match hint {
            Some(TokenTypeHint::RefreshToken) => {
                self.revoke_refresh(client, token).await? || self.revoke_access(client, token).await?
            }
            _ => {
                self.revoke_access(client, token).await? || self.revoke_refresh(client, token).await?
            }
        };

        if !revoked {
            debug!(client_id = %client.client_id, "revocation for unknown or foreign token ignored");
        }
        Ok(())
    }

    /// Describe `token` to `client`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the token store is unavailable.
    pub async fn introspect(
        &self,
        client: &RegisteredClient,
        token: &str,
    ) -> AuthResult<IntrospectionResponse> {
        let Some(issued) = self.access_tokens.get(token).await? else {
            return Ok(IntrospectionResponse::inactive());
        };

        if !issued.is_valid_at(Utc::now()) || !constant_time_eq(&issued.client_id, &client.client_id)
        {
            return Ok(IntrospectionResponse::inactive());
        }

        Ok(IntrospectionResponse::active(&issued))
    }

    async fn revoke_access(&self, client: &RegisteredClient, token: &str) -> AuthResult<bool> {
        let Some(issued) = self.access_tokens.get(token).await? else {
            return Ok(false);
        };
        if !constant_time_eq(&issued.client_id, &client.client_id) {
            return Ok(false);
        }
        self.access_tokens.remove(token).await?;
        info!(client_id = %client.client_id, "access token revoked");
        Ok(true)
    }

    async fn revoke_refresh(&self, client: &RegisteredClient, token: &str) -> AuthResult<bool> {
        let Some(grant) = self.refresh_grants.get(token).await? else {
            return Ok(false);
        };
        if !constant_time_eq(&grant.client_id, &client.client_id) {
            return Ok(false);
        }
        self.refresh_grants.remove(token).await?;
        self.access_tokens.remove(&grant.access_token).await?;
        info!(client_id = %client.client_id, "refresh token and paired access token revoked");
        Ok(true)
    }
}
