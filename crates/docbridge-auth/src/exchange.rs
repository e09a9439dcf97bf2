//! Token exchange engine: authorization-code redemption and refresh rotation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::OAuthConfig;
use crate::crypto::{constant_time_eq, generate_access_token, generate_refresh_token, verify_pkce};
use crate::error::{AuthError, AuthResult};
use crate::store::{SharedStore, StoreError};
use crate::types::{
    CodeChallengeMethod, GrantType, IssuedToken, PendingAuthorization, RefreshGrant,
    RegisteredClient, TokenPair, expiry_after,
};

/// Token allocation attempts before giving up.
const MAX_MINT_ATTEMPTS: usize = 4;

const INVALID_CODE: &str = "authorization code is invalid, expired, or already used";
const INVALID_REFRESH: &str = "refresh token is invalid, expired, or already used";

/// Everything a freshly minted token pair is bound to.
struct Grant {
    client_id: String,
    access_scopes: Vec<String>,
    refresh_scopes: Vec<String>,
    subject: String,
    tenant_endpoint: String,
    with_refresh: bool,
}

/// Redeems codes and refresh tokens for token pairs.
#[derive(Debug, Clone)]
pub struct TokenExchangeEngine {
    pending: SharedStore<PendingAuthorization>,
    access_tokens: SharedStore<IssuedToken>,
    refresh_grants: SharedStore<RefreshGrant>,
    config: Arc<OAuthConfig>,
}

impl TokenExchangeEngine {
    /// Create an engine over the given stores.
    pub fn new(
        pending: SharedStore<PendingAuthorization>,
        access_tokens: SharedStore<IssuedToken>,
        refresh_grants: SharedStore<RefreshGrant>,
        config: Arc<OAuthConfig>,
    ) -> Self {
        Self {
            pending,
            access_tokens,
            refresh_grants,
            config,
        }
    }

    /// Redeem an authorization code.
    ///
    /// The pending authorization is taken out of the store before anything is
    /// checked, so a code is consumed by its first redemption attempt whether
    /// or not that attempt succeeds.
    ///
    /// # Errors
    ///
    /// Returns `invalid_grant` if the code is unknown, expired, already used,
    /// issued to another client, bound to another redirect URI, fails PKCE, or
    /// was never completed upstream while that is required. Returns `Storage`
    /// if a store is unavailable.
    pub async fn exchange_authorization_code(
        &self,
        client: &RegisteredClient,
        code: &str,
        code_verifier: Option<&str>,
        redirect_uri: Option<&str>,
    ) -> AuthResult<TokenPair> {
        let Some(pending) = self.pending.take(code).await? else {
            warn!(client_id = %client.client_id, "code redemption rejected: unknown or redeemed code");
            return Err(AuthError::InvalidGrant(INVALID_CODE));
        };

        let now = Utc::now();
        if pending.is_expired_at(now) {
            warn!(client_id = %client.client_id, "code redemption rejected: code expired");
            return Err(AuthError::InvalidGrant(INVALID_CODE));
        }

        if !constant_time_eq(&pending.client_id, &client.client_id) {
            warn!(client_id = %client.client_id, "code redemption rejected: code issued to another client");
            return Err(AuthError::InvalidGrant(
                "authorization code was issued to another client",
            ));
        }

        if redirect_uri.is_some_and(|uri| uri != pending.redirect_uri) {
            warn!(client_id = %client.client_id, "code redemption rejected: redirect_uri mismatch");
            return Err(AuthError::InvalidGrant(
                "redirect_uri does not match the authorization request",
            ));
        }

        if let Err(err) = check_code_verifier(&pending, code_verifier) {
            warn!(client_id = %client.client_id, "code redemption rejected: PKCE verification failed");
            return Err(err);
        }

        let subject = match pending.subject {
            Some(subject) => subject,
            None if self.config.require_upstream_subject => {
                warn!(client_id = %client.client_id, "code redemption rejected: upstream never completed");
                return Err(AuthError::InvalidGrant(
                    "authorization has not been completed by the identity provider",
                ));
            }
            None => pending.client_id.clone(),
        };

        let pair = self
            .issue(
                Grant {
                    client_id: client.client_id.clone(),
                    access_scopes: pending.requested_scopes.clone(),
                    refresh_scopes: pending.requested_scopes,
                    subject,
                    tenant_endpoint: pending.tenant_endpoint,
                    with_refresh: client.allows_grant(GrantType::RefreshToken),
                },
                now,
            )
            .await?;

        info!(
            client_id = %client.client_id,
            scope = %pair.scope,
            expires_in = pair.expires_in,
            "authorization code redeemed"
        );
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, rotating the refresh token.
    ///
    /// `requested_scopes` may narrow the scope of the new access token; the new
    /// refresh token keeps the original grant.
    ///
    /// # Errors
    ///
    /// Returns `invalid_grant` if the refresh token is unknown, expired, used,
    /// or owned by another client, `invalid_scope` if the request widens the
    /// grant, and `Storage` if a store is unavailable.
    pub async fn exchange_refresh_token(
        &self,
        client: &RegisteredClient,
        refresh_token: &str,
        requested_scopes: Option<&[String]>,
    ) -> AuthResult<TokenPair> {
        if !client.allows_grant(GrantType::RefreshToken) {
            return Err(AuthError::InvalidGrant(
                "client is not registered for the refresh_token grant",
            ));
        }

        let Some(grant) = self.refresh_grants.get(refresh_token).await? else {
            warn!(client_id = %client.client_id, "refresh rejected: unknown refresh token");
            return Err(AuthError::InvalidGrant(INVALID_REFRESH));
        };

        let now = Utc::now();
        if !grant.is_valid_at(now) {
            self.refresh_grants.remove(refresh_token).await?;
            warn!(client_id = %client.client_id, "refresh rejected: refresh token expired");
            return Err(AuthError::InvalidGrant(INVALID_REFRESH));
        }

        if !constant_time_eq(&grant.client_id, &client.client_id) {
            warn!(client_id = %client.client_id, "refresh rejected: token issued to another client");
            return Err(AuthError::InvalidGrant(INVALID_REFRESH));
        }

        let access_scopes = match requested_scopes {
            None | Some([]) => grant.scopes.clone(),
            Some(requested) => {
                if requested.iter().any(|s| !grant.scopes.contains(s)) {
                    return Err(AuthError::InvalidScope(
                        "requested scope exceeds the original grant",
                    ));
                }
                requested.to_vec()
            }
        };

        // Single use: of concurrent refreshes only the one that takes the record proceeds.
        let Some(grant) = self.refresh_grants.take(refresh_token).await? else {
            warn!(client_id = %client.client_id, "refresh rejected: refresh token already used");
            return Err(AuthError::InvalidGrant(INVALID_REFRESH));
        };

        let pair = self
            .issue(
                Grant {
                    client_id: grant.client_id,
                    access_scopes,
                    refresh_scopes: grant.scopes,
                    subject: grant.subject,
                    tenant_endpoint: grant.tenant_endpoint,
                    with_refresh: true,
                },
                now,
            )
            .await?;

        info!(
            client_id = %client.client_id,
            scope = %pair.scope,
            "refresh token rotated"
        );
        Ok(pair)
    }

    async fn issue(&self, grant: Grant, now: DateTime<Utc>) -> AuthResult<TokenPair> {
        let access_expires_at = expiry_after(now, self.config.access_token_ttl);
        let refresh_expires_at = expiry_after(now, self.config.refresh_token_ttl);

        for _ in 0..MAX_MINT_ATTEMPTS {
            let access_token = generate_access_token();
            let refresh_token = grant.with_refresh.then(generate_refresh_token);

            let issued = IssuedToken {
                access_token: access_token.clone(),
                refresh_token: refresh_token.clone(),
                client_id: grant.client_id.clone(),
                scopes: grant.access_scopes.clone(),
                subject: grant.subject.clone(),
                tenant_endpoint: grant.tenant_endpoint.clone(),
                issued_at: now,
                expires_at: access_expires_at,
            };
            if !self.access_tokens.insert_if_absent(&access_token, &issued).await? {
                continue;
            }

            if let Some(refresh_token) = &refresh_token {
                let refresh = RefreshGrant {
                    refresh_token: refresh_token.clone(),
                    access_token: access_token.clone(),
                    client_id: grant.client_id.clone(),
                    scopes: grant.refresh_scopes.clone(),
                    subject: grant.subject.clone(),
                    tenant_endpoint: grant.tenant_endpoint.clone(),
                    issued_at: now,
                    expires_at: refresh_expires_at,
                };
                if !self.refresh_grants.insert_if_absent(refresh_token, &refresh).await? {
                    self.access_tokens.remove(&access_token).await?;
                    continue;
                }
            }

            return Ok(TokenPair::bearer(access_token, self.config.access_token_ttl)
                .with_refresh_token(refresh_token)
                .with_scopes(&grant.access_scopes));
        }

        Err(StoreError::KeyExhausted("access_tokens").into())
    }
}

fn check_code_verifier(pending: &PendingAuthorization, code_verifier: Option<&str>) -> AuthResult<()> {
    match (pending.code_challenge.as_deref(), code_verifier) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(AuthError::InvalidGrant(
            "code_verifier was sent but no code_challenge was registered",
        )),
        (Some(_), None) => Err(AuthError::InvalidGrant("code_verifier is required")),
        (Some(challenge), Some(verifier)) => {
            let method = pending.code_challenge_method.unwrap_or(CodeChallengeMethod::Plain);
            if verify_pkce(verifier, challenge, method) {
                Ok(())
            } else {
                Err(AuthError::InvalidGrant("code_verifier does not match code_challenge"))
            }
        }
    }
}
