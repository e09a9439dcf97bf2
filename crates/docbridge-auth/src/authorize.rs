//! Authorization orchestrator: the `/authorize` step.
//!
//! Validates the client's request, mints a single-use code, records the
//! pending authorization and sends the user agent to the upstream identity
//! provider with the code attached. No token is issued here.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use url::Url;

use crate::config::{AuthConfigError, AuthServerConfig};
use crate::crypto::generate_authorization_code;
use crate::error::{AuthError, AuthResult};
use crate::store::{SharedStore, StoreError, Update};
use crate::types::{
    AuthorizationParams, AuthorizationRedirect, CodeChallengeMethod, PendingAuthorization,
    RegisteredClient, expiry_after,
};

/// Code allocation attempts before giving up.
const MAX_MINT_ATTEMPTS: usize = 4;

/// Runs the authorization step and the upstream completion hook.
#[derive(Debug, Clone)]
pub struct AuthorizationOrchestrator {
    pending: SharedStore<PendingAuthorization>,
    config: Arc<AuthServerConfig>,
    upstream_url: Url,
}

impl AuthorizationOrchestrator {
    /// Create an orchestrator recording pending authorizations in `pending`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthConfigError`] if the upstream authorization endpoint is invalid.
    pub fn new(
        pending: SharedStore<PendingAuthorization>,
        config: Arc<AuthServerConfig>,
    ) -> Result<Self, AuthConfigError> {
        let upstream_url = config.upstream.authorization_url()?;
        Ok(Self {
            pending,
            config,
            upstream_url,
        })
    }

    /// Start an authorization for `client`.
    ///
    /// # Errors
    ///
    /// - `invalid_request` for an unregistered redirect URI or malformed PKCE parameters
    /// - `unsupported_response_type` for anything but `code`
    /// - `invalid_scope` for scopes outside the supported or registered set
    /// - `invalid_target` for an unknown `resource`
    /// - `Storage` if the pending authorization cannot be recorded
    pub async fn authorize(
        &self,
        client: &RegisteredClient,
        params: AuthorizationParams,
    ) -> AuthResult<AuthorizationRedirect> {
        if !client.is_redirect_uri_registered(&params.redirect_uri) {
            warn!(client_id = %client.client_id, "authorization rejected: unregistered redirect_uri");
            return Err(AuthError::InvalidRequest(
                "redirect_uri does not match a registered redirect URI",
            ));
        }

        if params.response_type.as_deref().is_some_and(|rt| rt != "code") {
            return Err(AuthError::UnsupportedResponseType(
                "only response_type=code is supported",
            ));
        }

        let method = self.challenge_method(&params)?;
        let scopes = self.resolve_scopes(client, &params.scopes)?;
        let tenant_endpoint = self.config.tenants.resolve(params.resource.as_deref())?;

        let now = Utc::now();
        let expires_at = expiry_after(now, self.config.oauth.effective_code_ttl());

        for _ in 0..MAX_MINT_ATTEMPTS {
            let code = generate_authorization_code();
            let pending = PendingAuthorization {
                code: code.clone(),
                client_id: client.client_id.clone(),
                redirect_uri: params.redirect_uri.clone(),
                state: params.state.clone(),
                requested_scopes: scopes.clone(),
                code_challenge: params.code_challenge.clone(),
                code_challenge_method: method,
                subject: None,
                tenant_endpoint: tenant_endpoint.clone(),
                issued_at: now,
                expires_at,
            };

            if !self.pending.insert_if_absent(&code, &pending).await? {
                continue;
            }

            let location = self.upstream_location(&pending);
            info!(
                client_id = %client.client_id,
                pkce = method.map(|m| m.as_str()).unwrap_or("none"),
                scopes = %scopes.join(" "),
                %tenant_endpoint,
                "authorization code issued; redirecting to upstream identity provider"
            );
            return Ok(AuthorizationRedirect {
                location,
                code,
                expires_at,
            });
        }

        Err(StoreError::KeyExhausted("pending_authorizations").into())
    }

    /// Bind the authenticated end user (and optionally a tenant) to a pending code.
    ///
    /// # Errors
    ///
    /// - `invalid_grant` if the code is unknown, expired, or already completed
    /// - `invalid_request` for an empty subject
    /// - `invalid_target` for an unknown tenant endpoint
    /// - `Storage` if the store is unavailable
    pub async fn complete_authorization(
        &self,
        code: &str,
        subject: &str,
        tenant_endpoint: Option<&str>,
    ) -> AuthResult<()> {
        if subject.trim().is_empty() {
            return Err(AuthError::InvalidRequest("subject must not be empty"));
        }
        let tenant = tenant_endpoint
            .map(|t| self.config.tenants.resolve(Some(t)))
            .transpose()?;

        let now = Utc::now();
        let outcome = self
            .pending
            .update(code, &|current: &PendingAuthorization| {
                if current.is_expired_at(now) || current.subject.is_some() {
                    return None;
                }
                let mut next = current.clone();
                next.subject = Some(subject.to_string());
                if let Some(tenant) = &tenant {
                    next.tenant_endpoint.clone_from(tenant);
                }
                Some(next)
            })
            .await?;

        match outcome {
            Update::Missing => {
                warn!("upstream completion for unknown authorization code");
                Err(AuthError::InvalidGrant("authorization code is invalid or expired"))
            }
            Update::Unchanged(pending) if pending.is_expired_at(now) => {
                warn!(client_id = %pending.client_id, "upstream completion for expired authorization code");
                Err(AuthError::InvalidGrant("authorization code is invalid or expired"))
            }
            Update::Unchanged(_) => Err(AuthError::InvalidGrant("authorization code was already completed")),
            Update::Updated(pending) => {
                info!(
                    client_id = %pending.client_id,
                    tenant_endpoint = %pending.tenant_endpoint,
                    "upstream identity provider completed authorization"
                );
                Ok(())
            }
        }
    }

    fn challenge_method(&self, params: &AuthorizationParams) -> AuthResult<Option<CodeChallengeMethod>> {
        let method = match (&params.code_challenge, params.code_challenge_method.as_deref()) {
            (None, None) => None,
            (None, Some(_)) => {
                return Err(AuthError::InvalidRequest(
                    "code_challenge_method was sent without code_challenge",
                ));
            }
            (Some(challenge), _) if challenge.is_empty() => {
                return Err(AuthError::InvalidRequest("code_challenge must not be empty"));
            }
            // RFC 7636 §4.3: an absent method means plain
            (Some(_), None) => Some(CodeChallengeMethod::Plain),
            (Some(_), Some(m)) => Some(m.parse()?),
        };

        if method.is_none() && self.config.oauth.require_pkce {
            return Err(AuthError::InvalidRequest("code_challenge is required"));
        }
        Ok(method)
    }

    fn resolve_scopes(&self, client: &RegisteredClient, requested: &[String]) -> AuthResult<Vec<String>> {
        let registered = client.registered_scopes();
        let scopes = if requested.is_empty() {
            let defaults = &self.config.oauth.default_scopes;
            match &registered {
                // Defaults never widen a client past its registered scope
                Some(registered) => {
                    let permitted: Vec<String> = defaults
                        .iter()
                        .filter(|s| registered.contains(s))
                        .cloned()
                        .collect();
                    if permitted.is_empty() && !defaults.is_empty() {
                        warn!(client_id = %client.client_id, "authorization rejected: no default scope is registered for the client");
                        return Err(AuthError::InvalidScope(
                            "none of the default scopes are registered for this client",
                        ));
                    }
                    permitted
                }
                None => defaults.clone(),
            }
        } else {
            requested.to_vec()
        };

        if let Some(unsupported) = scopes.iter().find(|s| !self.config.oauth.is_scope_supported(s)) {
            warn!(client_id = %client.client_id, scope = %unsupported, "authorization rejected: unsupported scope");
            return Err(AuthError::InvalidScope("requested scope is not supported"));
        }

        if let Some(registered) = &registered
            && scopes.iter().any(|s| !registered.contains(s))
        {
            return Err(AuthError::InvalidScope(
                "requested scope exceeds the client's registered scope",
            ));
        }

        Ok(scopes)
    }

    fn upstream_location(&self, pending: &PendingAuthorization) -> Url {
        let mut url = self.upstream_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &pending.client_id)
                .append_pair("redirect_uri", &pending.redirect_uri);
            if let Some(state) = &pending.state {
                query.append_pair("state", state);
            }
            if !pending.requested_scopes.is_empty() {
                query.append_pair("scope", &pending.requested_scopes.join(" "));
            }
            if let Some(challenge) = &pending.code_challenge {
                query.append_pair("code_challenge", challenge);
            }
            if let Some(method) = pending.code_challenge_method {
                query.append_pair("code_challenge_method", method.as_str());
            }
            query.append_pair(&self.config.upstream.correlation_param, &pending.code);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::AuthServerConfig;
    use crate::store::{MemoryStore, Store};
    use crate::types::ClientMetadata;

    fn client() -> RegisteredClient {
        RegisteredClient {
            client_id: "client-1".into(),
            client_id_issued_at: 0,
            metadata: ClientMetadata::new(["https://app.example.com/cb"]),
        }
    }

    fn orchestrator(config: AuthServerConfig) -> (AuthorizationOrchestrator, Arc<MemoryStore<PendingAuthorization>>) {
        let store = Arc::new(MemoryStore::<PendingAuthorization>::new());
        let orchestrator = AuthorizationOrchestrator::new(store.clone(), Arc::new(config)).unwrap();
        (orchestrator, store)
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[tokio::test]
    async fn test_authorize_forwards_request_upstream() {
        let (orchestrator, store) = orchestrator(AuthServerConfig::default());
        let params = AuthorizationParams::new("https://app.example.com/cb")
            .with_state("xyz")
            .with_scope("docs:read")
            .with_code_challenge("challenge", CodeChallengeMethod::S256);

        let redirect = orchestrator.authorize(&client(), params).await.unwrap();

        assert!(redirect.location.as_str().starts_with("https://login.example.com/authorize?"));
        let q = query(&redirect.location);
        assert_eq!(q["client_id"], "client-1");
        assert_eq!(q["redirect_uri"], "https://app.example.com/cb");
        assert_eq!(q["state"], "xyz");
        assert_eq!(q["scope"], "docs:read");
        assert_eq!(q["code_challenge"], "challenge");
        assert_eq!(q["code_challenge_method"], "S256");
        assert_eq!(q["response_type"], "code");
        assert_eq!(q["code"], redirect.code);

        let pending = store.get(&redirect.code).await.unwrap().unwrap();
        assert_eq!(pending.client_id, "client-1");
        assert_eq!(pending.code_challenge_method, Some(CodeChallengeMethod::S256));
        assert_eq!(pending.tenant_endpoint, "https://api.example.com");
        assert_eq!((pending.expires_at - pending.issued_at).num_seconds(), 600);
    }

    #[tokio::test]
    async fn test_custom_correlation_param() {
        let mut config = AuthServerConfig::default();
        config.upstream.correlation_param = "docbridge_code".into();
        let (orchestrator, _) = orchestrator(config);

        let redirect = orchestrator
            .authorize(&client(), AuthorizationParams::new("https://app.example.com/cb"))
            .await
            .unwrap();
        let q = query(&redirect.location);
        assert_eq!(q["docbridge_code"], redirect.code);
        assert!(!q.contains_key("code"));
    }

    #[tokio::test]
    async fn test_unregistered_redirect_is_rejected() {
        let (orchestrator, store) = orchestrator(AuthServerConfig::default());
        let err = orchestrator
            .authorize(&client(), AuthorizationParams::new("https://evil.example.com/cb"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_response_type_must_be_code() {
        let (orchestrator, _) = orchestrator(AuthServerConfig::default());
        let mut params = AuthorizationParams::new("https://app.example.com/cb");
        params.response_type = Some("token".into());
        let err = orchestrator.authorize(&client(), params).await.unwrap_err();
        assert_eq!(err.error_code(), "unsupported_response_type");
    }

    #[tokio::test]
    async fn test_challenge_without_method_defaults_to_plain() {
        let (orchestrator, store) = orchestrator(AuthServerConfig::default());
        let mut params = AuthorizationParams::new("https://app.example.com/cb");
        params.code_challenge = Some("verifier1".into());

        let redirect = orchestrator.authorize(&client(), params).await.unwrap();
        let pending = store.get(&redirect.code).await.unwrap().unwrap();
        assert_eq!(pending.code_challenge_method, Some(CodeChallengeMethod::Plain));
    }

    #[tokio::test]
    async fn test_pkce_parameter_errors() {
        let mut config = AuthServerConfig::default();
        config.oauth.require_pkce = true;
        let (orchestrator, _) = orchestrator(config);

        let err = orchestrator
            .authorize(&client(), AuthorizationParams::new("https://app.example.com/cb"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");

        let mut params = AuthorizationParams::new("https://app.example.com/cb");
        params.code_challenge = Some("abc".into());
        params.code_challenge_method = Some("S512".into());
        let err = orchestrator.authorize(&client(), params).await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");

        let mut params = AuthorizationParams::new("https://app.example.com/cb");
        params.code_challenge_method = Some("S256".into());
        let err = orchestrator.authorize(&client(), params).await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");
    }

    #[tokio::test]
    async fn test_scope_rules() {
        let mut config = AuthServerConfig::default();
        config.oauth.scopes_supported = vec!["docs:read".into(), "docs:write".into()];
        config.oauth.default_scopes = vec!["docs:read".into()];
        let (orchestrator, store) = orchestrator(config);

        let redirect = orchestrator
            .authorize(&client(), AuthorizationParams::new("https://app.example.com/cb"))
            .await
            .unwrap();
        let pending = store.get(&redirect.code).await.unwrap().unwrap();
        assert_eq!(pending.requested_scopes, vec!["docs:read".to_string()]);

        let err = orchestrator
            .authorize(
                &client(),
                AuthorizationParams::new("https://app.example.com/cb").with_scope("admin"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_scope");

        let mut restricted = client();
        restricted.metadata.scope = Some("docs:read".into());
        let err = orchestrator
            .authorize(
                &restricted,
                AuthorizationParams::new("https://app.example.com/cb").with_scope("docs:write"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_scope");
    }

    #[tokio::test]
    async fn test_default_scopes_respect_registered_scope() {
        let mut config = AuthServerConfig::default();
        config.oauth.scopes_supported = vec!["docs:read".into(), "docs:write".into()];
        config.oauth.default_scopes = vec!["docs:read".into(), "docs:write".into()];
        let (orchestrator, store) = orchestrator(config);

        let mut read_only = client();
        read_only.metadata.scope = Some("docs:read".into());
        let redirect = orchestrator
            .authorize(&read_only, AuthorizationParams::new("https://app.example.com/cb"))
            .await
            .unwrap();
        let pending = store.get(&redirect.code).await.unwrap().unwrap();
        assert_eq!(pending.requested_scopes, vec!["docs:read".to_string()]);

        let mut unrelated = client();
        unrelated.metadata.scope = Some("billing:read".into());
        let err = orchestrator
            .authorize(&unrelated, AuthorizationParams::new("https://app.example.com/cb"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_scope");

        // Unrestricted clients still receive every default scope
        let redirect = orchestrator
            .authorize(&client(), AuthorizationParams::new("https://app.example.com/cb"))
            .await
            .unwrap();
        let pending = store.get(&redirect.code).await.unwrap().unwrap();
        assert_eq!(pending.requested_scopes.len(), 2);
    }

    #[tokio::test]
    async fn test_resource_selects_tenant() {
        let mut config = AuthServerConfig::default();
        config.tenants.allowed_endpoints = vec!["https://us.api.example.com".into()];
        let (orchestrator, store) = orchestrator(config);

        let redirect = orchestrator
            .authorize(
                &client(),
                AuthorizationParams::new("https://app.example.com/cb")
                    .with_resource("https://us.api.example.com"),
            )
            .await
            .unwrap();
        let pending = store.get(&redirect.code).await.unwrap().unwrap();
        assert_eq!(pending.tenant_endpoint, "https://us.api.example.com");

        let err = orchestrator
            .authorize(
                &client(),
                AuthorizationParams::new("https://app.example.com/cb")
                    .with_resource("https://other.example.com"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_target");
    }

    #[tokio::test]
    async fn test_complete_authorization_binds_subject_once() {
        let mut config = AuthServerConfig::default();
        config.tenants.allowed_endpoints = vec!["https://us.api.example.com".into()];
        let (orchestrator, store) = orchestrator(config);
        let redirect = orchestrator
            .authorize(&client(), AuthorizationParams::new("https://app.example.com/cb"))
            .await
            .unwrap();

        orchestrator
            .complete_authorization(&redirect.code, "user-42", Some("https://us.api.example.com"))
            .await
            .unwrap();
        let pending = store.get(&redirect.code).await.unwrap().unwrap();
        assert_eq!(pending.subject.as_deref(), Some("user-42"));
        assert_eq!(pending.tenant_endpoint, "https://us.api.example.com");

        let err = orchestrator
            .complete_authorization(&redirect.code, "user-43", None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_grant");
        // The original binding survives a second completion attempt
        let pending = store.get(&redirect.code).await.unwrap().unwrap();
        assert_eq!(pending.subject.as_deref(), Some("user-42"));

        let err = orchestrator
            .complete_authorization("unknown", "user-42", None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_grant");
    }
}
