//! Bearer token verification for protected requests.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};
use crate::store::SharedStore;
use crate::types::{IssuedToken, Principal};

/// Resolves a bearer token to the principal it was issued for.
///
/// The tower layer is generic over this trait so that tests and embedders
/// can supply their own verification.
#[async_trait]
pub trait BearerVerifier: Send + Sync + 'static {
    /// Verify `token`.
    ///
    /// # Errors
    ///
    /// Returns `invalid_token` for unknown or expired tokens and `Storage` if
    /// the token store is unavailable.
    async fn verify(&self, token: &str) -> AuthResult<Principal>;
}

/// Looks access tokens up in the token store.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    access_tokens: SharedStore<IssuedToken>,
}

impl TokenVerifier {
    /// Verifier over `access_tokens`.
    pub fn new(access_tokens: SharedStore<IssuedToken>) -> Self {
        Self { access_tokens }
    }

    /// Resolve `token` to a [`Principal`].
    ///
    /// Expired records found here are deleted on the spot.
    ///
    /// # Errors
    ///
    /// Returns `invalid_token` if the token is absent, unknown, revoked or
    /// expired, and `Storage` if the store is unavailable.
    pub async fn verify_access_token(&self, token: &str) -> AuthResult<Principal> {
        if token.is_empty() {
            return Err(AuthError::InvalidToken("missing access token"));
        }

        let Some(issued) = self.access_tokens.get(token).await? else {
            debug!("bearer token rejected: unknown token");
            return Err(AuthError::InvalidToken("access token is invalid or expired"));
        };

        if !issued.is_valid_at(Utc::now()) {
            debug!(client_id = %issued.client_id, "bearer token rejected: expired");
            if let Err(err) = self.access_tokens.remove(token).await {
                warn!(error = %err, "failed to delete expired access token");
            }
            return Err(AuthError::InvalidToken("access token is invalid or expired"));
        }

        debug!(client_id = %issued.client_id, "bearer token verified");
        Ok(issued.principal())
    }
}

#[async_trait]
impl BearerVerifier for TokenVerifier {
    async fn verify(&self, token: &str) -> AuthResult<Principal> {
        self.verify_access_token(token).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeDelta;

    use super::*;
    use crate::store::{MemoryStore, Store};

    fn issued(token: &str, ttl_secs: i64) -> IssuedToken {
        let now = Utc::now();
        IssuedToken {
            access_token: token.into(),
            refresh_token: None,
            client_id: "client-a".into(),
            scopes: vec!["docs:read".into()],
            subject: "user-42".into(),
            tenant_endpoint: "https://api.example.com".into(),
            issued_at: now,
            expires_at: now + TimeDelta::seconds(ttl_secs),
        }
    }

    #[tokio::test]
    async fn test_live_token_resolves_to_principal() {
        let store = Arc::new(MemoryStore::<IssuedToken>::new());
        store.put("live", &issued("live", 3600)).await.unwrap();
        let verifier = TokenVerifier::new(store);

        let principal = verifier.verify_access_token("live").await.unwrap();
        assert_eq!(principal.client_id, "client-a");
        assert_eq!(principal.subject, "user-42");
        assert_eq!(principal.tenant_endpoint, "https://api.example.com");
        assert!(principal.has_scope("docs:read"));
        assert!(!principal.has_scope("docs:write"));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected_and_deleted() {
        let store = Arc::new(MemoryStore::<IssuedToken>::new());
        store.put("old", &issued("old", -1)).await.unwrap();
        let verifier = TokenVerifier::new(store.clone());

        let err = verifier.verify_access_token("old").await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_token");
        assert!(store.get("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_and_empty_tokens() {
        let verifier = TokenVerifier::new(Arc::new(MemoryStore::<IssuedToken>::new()));
        assert_eq!(
            verifier.verify_access_token("nope").await.unwrap_err().error_code(),
            "invalid_token"
        );
        assert_eq!(
            verifier.verify_access_token("").await.unwrap_err().error_code(),
            "invalid_token"
        );
    }
}
