//! Authorization engine configuration.
//!
//! These sections are embedded in the server configuration file as
//! `[oauth]`, `[upstream]` and `[tenants]`.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::error::AuthError;

/// Lower bound for the authorization code lifetime, in seconds.
pub const MIN_AUTHORIZATION_CODE_TTL: u64 = 60;
/// Upper bound for the authorization code lifetime, in seconds.
pub const MAX_AUTHORIZATION_CODE_TTL: u64 = 600;

/// Configuration validation errors
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthConfigError {
    /// A URL-valued setting does not parse as an absolute URL
    #[error("{field} is not a valid absolute URL: {source}")]
    InvalidUrl {
        /// Offending setting
        field: &'static str,
        /// Parser error
        #[source]
        source: url::ParseError,
    },

    /// A setting has an unusable value
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending setting
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
}

/// Token lifetimes, PKCE policy and scopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Issuer identifier advertised in metadata; defaults to the public URL
    pub issuer: String,
    /// Authorization code lifetime in seconds (clamped to 60..=600)
    pub authorization_code_ttl: u64,
    /// Access token lifetime in seconds
    pub access_token_ttl: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl: u64,
    /// Reject authorization requests without a PKCE challenge
    pub require_pkce: bool,
    /// Scopes that may be requested; empty allows any scope
    pub scopes_supported: Vec<String>,
    /// Scopes granted when a request names none
    pub default_scopes: Vec<String>,
    /// Refuse to redeem codes the upstream never completed
    pub require_upstream_subject: bool,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            authorization_code_ttl: 600,
            access_token_ttl: 3600,
            refresh_token_ttl: 30 * 24 * 3600,
            require_pkce: false,
            scopes_supported: Vec::new(),
            default_scopes: Vec::new(),
            require_upstream_subject: false,
        }
    }
}

impl OAuthConfig {
    /// Authorization code lifetime after clamping.
    pub fn effective_code_ttl(&self) -> u64 {
        self.authorization_code_ttl
            .clamp(MIN_AUTHORIZATION_CODE_TTL, MAX_AUTHORIZATION_CODE_TTL)
    }

    /// Whether `scope` may be requested.
    pub fn is_scope_supported(&self, scope: &str) -> bool {
        self.scopes_supported.is_empty() || self.scopes_supported.iter().any(|s| s == scope)
    }
}

/// The upstream identity provider the user agent is redirected to.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream authorization URL
    pub authorization_endpoint: String,
    /// Query parameter carrying the minted code upstream
    pub correlation_param: String,
    /// Shared secret the upstream presents on the completion callback
    #[serde(
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub completion_secret: Option<SecretString>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            authorization_endpoint: "https://login.example.com/authorize".to_string(),
            correlation_param: "code".to_string(),
            completion_secret: None,
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("correlation_param", &self.correlation_param)
            .field(
                "completion_secret",
                &self.completion_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl UpstreamConfig {
    /// Parsed upstream authorization URL.
    ///
    /// # Errors
    ///
    /// Returns [`AuthConfigError::InvalidUrl`] if the endpoint is not an absolute URL.
    pub fn authorization_url(&self) -> Result<Url, AuthConfigError> {
        Url::parse(&self.authorization_endpoint).map_err(|source| AuthConfigError::InvalidUrl {
            field: "upstream.authorization_endpoint",
            source,
        })
    }

    /// Exposed completion secret, if configured.
    pub fn completion_secret(&self) -> Option<&str> {
        self.completion_secret
            .as_ref()
            .map(|s| s.expose_secret().as_str())
    }
}

/// Backend tenants issued tokens may be scoped to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantConfig {
    /// Tenant used when an authorization request names no resource
    pub default_endpoint: String,
    /// Further tenants selectable through the `resource` parameter
    pub allowed_endpoints: Vec<String>,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            default_endpoint: "https://api.example.com".to_string(),
            allowed_endpoints: Vec::new(),
        }
    }
}

impl TenantConfig {
    /// Select the tenant endpoint for a request.
    ///
    /// # Errors
    ///
    /// Returns `invalid_target` if `resource` is not a configured tenant.
    pub fn resolve(&self, resource: Option<&str>) -> Result<String, AuthError> {
        match resource {
            None => Ok(self.default_endpoint.clone()),
            Some(r) if self.is_allowed(r) => Ok(r.to_string()),
            Some(_) => Err(AuthError::InvalidTarget(
                "resource is not a known tenant endpoint",
            )),
        }
    }

    fn is_allowed(&self, endpoint: &str) -> bool {
        self.default_endpoint == endpoint || self.allowed_endpoints.iter().any(|e| e == endpoint)
    }
}

/// Everything the authorization engine needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthServerConfig {
    pub oauth: OAuthConfig,
    pub upstream: UpstreamConfig,
    pub tenants: TenantConfig,
}

impl AuthServerConfig {
    /// Validate settings that would otherwise fail at request time.
    ///
    /// # Errors
    ///
    /// Returns [`AuthConfigError`] describing the first invalid setting.
    pub fn validate(&self) -> Result<(), AuthConfigError> {
        self.upstream.authorization_url()?;

        if self.upstream.correlation_param.trim().is_empty() {
            return Err(AuthConfigError::Invalid {
                field: "upstream.correlation_param",
                reason: "must not be empty",
            });
        }

        for endpoint in std::iter::once(&self.tenants.default_endpoint)
            .chain(self.tenants.allowed_endpoints.iter())
        {
            Url::parse(endpoint).map_err(|source| AuthConfigError::InvalidUrl {
                field: "tenants",
                source,
            })?;
        }

        if let Some(unsupported) = self
            .oauth
            .default_scopes
            .iter()
            .find(|s| !self.oauth.is_scope_supported(s))
        {
            tracing::warn!(scope = %unsupported, "default scope is not in scopes_supported");
            return Err(AuthConfigError::Invalid {
                field: "oauth.default_scopes",
                reason: "every default scope must be listed in scopes_supported",
            });
        }

        if self.oauth.access_token_ttl == 0 {
            return Err(AuthConfigError::Invalid {
                field: "oauth.access_token_ttl",
                reason: "must be greater than zero",
            });
        }

        Ok(())
    }
}

fn serialize_secret<S>(secret: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.is_empty()).map(SecretString::new))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OAuthConfig::default();
        assert_eq!(config.authorization_code_ttl, 600);
        assert_eq!(config.access_token_ttl, 3600);
        assert_eq!(config.refresh_token_ttl, 2_592_000);
        assert!(AuthServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_code_ttl_is_clamped() {
        let mut config = OAuthConfig {
            authorization_code_ttl: 5,
            ..OAuthConfig::default()
        };
        assert_eq!(config.effective_code_ttl(), 60);
        config.authorization_code_ttl = 86_400;
        assert_eq!(config.effective_code_ttl(), 600);
        config.authorization_code_ttl = 300;
        assert_eq!(config.effective_code_ttl(), 300);
    }

    #[test]
    fn test_tenant_resolution() {
        let tenants = TenantConfig {
            default_endpoint: "https://eu.api.example.com".into(),
            allowed_endpoints: vec!["https://us.api.example.com".into()],
        };
        assert_eq!(tenants.resolve(None).unwrap(), "https://eu.api.example.com");
        assert_eq!(
            tenants.resolve(Some("https://us.api.example.com")).unwrap(),
            "https://us.api.example.com"
        );
        assert!(matches!(
            tenants.resolve(Some("https://evil.example.com")),
            Err(AuthError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_upstream() {
        let mut config = AuthServerConfig::default();
        config.upstream.authorization_endpoint = "not a url".into();
        assert!(matches!(
            config.validate(),
            Err(AuthConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unsupported_default_scope() {
        let mut config = AuthServerConfig::default();
        config.oauth.scopes_supported = vec!["docs:read".into()];
        config.oauth.default_scopes = vec!["admin".into()];
        assert!(matches!(
            config.validate(),
            Err(AuthConfigError::Invalid { field: "oauth.default_scopes", .. })
        ));
    }

    #[test]
    fn test_completion_secret_is_redacted_in_debug() {
        let upstream: UpstreamConfig = serde_json::from_value(serde_json::json!({
            "authorization_endpoint": "https://idp.example.com/authorize",
            "completion_secret": "s3cret"
        }))
        .unwrap();
        assert_eq!(upstream.completion_secret(), Some("s3cret"));
        assert_eq!(upstream.correlation_param, "code");
        assert!(!format!("{upstream:?}").contains("s3cret"));
    }
}
