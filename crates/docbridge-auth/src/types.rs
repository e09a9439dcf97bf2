//! Data model for the authorization engine.
//!
//! Records in this module are what the stores persist. They are serialized
//! with serde so that the persistent backend can hold them as JSON values.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AuthError;

/// Token type reported in every token response.
pub const BEARER_TOKEN_TYPE: &str = "Bearer";

/// Grant types a client may register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization code grant (RFC 6749 Section 4.1)
    AuthorizationCode,
    /// Refresh token grant (RFC 6749 Section 6)
    RefreshToken,
}

impl GrantType {
    /// Get the grant type as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "refresh_token" => Ok(Self::RefreshToken),
            _ => Err(AuthError::UnsupportedGrantType(
                "only authorization_code and refresh_token grants are supported",
            )),
        }
    }
}

/// PKCE code challenge methods (RFC 7636).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    /// Challenge equals the verifier
    #[serde(rename = "plain")]
    Plain,
    /// Challenge is BASE64URL(SHA256(verifier))
    #[serde(rename = "S256")]
    S256,
}

impl CodeChallengeMethod {
    /// Get the method as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

impl FromStr for CodeChallengeMethod {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            _ => Err(AuthError::InvalidRequest(
                "code_challenge_method must be S256 or plain",
            )),
        }
    }
}

fn default_grant_types() -> Vec<String> {
    vec![
        GrantType::AuthorizationCode.as_str().to_string(),
        GrantType::RefreshToken.as_str().to_string(),
    ]
}

fn default_response_types() -> Vec<String> {
    vec!["code".to_string()]
}

fn default_auth_method() -> String {
    "none".to_string()
}

/// Dynamic client registration request (RFC 7591 §2).
///
/// Unknown members are kept in `extra` and echoed back in the registration
/// response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMetadata {
    /// Redirection URIs the client may use
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    /// Requested grant types
    #[serde(default = "default_grant_types")]
    pub grant_types: Vec<String>,

    /// Requested response types
    #[serde(default = "default_response_types")]
    pub response_types: Vec<String>,

    /// Token endpoint authentication method; only `none` is accepted
    #[serde(default = "default_auth_method")]
    pub token_endpoint_auth_method: String,

    /// Space separated scopes the client may request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Additional metadata members
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ClientMetadata {
    /// Metadata for a public client with the given redirect URIs and defaults
    /// for everything else.
    pub fn new<I, S>(redirect_uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            redirect_uris: redirect_uris.into_iter().map(Into::into).collect(),
            client_name: None,
            grant_types: default_grant_types(),
            response_types: default_response_types(),
            token_endpoint_auth_method: default_auth_method(),
            scope: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Set the client name.
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Restrict the client to these scopes.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// A client known to the registry. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredClient {
    /// Server-generated identifier
    pub client_id: String,

    /// Registration time as Unix seconds
    pub client_id_issued_at: i64,

    /// Metadata as accepted at registration
    #[serde(flatten)]
    pub metadata: ClientMetadata,
}

impl RegisteredClient {
    /// Exact-match check against the registered redirect URIs.
    pub fn is_redirect_uri_registered(&self, uri: &str) -> bool {
        self.metadata.redirect_uris.iter().any(|r| r == uri)
    }

    /// Whether the client registered for `grant`.
    pub fn allows_grant(&self, grant: GrantType) -> bool {
        self.metadata
            .grant_types
            .iter()
            .any(|g| g == grant.as_str())
    }

    /// Scopes the client registered for, if it restricted itself.
    pub fn registered_scopes(&self) -> Option<Vec<String>> {
        self.metadata.scope.as_deref().map(parse_scope)
    }
}

/// Parameters of an authorization request after transport decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationParams {
    /// Redirect URI the client wants the code delivered to
    pub redirect_uri: String,
    /// Opaque client state
    pub state: Option<String>,
    /// Requested scopes, in request order
    pub scopes: Vec<String>,
    /// PKCE challenge
    pub code_challenge: Option<String>,
    /// PKCE challenge method as sent (`S256` / `plain`)
    pub code_challenge_method: Option<String>,
    /// `response_type`, when sent
    pub response_type: Option<String>,
    /// RFC 8707 resource indicator selecting the tenant endpoint
    pub resource: Option<String>,
}

impl AuthorizationParams {
    /// Request for `redirect_uri` with nothing else set.
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            ..Self::default()
        }
    }

    /// Set the client state.
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Set requested scopes from a space separated string.
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scopes = parse_scope(scope);
        self
    }

    /// Attach a PKCE challenge.
    pub fn with_code_challenge(
        mut self,
        challenge: impl Into<String>,
        method: CodeChallengeMethod,
    ) -> Self {
        self.code_challenge = Some(challenge.into());
        self.code_challenge_method = Some(method.as_str().to_string());
        self
    }

    /// Set the resource indicator.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }
}

/// Outcome of a successful authorize call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRedirect {
    /// Upstream identity provider URL the user agent is sent to
    pub location: Url,
    /// The minted authorization code
    pub code: String,
    /// When the code stops being redeemable
    pub expires_at: DateTime<Utc>,
}

/// An in-flight authorization request keyed by its code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub requested_scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<CodeChallengeMethod>,
    /// End-user subject bound by the upstream completion call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub tenant_endpoint: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingAuthorization {
    /// Whether the code can no longer be redeemed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// An issued access token record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub subject: String,
    pub tenant_endpoint: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// A token is valid iff `now < expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// The identity this token grants.
    pub fn principal(&self) -> Principal {
        Principal {
            client_id: self.client_id.clone(),
            scopes: self.scopes.clone(),
            expires_at: self.expires_at,
            subject: self.subject.clone(),
            tenant_endpoint: self.tenant_endpoint.clone(),
        }
    }
}

/// A refresh token record, keyed by the refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshGrant {
    pub refresh_token: String,
    /// Access token issued alongside this refresh token
    pub access_token: String,
    pub client_id: String,
    /// Scopes of the original grant
    pub scopes: Vec<String>,
    pub subject: String,
    pub tenant_endpoint: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshGrant {
    /// Whether the refresh token can still be used at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Authenticated caller attached to protected requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub client_id: String,
    pub scopes: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub subject: String,
    /// Backend base URL requests on behalf of this principal are forwarded to
    pub tenant_endpoint: String,
}

impl Principal {
    /// Check whether the principal was granted `scope`.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Token endpoint success response (RFC 6749 §5.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
}

impl TokenPair {
    /// Bearer response for `access_token`.
    pub fn bearer(access_token: impl Into<String>, expires_in: u64) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: BEARER_TOKEN_TYPE.to_string(),
            expires_in,
            refresh_token: None,
            scope: String::new(),
        }
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, token: Option<String>) -> Self {
        self.refresh_token = token;
        self
    }

    /// Set the granted scopes.
    pub fn with_scopes(mut self, scopes: &[String]) -> Self {
        self.scope = scopes.join(" ");
        self
    }
}

/// `token_type_hint` values (RFC 7009 §2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenTypeHint {
    AccessToken,
    RefreshToken,
}

impl TokenTypeHint {
    /// Parse a hint; unknown values are ignored as RFC 7009 allows.
    pub fn parse(hint: &str) -> Option<Self> {
        match hint {
            "access_token" => Some(Self::AccessToken),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }
}

/// Token introspection response (RFC 7662).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl IntrospectionResponse {
    /// Response for an inactive, unknown, or foreign token.
    pub fn inactive() -> Self {
        Self {
            active: false,
            scope: None,
            client_id: None,
            sub: None,
            aud: None,
            token_type: None,
            exp: None,
            iat: None,
        }
    }

    /// Response describing a live access token.
    pub fn active(token: &IssuedToken) -> Self {
        Self {
            active: true,
            scope: Some(token.scopes.join(" ")),
            client_id: Some(token.client_id.clone()),
            sub: Some(token.subject.clone()),
            aud: Some(token.tenant_endpoint.clone()),
            token_type: Some(BEARER_TOKEN_TYPE.to_string()),
            exp: Some(token.expires_at.timestamp()),
            iat: Some(token.issued_at.timestamp()),
        }
    }
}

/// Split a space separated scope string into an ordered, de-duplicated list.
pub fn parse_scope(scope: &str) -> Vec<String> {
    let mut scopes: Vec<String> = Vec::new();
    for s in scope.split_whitespace() {
        if !scopes.iter().any(|existing| existing == s) {
            scopes.push(s.to_string());
        }
    }
    scopes
}

/// `now + ttl_secs`, saturating instead of overflowing.
pub(crate) fn expiry_after(now: DateTime<Utc>, ttl_secs: u64) -> DateTime<Utc> {
    let secs = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
    TimeDelta::try_seconds(secs)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scope_dedups_and_keeps_order() {
        assert_eq!(
            parse_scope("  docs:read docs:write docs:read  "),
            vec!["docs:read".to_string(), "docs:write".to_string()]
        );
        assert!(parse_scope("").is_empty());
    }

    #[test]
    fn test_client_metadata_defaults_and_extra_fields() {
        let metadata: ClientMetadata = serde_json::from_value(serde_json::json!({
            "redirect_uris": ["https://app.example.com/cb"],
            "client_name": "Example",
            "logo_uri": "https://app.example.com/logo.png"
        }))
        .unwrap();

        assert_eq!(metadata.grant_types, vec!["authorization_code", "refresh_token"]);
        assert_eq!(metadata.response_types, vec!["code"]);
        assert_eq!(metadata.token_endpoint_auth_method, "none");
        assert_eq!(
            metadata.extra.get("logo_uri").and_then(|v| v.as_str()),
            Some("https://app.example.com/logo.png")
        );
    }

    #[test]
    fn test_registered_client_serializes_flat() {
        let client = RegisteredClient {
            client_id: "abc".into(),
            client_id_issued_at: 1_700_000_000,
            metadata: ClientMetadata::new(["https://app.example.com/cb"]),
        };
        let json = serde_json::to_value(&client).unwrap();
        assert_eq!(json["client_id"], "abc");
        assert_eq!(json["client_id_issued_at"], 1_700_000_000);
        assert_eq!(json["redirect_uris"][0], "https://app.example.com/cb");
        assert_eq!(json["token_endpoint_auth_method"], "none");
    }

    #[test]
    fn test_redirect_uri_exact_match() {
        let client = RegisteredClient {
            client_id: "abc".into(),
            client_id_issued_at: 0,
            metadata: ClientMetadata::new(["https://app.example.com/cb"]),
        };
        assert!(client.is_redirect_uri_registered("https://app.example.com/cb"));
        assert!(!client.is_redirect_uri_registered("https://app.example.com/cb/"));
        assert!(!client.is_redirect_uri_registered("https://app.example.com/cb?x=1"));
    }

    #[test]
    fn test_grant_type_and_method_parsing() {
        assert_eq!(
            "authorization_code".parse::<GrantType>().unwrap(),
            GrantType::AuthorizationCode
        );
        assert!(matches!(
            "client_credentials".parse::<GrantType>(),
            Err(AuthError::UnsupportedGrantType(_))
        ));
        assert_eq!(
            "S256".parse::<CodeChallengeMethod>().unwrap(),
            CodeChallengeMethod::S256
        );
        assert!("s256".parse::<CodeChallengeMethod>().is_err());
    }

    #[test]
    fn test_token_pair_serialization() {
        let pair = TokenPair::bearer("at", 3600)
            .with_refresh_token(Some("rt".into()))
            .with_scopes(&["docs:read".into(), "docs:write".into()]);
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["expires_in"], 3600);
        assert_eq!(json["refresh_token"], "rt");
        assert_eq!(json["scope"], "docs:read docs:write");
    }

    #[test]
    fn test_expiry_after_saturates() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, 0), now);
        assert_eq!(expiry_after(now, u64::MAX), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_inactive_introspection_is_minimal() {
        let json = serde_json::to_value(IntrospectionResponse::inactive()).unwrap();
        assert_eq!(json, serde_json::json!({"active": false}));
    }
}
