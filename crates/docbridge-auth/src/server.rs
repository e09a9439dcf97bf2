//! Discovery metadata and bearer challenge helpers
//!
//! This module provides:
//! - Protected Resource Metadata (RFC 9728)
//! - Authorization Server Metadata (RFC 8414)
//! - WWW-Authenticate header generation for 401 responses (RFC 6750)
//! - Bearer token extraction from the Authorization header

use serde_json::{Value, json};

use crate::config::OAuthConfig;
use crate::error::{AuthError, AuthResult};

/// Path of the protected resource metadata document
pub const PROTECTED_RESOURCE_METADATA_PATH: &str = "/.well-known/oauth-protected-resource";
/// Path of the authorization server metadata document
pub const AUTHORIZATION_SERVER_METADATA_PATH: &str = "/.well-known/oauth-authorization-server";

fn join(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// URL of the protected resource metadata document under `base`.
pub fn resource_metadata_url(base: &str) -> String {
    join(base, PROTECTED_RESOURCE_METADATA_PATH)
}

/// Protected Resource Metadata builder
///
/// Constructs the RFC 9728 document served at
/// `/.well-known/oauth-protected-resource`.
#[derive(Debug, Clone)]
pub struct ProtectedResourceMetadataBuilder {
    /// Resource identifier
    resource: String,
    /// Authorization server issuer
    auth_server: String,
    /// Supported scopes
    scopes: Vec<String>,
    /// Human-readable name
    resource_name: Option<String>,
}

impl ProtectedResourceMetadataBuilder {
    /// Create a new metadata builder
    pub fn new(resource: impl Into<String>, auth_server: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            auth_server: auth_server.into(),
            scopes: Vec::new(),
            resource_name: None,
        }
    }

    /// Set supported scopes
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Set the resource name
    pub fn with_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    /// Build the metadata as JSON value
    pub fn build(self) -> Value {
        let mut metadata = json!({
            "resource": self.resource,
            "authorization_servers": [self.auth_server],
            "bearer_methods_supported": ["header"],
        });

        if !self.scopes.is_empty() {
            metadata["scopes_supported"] = json!(self.scopes);
        }
        if let Some(name) = self.resource_name {
            metadata["resource_name"] = Value::String(name);
        }

        metadata
    }
}

/// Authorization Server Metadata (RFC 8414) for an issuer.
///
/// Endpoints are advertised relative to `issuer`.
pub fn authorization_server_metadata(issuer: &str, config: &OAuthConfig) -> Value {
    let mut metadata = json!({
        "issuer": issuer,
        "authorization_endpoint": join(issuer, "/authorize"),
        "token_endpoint": join(issuer, "/token"),
        "registration_endpoint": join(issuer, "/register"),
        "revocation_endpoint": join(issuer, "/revoke"),
        "introspection_endpoint": join(issuer, "/introspect"),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "code_challenge_methods_supported": ["S256", "plain"],
        "token_endpoint_auth_methods_supported": ["none"],
        "revocation_endpoint_auth_methods_supported": ["none"],
        "introspection_endpoint_auth_methods_supported": ["none"],
    });

    if !config.scopes_supported.is_empty() {
        metadata["scopes_supported"] = json!(config.scopes_supported);
    }

    metadata
}

/// WWW-Authenticate header builder for 401 Unauthorized responses
///
/// Implements RFC 9728 Section 5.1 "WWW-Authenticate Response" for indicating
/// the location of Protected Resource Metadata.
#[derive(Debug, Clone)]
pub struct WwwAuthenticateBuilder {
    /// Resource metadata URI for .well-known endpoint
    metadata_uri: String,
    /// Scope required for this resource
    scope: Option<String>,
    /// Error code (if applicable)
    error: Option<String>,
    /// Error description
    error_description: Option<String>,
}

impl WwwAuthenticateBuilder {
    /// Create a new WWW-Authenticate builder
    pub fn new(metadata_uri: impl Into<String>) -> Self {
        Self {
            metadata_uri: metadata_uri.into(),
            scope: None,
            error: None,
            error_description: None,
        }
    }

    /// Set required scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set error code and description
    pub fn with_error(mut self, error: impl Into<String>, description: Option<String>) -> Self {
        self.error = Some(error.into());
        self.error_description = description;
        self
    }

    /// Build the WWW-Authenticate header value
    ///
    /// Produces a header like:
    /// ```text
    /// Bearer resource_metadata="https://docs.example.com/.well-known/oauth-protected-resource", error="invalid_token"
    /// ```
    pub fn build(self) -> String {
        let mut parts = vec![format!(
            "Bearer resource_metadata=\"{}\"",
            quote_escape(&self.metadata_uri)
        )];

        if let Some(scope) = self.scope {
            parts.push(format!("scope=\"{}\"", quote_escape(&scope)));
        }

        if let Some(error) = self.error {
            parts.push(format!("error=\"{}\"", quote_escape(&error)));
        }

        if let Some(description) = self.error_description {
            parts.push(format!("error_description=\"{}\"", quote_escape(&description)));
        }

        parts.join(", ")
    }
}

fn quote_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Bearer token extraction
#[derive(Debug, Clone)]
pub struct BearerTokenValidator;

impl BearerTokenValidator {
    /// Extract bearer token from Authorization header
    ///
    /// The scheme is matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `invalid_token` if the header is not `Bearer <token>`.
    ///
    /// # Example
    /// ```
    /// # use docbridge_auth::server::BearerTokenValidator;
    /// let token = BearerTokenValidator::extract_from_header("Bearer mytoken")?;
    /// assert_eq!(token, "mytoken");
    /// # Ok::<(), docbridge_auth::AuthError>(())
    /// ```
    pub fn extract_from_header(authorization_header: &str) -> AuthResult<String> {
        let mut parts = authorization_header.split_whitespace();

        let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(AuthError::InvalidToken(
                "Authorization header must have format: Bearer <token>",
            ));
        };

        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::InvalidToken(
                "only Bearer token authentication is supported",
            ));
        }

        Ok(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_builder() {
        let metadata = ProtectedResourceMetadataBuilder::new(
            "https://docs.example.com/v1",
            "https://docs.example.com",
        )
        .with_scopes(vec!["docs:read".to_string()])
        .with_resource_name("docbridge")
        .build();

        assert_eq!(metadata["resource"], "https://docs.example.com/v1");
        assert_eq!(metadata["authorization_servers"][0], "https://docs.example.com");
        assert_eq!(metadata["scopes_supported"][0], "docs:read");
        assert_eq!(metadata["bearer_methods_supported"][0], "header");
        assert_eq!(metadata["resource_name"], "docbridge");
    }

    #[test]
    fn test_authorization_server_metadata() {
        let metadata = authorization_server_metadata("https://docs.example.com/", &OAuthConfig::default());
        assert_eq!(metadata["issuer"], "https://docs.example.com/");
        assert_eq!(metadata["token_endpoint"], "https://docs.example.com/token");
        assert_eq!(metadata["registration_endpoint"], "https://docs.example.com/register");
        assert_eq!(metadata["code_challenge_methods_supported"][0], "S256");
        assert!(metadata.get("scopes_supported").is_none());
    }

    #[test]
    fn test_www_authenticate_builder() {
        let header = WwwAuthenticateBuilder::new(resource_metadata_url("https://docs.example.com"))
            .with_error("invalid_token", Some("access token is \"expired\"".to_string()))
            .build();

        assert_eq!(
            header,
            "Bearer resource_metadata=\"https://docs.example.com/.well-known/oauth-protected-resource\", \
             error=\"invalid_token\", error_description=\"access token is \\\"expired\\\"\""
        );
    }

    #[test]
    fn test_bearer_token_extraction() {
        let token = BearerTokenValidator::extract_from_header("Bearer mytoken123")
            .expect("Failed to extract token");
        assert_eq!(token, "mytoken123");
    }

    #[test]
    fn test_bearer_token_extraction_case_insensitive() {
        let token = BearerTokenValidator::extract_from_header("bEaReR mytoken123")
            .expect("Failed to extract token");
        assert_eq!(token, "mytoken123");
    }

    #[test]
    fn test_bearer_token_extraction_invalid_format() {
        for header in ["mytoken123", "Basic dXNlcjpwYXNz", "Bearer a b", "Bearer", ""] {
            let err = BearerTokenValidator::extract_from_header(header).unwrap_err();
            assert_eq!(err.error_code(), "invalid_token");
        }
    }
}
