//! # Tower Middleware for Bearer Authentication
//!
//! - [`BearerAuthLayer`] - a Tower Layer that wraps services with bearer token verification
//! - [`BearerAuthService`] - the Tower Service that extracts and verifies the token
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use docbridge_auth::tower::{BearerAuthConfig, BearerAuthLayer};
//!
//! let layer = BearerAuthLayer::new(
//!     verifier,
//!     BearerAuthConfig::new("https://docs.example.com/.well-known/oauth-protected-resource"),
//! );
//!
//! let service = ServiceBuilder::new()
//!     .layer(layer)
//!     .service(my_inner_service);
//! ```
//!
//! ## Request Extensions
//!
//! On successful verification the [`Principal`](crate::Principal) is inserted
//! into the request's extensions:
//!
//! ```rust,ignore
//! if let Some(principal) = req.extensions().get::<Principal>() {
//!     println!("forwarding to {}", principal.tenant_endpoint);
//! }
//! ```
//!
//! Requests without a valid token are answered with `401 Unauthorized` and a
//! `WWW-Authenticate` challenge pointing at the protected resource metadata.

mod layer;
mod service;

pub use layer::BearerAuthLayer;
pub use service::{BearerAuthService, BearerAuthServiceFuture};

/// Configuration for the bearer auth layer
#[derive(Debug, Clone)]
pub struct BearerAuthConfig {
    /// URL of the protected resource metadata document advertised in challenges
    pub resource_metadata_url: String,
    /// Scope advertised in challenges, if any
    pub required_scope: Option<String>,
    /// Path prefixes that bypass authentication
    pub bypass_paths: Vec<String>,
}

impl BearerAuthConfig {
    /// Config advertising `resource_metadata_url` in challenges.
    pub fn new(resource_metadata_url: impl Into<String>) -> Self {
        Self {
            resource_metadata_url: resource_metadata_url.into(),
            required_scope: None,
            bypass_paths: Vec::new(),
        }
    }

    /// Advertise a required scope in challenges.
    pub fn with_required_scope(mut self, scope: impl Into<String>) -> Self {
        self.required_scope = Some(scope.into());
        self
    }

    /// Add a path prefix that bypasses authentication.
    pub fn bypass_path(mut self, prefix: impl Into<String>) -> Self {
        self.bypass_paths.push(prefix.into());
        self
    }

    /// Check if a request path should bypass authentication.
    pub fn should_bypass(&self, path: &str) -> bool {
        self.bypass_paths.iter().any(|p| path.starts_with(p.as_str()))
    }
}
