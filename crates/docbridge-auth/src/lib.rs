//! # docbridge-auth - Embedded OAuth 2.0 Authorization Server
//!
//! The authorization-code grant engine behind docbridge: clients register,
//! are sent through the upstream identity provider with a server-minted code,
//! redeem that code (PKCE-bound, exactly once) for a bearer token pair, and
//! present the access token on every protected request.
//!
//! ## Architecture
//!
//! - [`store`] - `Store<T>` abstraction with in-memory (`dashmap`) and persistent (`sled`) backends
//! - [`registry`] - Client registry (RFC 7591 dynamic registration)
//! - [`authorize`] - Authorization orchestrator and upstream completion hook
//! - [`exchange`] - Code redemption and refresh-token rotation
//! - [`verifier`] - Bearer token verification
//! - [`introspection`] - Revocation (RFC 7009) and introspection (RFC 7662)
//! - [`sweeper`] - Periodic purge of expired records
//! - [`server`] - Discovery metadata and `WWW-Authenticate` helpers
//! - [`tower`] - Tower layer injecting the verified [`Principal`] into requests
//! - [`manager`] - [`AuthorizationServer`], everything above assembled on one set of stores
//!
//! ## Quick Start
//!
//! ```rust
//! use docbridge_auth::{AuthServerConfig, AuthorizationParams, AuthorizationServer, ClientMetadata};
//! use docbridge_auth::crypto::code_challenge_s256;
//! use docbridge_auth::CodeChallengeMethod;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let server = AuthorizationServer::in_memory(AuthServerConfig::default())?;
//!
//! let client = server
//!     .register_client(ClientMetadata::new(["https://app.example.com/callback"]))
//!     .await?;
//!
//! let redirect = server
//!     .authorize(
//!         &client.client_id,
//!         AuthorizationParams::new("https://app.example.com/callback")
//!             .with_code_challenge(code_challenge_s256("verifier1"), CodeChallengeMethod::S256),
//!     )
//!     .await?;
//!
//! let tokens = server
//!     .exchange_authorization_code(&client.client_id, &redirect.code, Some("verifier1"), None)
//!     .await?;
//!
//! let principal = server.verify_access_token(&tokens.access_token).await?;
//! assert_eq!(principal.client_id, client.client_id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `sled` (default) - persistent store backend
//! - `middleware` (default) - tower bearer-auth layer
//!
//! ## Standards Compliance
//!
//! - **RFC 6749** - OAuth 2.0 Authorization Framework
//! - **RFC 6750** - Bearer Token Usage
//! - **RFC 7009** - Token Revocation
//! - **RFC 7591** - Dynamic Client Registration
//! - **RFC 7636** - Proof Key for Code Exchange (PKCE)
//! - **RFC 7662** - Token Introspection
//! - **RFC 8414** - Authorization Server Metadata
//! - **RFC 8707** - Resource Indicators
//! - **RFC 9728** - Protected Resource Metadata

// Submodules
pub mod authorize;
pub mod config;
pub mod crypto;
pub mod error;
pub mod exchange;
pub mod introspection;
pub mod manager;
pub mod registry;
pub mod server;
pub mod store;
pub mod sweeper;
pub mod types;
pub mod verifier;

#[cfg(feature = "middleware")]
pub mod tower;

// Re-export configuration types
#[doc(inline)]
pub use config::{AuthConfigError, AuthServerConfig, OAuthConfig, TenantConfig, UpstreamConfig};

#[doc(inline)]
pub use error::{AuthError, AuthResult, OAuthErrorResponse};

#[doc(inline)]
pub use types::*;

#[doc(inline)]
pub use store::{SharedStore, StorageBackend, StorageConfig, Store, StoreError, Stores, Update};

pub use authorize::AuthorizationOrchestrator;
pub use exchange::TokenExchangeEngine;
pub use introspection::TokenIntrospector;
pub use manager::AuthorizationServer;
pub use registry::ClientRegistry;
pub use sweeper::spawn_sweeper;
pub use verifier::{BearerVerifier, TokenVerifier};
