//! # docbridge-server
//!
//! HTTP surface for the docbridge authorization server, built on axum.
//!
//! ## Endpoints
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `POST` | `/register` | Dynamic client registration (RFC 7591) |
//! | `GET` | `/authorize` | Start an authorization, `302` to the upstream |
//! | `POST` | `/authorize/complete` | Upstream binds the end user (secret required) |
//! | `POST` | `/token` | Code redemption and refresh rotation |
//! | `POST` | `/revoke` | Token revocation (RFC 7009) |
//! | `POST` | `/introspect` | Token introspection (RFC 7662) |
//! | `GET` | `/.well-known/oauth-protected-resource` | RFC 9728 metadata |
//! | `GET` | `/.well-known/oauth-authorization-server` | RFC 8414 metadata |
//! | `GET` | `/v1/session` | Caller's principal (bearer token required) |
//! | `GET` | `/health` | Liveness |
//!
//! ## Running
//!
//! ```rust,no_run
//! use docbridge_server::{ServerConfig, serve};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), docbridge_server::ServerError> {
//! let config = ServerConfig::from_file("docbridge.toml")?;
//! serve(config, CancellationToken::new()).await
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod router;
pub mod state;

pub use config::{ConfigError, ConfigurationBuilder, LoggingConfig, ServerConfig};
pub use error::{ApiError, ServerError};
pub use logging::LoggingGuard;
pub use router::{build_state, router, serve};
pub use state::AppState;
