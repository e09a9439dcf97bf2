//! HTTP handlers for the authorization endpoints
//!
//! ## Handlers
//!
//! - [`register`] - Dynamic client registration (RFC 7591)
//! - [`authorize`] - Authorization request and upstream completion
//! - [`token`] - Code redemption and refresh (RFC 6749 §4.1.3, §6)
//! - [`revocation`] - Revocation (RFC 7009) and introspection (RFC 7662)
//! - [`metadata`] - Discovery documents (RFC 8414, RFC 9728)
//! - [`session`] - The caller's principal on the protected API
//! - [`health`] - Liveness

pub mod authorize;
pub mod health;
pub mod metadata;
pub mod register;
pub mod revocation;
pub mod session;
pub mod token;

pub use authorize::{authorize_handler, complete_handler};
pub use health::health_handler;
pub use metadata::{authorization_server_metadata_handler, protected_resource_metadata_handler};
pub use register::register_handler;
pub use revocation::{introspect_handler, revoke_handler};
pub use session::session_handler;
pub use token::token_handler;

use axum::response::Response;
use http::HeaderValue;
use http::header::{CACHE_CONTROL, PRAGMA};

/// Mark a response carrying credentials as uncacheable (RFC 6749 §5.1)
pub(crate) fn no_store(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    response
}
