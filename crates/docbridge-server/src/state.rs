//! Shared application state

use std::sync::Arc;

use docbridge_auth::AuthorizationServer;
use docbridge_auth::server::resource_metadata_url;

/// State cloned into every handler
#[derive(Debug, Clone)]
pub struct AppState {
    /// The authorization engine
    pub auth: Arc<AuthorizationServer>,
    /// Externally visible base URL, without a trailing slash
    pub public_url: Arc<str>,
}

impl AppState {
    /// Create new application state
    pub fn new(auth: AuthorizationServer, public_url: impl Into<String>) -> Self {
        let public_url: String = public_url.into();
        Self {
            auth: Arc::new(auth),
            public_url: Arc::from(public_url.trim_end_matches('/')),
        }
    }

    /// Issuer advertised in metadata, falling back to the public URL
    pub fn issuer(&self) -> &str {
        match self.auth.config().oauth.issuer.as_str() {
            "" => &self.public_url,
            issuer => issuer,
        }
    }

    /// Resource identifier of the protected API
    pub fn resource(&self) -> String {
        format!("{}/v1", self.public_url)
    }

    /// URL advertised in `WWW-Authenticate` challenges
    pub fn resource_metadata_url(&self) -> String {
        resource_metadata_url(&self.public_url)
    }
}
