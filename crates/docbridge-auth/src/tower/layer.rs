//! Tower Layer for bearer authentication.

use std::sync::Arc;

use tower::Layer;

use super::BearerAuthConfig;
use super::service::BearerAuthService;
use crate::verifier::BearerVerifier;

/// Tower Layer that adds bearer token verification to a service.
///
/// # Type Parameters
///
/// * `V` - The verifier resolving tokens to principals
#[derive(Debug)]
pub struct BearerAuthLayer<V> {
    verifier: Arc<V>,
    config: BearerAuthConfig,
}

impl<V> Clone for BearerAuthLayer<V> {
    fn clone(&self) -> Self {
        Self {
            verifier: Arc::clone(&self.verifier),
            config: self.config.clone(),
        }
    }
}

impl<V: BearerVerifier> BearerAuthLayer<V> {
    /// Create a new bearer auth layer.
    pub fn new(verifier: V, config: BearerAuthConfig) -> Self {
        Self::from_arc(Arc::new(verifier), config)
    }

    /// Create a new bearer auth layer from a shared verifier.
    pub fn from_arc(verifier: Arc<V>, config: BearerAuthConfig) -> Self {
        Self { verifier, config }
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &BearerAuthConfig {
        &self.config
    }
}

impl<S, V> Layer<S> for BearerAuthLayer<V> {
    type Service = BearerAuthService<S, V>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService::new(inner, Arc::clone(&self.verifier), self.config.clone())
    }
}
