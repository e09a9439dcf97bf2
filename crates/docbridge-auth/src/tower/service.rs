//! Tower Service for bearer authentication.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{HeaderMap, HeaderValue, StatusCode};
use tower_service::Service;
use tracing::{debug, error};

use super::BearerAuthConfig;
use crate::error::AuthError;
use crate::server::{BearerTokenValidator, WwwAuthenticateBuilder};
use crate::verifier::BearerVerifier;

/// Tower Service that verifies the bearer token before calling the inner service.
///
/// On success the [`Principal`](crate::Principal) is inserted into the
/// request's extensions.
#[derive(Debug)]
pub struct BearerAuthService<S, V> {
    inner: S,
    verifier: Arc<V>,
    config: BearerAuthConfig,
}

impl<S: Clone, V> Clone for BearerAuthService<S, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            verifier: Arc::clone(&self.verifier),
            config: self.config.clone(),
        }
    }
}

impl<S, V> BearerAuthService<S, V> {
    /// Create a new bearer auth service.
    pub fn new(inner: S, verifier: Arc<V>, config: BearerAuthConfig) -> Self {
        Self {
            inner,
            verifier,
            config,
        }
    }
}

/// Future type for [`BearerAuthService`].
pub type BearerAuthServiceFuture<T, E> = BoxFuture<'static, Result<T, E>>;

impl<S, V, B, ResBody> Service<http::Request<B>> for BearerAuthService<S, V>
where
    S: Service<http::Request<B>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    V: BearerVerifier,
    B: Send + 'static,
    ResBody: From<String> + Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = BearerAuthServiceFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<B>) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone behind.
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);

        if self.config.should_bypass(req.uri().path()) {
            return Box::pin(async move { inner.call(req).await });
        }

        let token = extract_token(req.headers());
        let verifier = Arc::clone(&self.verifier);
        let config = self.config.clone();

        Box::pin(async move {
            let token = match token {
                Ok(token) => token,
                Err(err) => {
                    debug!(path = %req.uri().path(), "request without usable bearer token");
                    return Ok(challenge(&config, &err));
                }
            };

            match verifier.verify(&token).await {
                Ok(principal) => {
                    req.extensions_mut().insert(principal);
                    inner.call(req).await
                }
                Err(err) if err.is_server_error() => {
                    error!(error = %err, "bearer verification failed on the server side");
                    Ok(json_response(StatusCode::INTERNAL_SERVER_ERROR, &err, None))
                }
                Err(err) => Ok(challenge(&config, &err)),
            }
        })
    }
}

fn extract_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::InvalidToken("missing bearer token"))?
        .to_str()
        .map_err(|_| AuthError::InvalidToken("Authorization header is not valid ASCII"))?;
    BearerTokenValidator::extract_from_header(value)
}

fn challenge<ResBody: From<String>>(config: &BearerAuthConfig, err: &AuthError) -> http::Response<ResBody> {
    let mut header = WwwAuthenticateBuilder::new(config.resource_metadata_url.clone())
        .with_error(err.error_code(), Some(err.description().to_string()));
    if let Some(scope) = &config.required_scope {
        header = header.with_scope(scope.clone());
    }
    json_response(StatusCode::UNAUTHORIZED, err, Some(header.build()))
}

fn json_response<ResBody: From<String>>(
    status: StatusCode,
    err: &AuthError,
    www_authenticate: Option<String>,
) -> http::Response<ResBody> {
    let body = serde_json::to_string(&err.to_response()).unwrap_or_default();
    let mut response = http::Response::new(ResBody::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(value) = www_authenticate.and_then(|v| HeaderValue::from_str(&v).ok()) {
        response.headers_mut().insert(WWW_AUTHENTICATE, value);
    }
    response
}
