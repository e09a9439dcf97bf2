//! Common test utilities for HTTP integration tests
//!
//! Builds the full router on in-memory stores and drives it with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::Router;
use axum::body::{Body, to_bytes};
use docbridge_auth::UpstreamConfig;
use docbridge_auth::crypto::code_challenge_s256;
use docbridge_server::{AppState, ServerConfig, build_state, router};
use http::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION};
use http::{Request, Response, StatusCode};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use url::Url;
use url::form_urlencoded;

pub const PUBLIC_URL: &str = "https://docs.example.com";
pub const REDIRECT_URI: &str = "https://app.example.com/callback";
pub const UPSTREAM: &str = "https://idp.example.com/authorize";
pub const COMPLETION_SECRET: &str = "upstream-s3cret";
pub const VERIFIER: &str = "verifier1";

/// Test application
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// Config used by every test; `with_secret` enables upstream completion
pub fn config(with_secret: bool) -> ServerConfig {
    let mut upstream = UpstreamConfig::default();
    upstream.authorization_endpoint = UPSTREAM.to_string();
    if with_secret {
        upstream.completion_secret = Some(SecretString::new(COMPLETION_SECRET.to_string()));
    }

    let mut config = ServerConfig::builder()
        .public_url(PUBLIC_URL)
        .upstream(upstream)
        .build();
    config.oauth.scopes_supported = vec!["docs:read".into(), "docs:write".into()];
    config
}

pub fn app_with(config: &ServerConfig) -> TestApp {
    let (state, _stores) = build_state(config).expect("valid test config");
    TestApp {
        router: router(state.clone()),
        state,
    }
}

pub fn app() -> TestApp {
    app_with(&config(false))
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn get_with_token(&self, uri: &str, token: &str) -> Response<Body> {
        self.send(
            Request::get(uri)
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> Response<Body> {
        self.send(
            Request::post(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_form(&self, uri: &str, fields: &[(&str, &str)]) -> Response<Body> {
        self.send(
            Request::post(uri)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(encode(fields)))
                .unwrap(),
        )
        .await
    }

    /// Register a client and return its id
    pub async fn register(&self) -> String {
        let response = self
            .post_json(
                "/register",
                &serde_json::json!({
                    "redirect_uris": [REDIRECT_URI],
                    "client_name": "integration test",
                    "grant_types": ["authorization_code", "refresh_token"]
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json(response).await["client_id"].as_str().unwrap().to_string()
    }

    /// Authorize with an S256 challenge of [`VERIFIER`] and return the code
    /// carried to the upstream
    pub async fn authorize(&self, client_id: &str, scope: &str) -> String {
        let challenge = code_challenge_s256(VERIFIER);
        let query = encode(&[
            ("response_type", "code"),
            ("client_id", client_id),
            ("redirect_uri", REDIRECT_URI),
            ("state", "xyz"),
            ("scope", scope),
            ("code_challenge", &challenge),
            ("code_challenge_method", "S256"),
        ]);
        let response = self.get(&format!("/authorize?{query}")).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        code_from_location(&response)
    }

    /// Redeem a fresh code; returns the token response body
    pub async fn tokens(&self, client_id: &str, scope: &str) -> Value {
        let code = self.authorize(client_id, scope).await;
        let response = self
            .post_form(
                "/token",
                &[
                    ("grant_type", "authorization_code"),
                    ("code", &code),
                    ("client_id", client_id),
                    ("code_verifier", VERIFIER),
                    ("redirect_uri", REDIRECT_URI),
                ],
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        json(response).await
    }
}

pub fn encode(fields: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish()
}

pub fn location(response: &Response<Body>) -> Url {
    let location = response.headers()[LOCATION].to_str().unwrap();
    Url::parse(location).unwrap()
}

pub fn code_from_location(response: &Response<Body>) -> String {
    location(response)
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .expect("upstream URL carries the code")
}

pub async fn json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
