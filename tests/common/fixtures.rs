//! Test state factories and router helpers
//!
//! Not every helper is used by every test binary.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response, header};
use axum::Router;
use chrono::Duration;
use cli_handoff::clock::ManualClock;
use cli_handoff::handoff::HandoffService;
use cli_handoff::server::{AppState, NoIdentity, ServerConfig, StaticIdentity, router};
use cli_handoff::token::SeededRandom;
use cli_handoff::types::Identity;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// The signed-in user in most tests
pub fn alice() -> Identity {
    Identity::new("u-alice", "alice")
}

/// Router whose browser requests are all signed in as `identity` (or nobody)
///
/// Pending logins live 10 minutes, tokens 5 minutes, on a manual clock.
pub fn test_app(identity: Option<Identity>) -> (Router, Arc<ManualClock>, AppState) {
    test_app_with_config(identity, ServerConfig::default())
}

pub fn test_app_with_config(
    identity: Option<Identity>,
    config: ServerConfig,
) -> (Router, Arc<ManualClock>, AppState) {
    let clock = Arc::new(ManualClock::default());
    let handoff = Arc::new(HandoffService::new(
        clock.clone(),
        Arc::new(SeededRandom::new(7)),
        Duration::minutes(10),
        Duration::minutes(5),
    ));
    let state = match identity {
        Some(identity) => AppState::new(config, handoff, Arc::new(StaticIdentity::new(identity))),
        None => AppState::new(config, handoff, Arc::new(NoIdentity)),
    };
    (router(state.clone()), clock, state)
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: &Value) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn post_empty(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(Request::post(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn with_bearer(app: &Router, method: &str, uri: &str, token: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}
