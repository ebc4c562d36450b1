//! Common test utilities for n8n-relay-api integration tests
//!
//! Every test gets its own wiremock server standing in for n8n, wired to the
//! real `HttpWebhookForwarder`.

use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::Response,
    Router,
};
use n8n_relay_api::{
    create_router, AppState, HttpWebhookForwarder, N8nConfig, ServiceConfig, ServiceMetrics,
};
use n8n_relay_core::{DingTalkSignatureVerifier, Timestamp};
use serde_json::Value;
use std::sync::Arc;
use wiremock::MockServer;

pub const TEST_SECRET: &str = "integration-secret";
pub const QUERY_PATH: &str = "/webhook/chat";
pub const DINGTALK_PATH: &str = "/webhook/ding_talk";
pub const HEALTH_PATH: &str = "/healthz";

/// A router wired to a mock n8n.
pub struct TestRelay {
    pub n8n: MockServer,
    pub app: Router,
}

impl TestRelay {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start with the n8n settings adjusted by `customize`.
    pub async fn start_with(customize: impl FnOnce(&mut N8nConfig)) -> Self {
        let n8n = MockServer::start().await;

        let mut config = ServiceConfig::default();
        config.dingtalk.app_secret = TEST_SECRET.to_string();
        config.n8n = N8nConfig {
            query_webhook_url: format!("{}{}", n8n.uri(), QUERY_PATH),
            dingtalk_webhook_url: format!("{}{}", n8n.uri(), DINGTALK_PATH),
            health_url: Some(format!("{}{}", n8n.uri(), HEALTH_PATH)),
            request_timeout_seconds: None,
        };
        customize(&mut config.n8n);

        let forwarder = HttpWebhookForwarder::new(config.n8n.clone()).unwrap();
        let metrics = Arc::new(ServiceMetrics::new().unwrap());
        let state = AppState::new(config, Arc::new(forwarder), metrics);

        Self {
            n8n,
            app: create_router(state),
        }
    }
}

#[allow(dead_code)]
pub fn query_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/n8n/query")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A DingTalk callback request signed with [`TEST_SECRET`] at `timestamp`.
#[allow(dead_code)]
pub fn signed_dingtalk_request(timestamp: i64, body: &Value) -> Request<Body> {
    let timestamp = timestamp.to_string();
    let sign = DingTalkSignatureVerifier::new(TEST_SECRET)
        .generate_sign(&timestamp)
        .unwrap();

    Request::builder()
        .method("POST")
        .uri("/dingTalk/getMsg")
        .header("content-type", "application/json")
        .header("sign", sign)
        .header("timestamp", timestamp)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn now_millis() -> i64 {
    Timestamp::now().epoch_millis()
}

#[allow(dead_code)]
pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub async fn text_body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
