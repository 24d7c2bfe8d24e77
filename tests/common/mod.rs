//! Shared test utilities and fixtures
//!
//! A `wiremock` server standing in for the Gemini `generateContent` endpoint.

#![allow(dead_code)]

use arkaios_providers::ApiConfig;
use arkaios_types::ApiKey;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_MODEL: &str = "gemini-2.5-flash";
pub const TEST_KEY: &str = "test-key";
pub const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

/// Eight-byte PNG signature plus padding; enough for attachment validation.
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

pub async fn start_gemini_mock() -> MockServer {
    MockServer::start().await
}

pub fn gemini_config(server: &MockServer) -> ApiConfig {
    ApiConfig::new(ApiKey::new(TEST_KEY), TEST_MODEL)
        .with_base_url(format!("{}/v1beta", server.uri()))
}

pub fn text_response(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 5 }
    })
}

pub fn function_call_response(name: &str, args: Value) -> Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{ "functionCall": { "name": name, "args": args } }]
            },
            "finishReason": "STOP"
        }]
    })
}

/// Answer the next `times` generate calls with `body`.
///
/// Mocks registered earlier win while they still have uses left, so
/// mounting in call order scripts a multi-step chain.
pub async fn mount_json(server: &MockServer, body: Value, times: u64) {
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", TEST_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// JSON bodies of every request the mock received, in order.
pub async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}
