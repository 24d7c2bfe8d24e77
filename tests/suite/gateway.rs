//! GeminiGateway against a mocked generateContent endpoint

use arkaios_providers::{
    ApiConfig, FreshInput, GatewayError, GatewayRequest, GeminiGateway, ModelGateway, TurnInput,
};
use arkaios_types::{ApiKey, ImageAttachment, ToolDefinition};
use serde_json::json;

use crate::common::{
    PNG_BYTES, TEST_MODEL, function_call_response, gemini_config, mount_json, mount_status,
    request_bodies, start_gemini_mock, text_response,
};

fn fresh(prompt: &str) -> TurnInput {
    TurnInput::Fresh(FreshInput::new(prompt, None).unwrap())
}

fn list_files_tool() -> ToolDefinition {
    ToolDefinition::new(
        "list_files",
        "List the workspace root",
        json!({ "type": "object", "properties": {}, "additionalProperties": false }),
    )
}

#[tokio::test]
async fn text_response_is_normalized() {
    let server = start_gemini_mock().await;
    mount_json(&server, text_response("Hello from Gemini"), 1).await;
    let gateway = GeminiGateway::new(gemini_config(&server)).unwrap();

    let input = fresh("hi");
    let turn = gateway
        .send(GatewayRequest {
            history: &[],
            input: &input,
            tools: &[],
        })
        .await
        .unwrap();

    assert_eq!(turn.text.as_deref(), Some("Hello from Gemini"));
    assert!(turn.tool_calls.is_empty());

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert_eq!(body["generationConfig"]["temperature"], json!(0.7));
    assert_eq!(body["generationConfig"]["maxOutputTokens"], json!(2048));
    assert_eq!(body["contents"][0]["role"], "user");
    assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
    assert!(body.get("tools").is_none());
}

#[tokio::test]
async fn function_call_gets_local_id_and_tools_are_declared() {
    let server = start_gemini_mock().await;
    mount_json(
        &server,
        function_call_response("read_file", json!({ "fileName": "a.txt" })),
        1,
    )
    .await;
    let gateway = GeminiGateway::new(gemini_config(&server)).unwrap();

    let input = fresh("open a.txt");
    let tools = [list_files_tool()];
    let turn = gateway
        .send(GatewayRequest {
            history: &[],
            input: &input,
            tools: &tools,
        })
        .await
        .unwrap();

    assert!(turn.text.is_none());
    assert_eq!(turn.tool_calls.len(), 1);
    let call = &turn.tool_calls[0];
    assert_eq!(call.name, "read_file");
    assert_eq!(call.arguments, json!({ "fileName": "a.txt" }));
    assert!(call.id.starts_with("call_"));

    let body = &request_bodies(&server).await[0];
    let declaration = &body["tools"][0]["functionDeclarations"][0];
    assert_eq!(declaration["name"], "list_files");
    assert!(declaration["parameters"].get("additionalProperties").is_none());
}

#[tokio::test]
async fn image_is_sent_inline_before_text() {
    let server = start_gemini_mock().await;
    mount_json(&server, text_response("A terminal window."), 1).await;
    let gateway = GeminiGateway::new(gemini_config(&server)).unwrap();

    let image = ImageAttachment::from_png_bytes(PNG_BYTES).unwrap();
    let input = TurnInput::Fresh(FreshInput::new("What is this?", Some(image)).unwrap());
    gateway
        .send(GatewayRequest {
            history: &[],
            input: &input,
            tools: &[],
        })
        .await
        .unwrap();

    let body = &request_bodies(&server).await[0];
    let parts = body["contents"][0]["parts"].as_array().unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
    assert!(parts[0]["inlineData"]["data"].as_str().unwrap().starts_with("iVBORw0KGgo"));
    assert_eq!(parts[1]["text"], "What is this?");
}

#[tokio::test]
async fn unauthorized_status_is_typed() {
    let server = start_gemini_mock().await;
    mount_status(&server, 403, r#"{"error":{"message":"API key not valid"}}"#).await;
    let gateway = GeminiGateway::new(gemini_config(&server)).unwrap();

    let input = fresh("hi");
    let err = gateway
        .send(GatewayRequest {
            history: &[],
            input: &input,
            tools: &[],
        })
        .await
        .unwrap_err();

    match err {
        GatewayError::Unauthorized { message } => assert!(message.contains("API key not valid")),
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_status_is_http() {
    let server = start_gemini_mock().await;
    mount_status(&server, 503, "overloaded").await;
    let gateway = GeminiGateway::new(gemini_config(&server)).unwrap();

    let input = fresh("hi");
    let err = gateway
        .send(GatewayRequest {
            history: &[],
            input: &input,
            tools: &[],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Http { status: 503, ref body } if body == "overloaded"));
}

#[tokio::test]
async fn missing_key_fails_without_a_request() {
    let server = start_gemini_mock().await;
    mount_json(&server, text_response("unreachable"), 1).await;
    let config = ApiConfig::new(ApiKey::default(), TEST_MODEL)
        .with_base_url(format!("{}/v1beta", server.uri()));
    let gateway = GeminiGateway::new(config).unwrap();

    let input = fresh("hi");
    let err = gateway
        .send(GatewayRequest {
            history: &[],
            input: &input,
            tools: &[],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Unauthorized { .. }));
    assert!(request_bodies(&server).await.is_empty());
}

#[tokio::test]
async fn blocked_prompt_is_reported() {
    let server = start_gemini_mock().await;
    mount_json(
        &server,
        json!({ "promptFeedback": { "blockReason": "SAFETY" } }),
        1,
    )
    .await;
    let gateway = GeminiGateway::new(gemini_config(&server)).unwrap();

    let input = fresh("hi");
    let err = gateway
        .send(GatewayRequest {
            history: &[],
            input: &input,
            tools: &[],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Blocked { ref reason } if reason == "SAFETY"));
}
