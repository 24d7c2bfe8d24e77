//! Google Gemini client (GenerateContent API).

use serde_json::{Value, json};
use uuid::Uuid;

use crate::wire::{self as typed, FinishReason};
use crate::{
    ApiConfig, GatewayError, GatewayFut, GatewayRequest, ModelGateway, TurnInput,
    build_http_client, read_capped_error_body,
};
use arkaios_types::{Message, ModelTurn, ToolCall, ToolDefinition, WireRole};

#[derive(Debug, Clone)]
pub struct GeminiGateway {
    config: ApiConfig,
    client: reqwest::Client,
}

impl GeminiGateway {
    pub fn new(config: ApiConfig) -> Result<Self, GatewayError> {
        let client = build_http_client(config.base_url()).map_err(GatewayError::Transport)?;
        Ok(Self { config, client })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn generate(&self, request: GatewayRequest<'_>) -> Result<ModelTurn, GatewayError> {
        let api_key = self.config.api_key();
        if api_key.is_empty() {
            return Err(GatewayError::Unauthorized {
                message: "no API key configured (set GEMINI_API_KEY)".to_string(),
            });
        }

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url(),
            self.config.model()
        );
        let body = build_request_body(&self.config, &request);
        tracing::debug!(
            model = self.config.model(),
            history = request.history.len(),
            continuation = matches!(request.input, TurnInput::Continuation(_)),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key.expose_secret())
            .timeout(self.config.request_timeout())
            .json(&body)
            .send()
            .await
            .map_err(GatewayError::Transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let body = read_capped_error_body(response).await;
            return Err(GatewayError::Unauthorized {
                message: format!("HTTP {}: {body}", status.as_u16()),
            });
        }
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(GatewayError::Transport)?;
        parse_response(&bytes)
    }
}

impl ModelGateway for GeminiGateway {
    fn send<'a>(&'a self, request: GatewayRequest<'a>) -> GatewayFut<'a> {
        Box::pin(self.generate(request))
    }
}

/// Build a content part for Gemini API.
fn text_part(text: &str) -> Value {
    json!({ "text": text })
}

fn remove_additional_properties(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("additionalProperties");
            for value in map.values_mut() {
                remove_additional_properties(value);
            }
        }
        Value::Array(values) => {
            for value in values {
                remove_additional_properties(value);
            }
        }
        _ => {}
    }
}

/// Prefix `task` with the last `window` history entries as `role: text` lines.
pub(crate) fn context_prompt(history: &[Message], task: &str, window: usize) -> String {
    let start = history.len().saturating_sub(window);
    let recent = &history[start..];
    if recent.is_empty() {
        return task.to_string();
    }
    let lines: Vec<String> = recent.iter().map(Message::context_line).collect();
    format!("Context:\n{}\n\nCurrent Task: {task}", lines.join("\n"))
}

fn function_declarations(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            let mut parameters = tool.parameters.clone();
            remove_additional_properties(&mut parameters);
            json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": parameters
            })
        })
        .collect()
}

/// Build the request body for Gemini API.
///
/// Note: Gemini API uses mixed casing:
/// - `system_instruction` (snake_case)
/// - `generationConfig` (camelCase)
/// - `contents`, `tools` (lowercase)
pub(crate) fn build_request_body(config: &ApiConfig, request: &GatewayRequest<'_>) -> Value {
    let window = config.context_messages();
    let contents: Vec<Value> = match request.input {
        TurnInput::Fresh(fresh) => {
            let mut parts = Vec::new();
            if let Some(image) = fresh.image() {
                parts.push(json!({
                    "inlineData": {
                        "mimeType": image.mime_type(),
                        "data": image.base64_data()
                    }
                }));
            }
            parts.push(text_part(&context_prompt(
                request.history,
                fresh.prompt(),
                window,
            )));
            vec![json!({ "role": WireRole::User.as_str(), "parts": parts })]
        }
        TurnInput::Continuation(continuation) => {
            let calls: Vec<Value> = continuation
                .exchanges()
                .iter()
                .map(|exchange| {
                    let mut part = serde_json::Map::new();
                    part.insert(
                        "functionCall".into(),
                        json!({
                            "name": exchange.call.name,
                            "args": exchange.call.arguments
                        }),
                    );
                    if let Some(signature) = &exchange.call.thought_signature {
                        part.insert("thoughtSignature".into(), json!(signature));
                    }
                    Value::Object(part)
                })
                .collect();
            let responses: Vec<Value> = continuation
                .exchanges()
                .iter()
                .map(|exchange| {
                    json!({
                        "functionResponse": {
                            "name": exchange.result.tool_name,
                            "response": { "result": exchange.result.content }
                        }
                    })
                })
                .collect();
            vec![
                json!({
                    "role": WireRole::User.as_str(),
                    "parts": [text_part(&context_prompt(request.history, continuation.task(), window))]
                }),
                json!({ "role": WireRole::Model.as_str(), "parts": calls }),
                json!({ "role": WireRole::User.as_str(), "parts": responses }),
            ]
        }
    };

    let mut body = json!({
        "contents": contents,
        "generationConfig": {
            "temperature": config.temperature(),
            "maxOutputTokens": config.max_output_tokens()
        }
    });

    if let Some(prompt) = config.system_prompt() {
        body["system_instruction"] = json!({ "parts": [text_part(prompt)] });
    }
    if !request.tools.is_empty() {
        body["tools"] = json!([{ "functionDeclarations": function_declarations(request.tools) }]);
    }
    body
}

/// Normalize a `generateContent` response body into a `ModelTurn`.
pub(crate) fn parse_response(bytes: &[u8]) -> Result<ModelTurn, GatewayError> {
    let response: typed::Response = serde_json::from_slice(bytes)
        .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(GatewayError::Api {
            message: error.message_or_default().to_string(),
        });
    }
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(GatewayError::Blocked { reason });
    }
    if let Some(usage) = &response.usage_metadata {
        tracing::debug!(
            input_tokens = usage.prompt_token_count,
            output_tokens = usage.candidates_token_count,
            "Gemini usage"
        );
    }

    let candidate = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .ok_or_else(|| GatewayError::MalformedResponse("response has no candidates".to_string()))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in candidate
        .content
        .and_then(|content| content.parts)
        .unwrap_or_default()
    {
        if let Some(part_text) = part.text
            && !part.thought
        {
            text.push_str(&part_text);
        }
        if let Some(func_call) = part.function_call {
            let name = func_call.name.unwrap_or_default();
            if name.is_empty() {
                tracing::warn!("Gemini function call with empty name, skipping");
                continue;
            }
            // Gemini doesn't provide call ids
            let id = format!("call_{}", Uuid::new_v4());
            let mut call = ToolCall::new(id, name, func_call.args.unwrap_or(json!({})));
            if let Some(signature) = part.thought_signature.filter(|sig| !sig.is_empty()) {
                call = call.with_thought_signature(signature);
            }
            tool_calls.push(call);
        }
    }

    if text.is_empty() && tool_calls.is_empty()
        && let Some(message) = candidate
            .finish_reason
            .as_deref()
            .map(FinishReason::parse)
            .and_then(FinishReason::error_message)
    {
        return Err(GatewayError::Blocked {
            reason: message.to_string(),
        });
    }

    Ok(ModelTurn {
        text: (!text.is_empty()).then_some(text),
        tool_calls,
    })
}
