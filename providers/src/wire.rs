//! Typed Gemini `generateContent` response.
//!
//! Only the fields the gateway reads are modelled; everything else is ignored.

use serde::Deserialize;

/// Token usage data returned by Gemini API.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub candidates: Option<Vec<Candidate>>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub error: Option<ErrorInfo>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Content {
    pub parts: Option<Vec<Part>>,
}

/// A content part in a Gemini response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub text: Option<String>,
    /// Set on reasoning summaries, which are never shown as answer text.
    #[serde(default)]
    pub thought: bool,
    pub function_call: Option<FunctionCall>,
    /// Accompanies a `functionCall` part on thinking models.
    pub thought_signature: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionCall {
    pub name: Option<String>,
    pub args: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorInfo {
    pub message: Option<String>,
    pub code: Option<i32>,
    pub status: Option<String>,
}

impl ErrorInfo {
    #[must_use]
    pub fn message_or_default(&self) -> &str {
        self.message.as_deref().unwrap_or("Unknown error")
    }
}

/// Known Gemini finish reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Recitation,
    Blocklist,
    ProhibitedContent,
    Spii,
    MalformedFunctionCall,
    Other,
    Unknown,
}

impl FinishReason {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "STOP" => Self::Stop,
            "MAX_TOKENS" => Self::MaxTokens,
            "SAFETY" => Self::Safety,
            "RECITATION" => Self::Recitation,
            "BLOCKLIST" => Self::Blocklist,
            "PROHIBITED_CONTENT" => Self::ProhibitedContent,
            "SPII" => Self::Spii,
            "MALFORMED_FUNCTION_CALL" => Self::MalformedFunctionCall,
            "OTHER" => Self::Other,
            _ => Self::Unknown,
        }
    }

    /// Returns error message if this is an error reason, None if success.
    #[must_use]
    pub fn error_message(self) -> Option<&'static str> {
        match self {
            Self::Stop | Self::MaxTokens | Self::Unknown => None,
            Self::Safety => Some("Content filtered by safety settings"),
            Self::Recitation => Some("Response blocked: recitation"),
            Self::Blocklist => Some("Content contains blocked terms"),
            Self::ProhibitedContent => Some("Prohibited content detected"),
            Self::Spii => Some("Sensitive PII detected"),
            Self::MalformedFunctionCall => Some("Invalid function call generated"),
            Self::Other => Some("Generation stopped: unknown reason"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FinishReason, Response};

    #[test]
    fn deserialize_text_and_function_call() {
        let json = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Listing now."},
                    {"functionCall": {"name": "list_files", "args": {}}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4, "totalTokenCount": 16}
        }"#;
        let response: Response = serde_json::from_str(json).unwrap();
        let candidates = response.candidates.unwrap();
        let parts = candidates[0].content.as_ref().unwrap().parts.as_ref().unwrap();
        assert!(parts[0].thought);
        assert_eq!(parts[1].text.as_deref(), Some("Listing now."));
        assert_eq!(
            parts[2].function_call.as_ref().unwrap().name.as_deref(),
            Some("list_files")
        );
        assert_eq!(response.usage_metadata.unwrap().total_token_count, 16);
    }

    #[test]
    fn deserialize_prompt_feedback_and_error() {
        let blocked: Response =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert_eq!(
            blocked.prompt_feedback.unwrap().block_reason.as_deref(),
            Some("SAFETY")
        );

        let error: Response = serde_json::from_str(
            r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#,
        )
        .unwrap();
        assert_eq!(error.error.unwrap().message_or_default(), "API key not valid");
    }

    #[test]
    fn finish_reason_classification() {
        assert_eq!(FinishReason::parse("STOP").error_message(), None);
        assert_eq!(FinishReason::parse("MAX_TOKENS").error_message(), None);
        assert!(FinishReason::parse("SAFETY").error_message().is_some());
        assert_eq!(FinishReason::parse("SOMETHING_NEW"), FinishReason::Unknown);
    }
}
