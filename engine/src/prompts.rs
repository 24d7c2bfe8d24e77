//! Built-in prompt text and fixed transcript wording.

/// Persona sent as the system instruction unless config overrides it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are the Arkaios Neural Agent (ANA), an assistant integrated into the user's desktop.
Your primary function is to analyze visual data (screen captures) and help with complex tasks.
Keep a concise, technical and helpful tone.
When analyzing screenshots, be specific about the UI elements, code and text that are visible.
If a screenshot contains code, answer with the fix or refactor as text.
When a workspace directory is mounted you can inspect and edit it with the list_files,
read_file and write_file tools. File names are relative to the workspace root.";

/// First MODEL entry shown when a session starts.
pub const DEFAULT_GREETING: &str =
    "Arkaios link initialized. System ready. Share a screen capture or ask a question.";

/// Prompt used when the user sends only an image.
pub const DEFAULT_IMAGE_ONLY_PROMPT: &str = "Analyze this screen context.";

/// MODEL entry appended when a terminal turn carries no text.
pub const EMPTY_RESPONSE_TEXT: &str = "The model returned no text response.";

pub const GATEWAY_ERROR_PREFIX: &str = "Error connecting to model backend: ";

/// SYSTEM entry for a tool batch whose results cannot be matched to its calls.
pub const TOOL_PAIRING_ERROR_TEXT: &str =
    "Internal error: tool results did not match the requested calls. Send a new message to retry.";

#[must_use]
pub fn executing_tools_text(names: &[&str]) -> String {
    format!("Executing tools: {}", names.join(", "))
}

#[must_use]
pub fn chain_depth_exceeded_text(max_rounds: u32) -> String {
    format!(
        "Tool chain stopped: the model kept requesting tools after {max_rounds} rounds. \
         Send a new message to continue."
    )
}
