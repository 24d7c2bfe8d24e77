//! Transcript message model.
//!
//! Constructors take `SystemTime` explicitly; callers own the clock.
//! A `MessageDraft` has no id; the transcript assigns one on append and the
//! resulting `Message` is immutable.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{ImageAttachment, MessageId, ToolCall, ToolResult};

/// Who a transcript entry is attributed to in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayRole {
    User,
    Model,
    System,
    Tool,
}

impl DisplayRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DisplayRole::User => "user",
            DisplayRole::Model => "model",
            DisplayRole::System => "system",
            DisplayRole::Tool => "tool",
        }
    }
}

/// Role of a `contents` entry on the backend wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    User,
    Model,
}

impl WireRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            WireRole::User => "user",
            WireRole::Model => "model",
        }
    }
}

/// A message waiting to be appended.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    role: DisplayRole,
    text: String,
    timestamp: SystemTime,
    attachments: Vec<ImageAttachment>,
    function_calls: Vec<ToolCall>,
    function_responses: Vec<ToolResult>,
}

impl MessageDraft {
    #[must_use]
    pub fn new(role: DisplayRole, text: impl Into<String>, timestamp: SystemTime) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp,
            attachments: Vec::new(),
            function_calls: Vec::new(),
            function_responses: Vec::new(),
        }
    }

    #[must_use]
    pub fn user(text: impl Into<String>, timestamp: SystemTime) -> Self {
        Self::new(DisplayRole::User, text, timestamp)
    }

    #[must_use]
    pub fn model(text: impl Into<String>, timestamp: SystemTime) -> Self {
        Self::new(DisplayRole::Model, text, timestamp)
    }

    #[must_use]
    pub fn system(text: impl Into<String>, timestamp: SystemTime) -> Self {
        Self::new(DisplayRole::System, text, timestamp)
    }

    #[must_use]
    pub fn tool(text: impl Into<String>, timestamp: SystemTime) -> Self {
        Self::new(DisplayRole::Tool, text, timestamp)
    }

    pub fn with_attachment(mut self, image: ImageAttachment) -> Self {
        self.attachments.push(image);
        self
    }

    pub fn with_function_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.function_calls = calls;
        self
    }

    pub fn with_function_responses(mut self, results: Vec<ToolResult>) -> Self {
        self.function_responses = results;
        self
    }

    #[must_use]
    pub fn role(&self) -> DisplayRole {
        self.role
    }

    /// Freeze the draft under the id the transcript allocated.
    #[must_use]
    pub fn into_message(self, id: MessageId) -> Message {
        Message {
            id,
            role: self.role,
            text: self.text,
            timestamp: self.timestamp,
            attachments: self.attachments,
            function_calls: self.function_calls,
            function_responses: self.function_responses,
        }
    }
}

/// An appended transcript entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: MessageId,
    role: DisplayRole,
    text: String,
    timestamp: SystemTime,
    attachments: Vec<ImageAttachment>,
    function_calls: Vec<ToolCall>,
    function_responses: Vec<ToolResult>,
}

impl Message {
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.id
    }

    #[must_use]
    pub fn role(&self) -> DisplayRole {
        self.role
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Milliseconds since the Unix epoch; clocks before the epoch read as 0.
    #[must_use]
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    #[must_use]
    pub fn attachments(&self) -> &[ImageAttachment] {
        &self.attachments
    }

    #[must_use]
    pub fn function_calls(&self) -> &[ToolCall] {
        &self.function_calls
    }

    #[must_use]
    pub fn function_responses(&self) -> &[ToolResult] {
        &self.function_responses
    }

    /// `role: text` line used for backend context injection.
    #[must_use]
    pub fn context_line(&self) -> String {
        format!("{}: {}", self.role.as_str(), self.text)
    }
}
