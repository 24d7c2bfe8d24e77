//! Tool Executor Framework - core types, registry, and batch execution.

pub mod builtins;
pub mod workspace;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use arkaios_types::{ToolCall, ToolDefinition, ToolResult};
use serde_json::Value;

pub use builtins::register_builtins;
pub use workspace::{AccessLevel, Workspace, WorkspaceError};

/// Tool execution future type alias.
pub type ToolFut<'a> = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + 'a>>;

/// Default cap on `read_file` output (256 KiB).
pub const DEFAULT_MAX_READ_BYTES: usize = 256 * 1024;

/// Result text for any tool call made while no workspace is mounted.
pub const NO_WORKSPACE_MESSAGE: &str = "Error: no workspace is mounted. Ask the user to mount a \
     workspace directory before using file tools.";

/// Error types for tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {message}")]
    BadArgs { message: String },
    #[error("no workspace mounted")]
    NoWorkspace,
    #[error("workspace access is '{access}'")]
    AccessNotGranted { access: AccessLevel },
    #[error("invalid file name '{name}': {reason}")]
    InvalidPath { name: String, reason: String },
    #[error("{name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{message}")]
    ExecutionFailed { message: String },
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("Duplicate tool registered: {name}")]
    DuplicateTool { name: String },
}

/// A named capability the model may invoke.
///
/// Implementations parse their own typed arguments and run against the
/// workspace handle captured for the current batch.
pub trait ToolExecutor: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> Value;
    fn is_side_effecting(&self) -> bool;
    fn execute<'a>(&'a self, args: Value, workspace: &'a Workspace) -> ToolFut<'a>;
}

pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::BadArgs {
        message: e.to_string(),
    })
}

/// Tool-specific settings derived from config.
#[derive(Debug, Clone, Copy)]
pub struct ToolSettings {
    pub max_read_bytes: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
        }
    }
}

/// Name-keyed registry of tool executors.
#[derive(Default)]
pub struct ToolRegistry {
    executors: HashMap<String, Box<dyn ToolExecutor>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.executors.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

impl ToolRegistry {
    /// Registry holding the built-in file tools.
    pub fn with_builtins(settings: ToolSettings) -> Result<Self, ToolError> {
        let mut registry = Self::default();
        register_builtins(&mut registry, settings)?;
        Ok(registry)
    }

    pub fn register(&mut self, executor: Box<dyn ToolExecutor>) -> Result<(), ToolError> {
        let name = executor.name().to_string();
        if self.executors.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }
        self.executors.insert(name, executor);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&dyn ToolExecutor, ToolError> {
        self.executors
            .get(name)
            .map(std::convert::AsRef::as_ref)
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
            })
    }

    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .executors
            .values()
            .map(|exec| ToolDefinition::new(exec.name(), exec.description(), exec.schema()))
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Run a batch of calls in order, one at a time.
    ///
    /// Always returns exactly one result per call, in call order. Failures
    /// become error results; they never abort the remaining calls.
    pub async fn execute_batch(
        &self,
        calls: &[ToolCall],
        workspace: Option<&Workspace>,
    ) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let result = match self.execute_one(call, workspace).await {
                Ok(output) => ToolResult::success(&call.id, &call.name, output),
                Err(err) => {
                    tracing::warn!(tool = %call.name, call_id = %call.id, error = %err, "Tool call failed");
                    tool_error_result(call, err)
                }
            };
            results.push(result);
        }
        results
    }

    async fn execute_one(
        &self,
        call: &ToolCall,
        workspace: Option<&Workspace>,
    ) -> Result<String, ToolError> {
        let exec = self.lookup(&call.name)?;
        let workspace = workspace.ok_or(ToolError::NoWorkspace)?;
        workspace.ensure_granted()?;
        tracing::debug!(
            tool = exec.name(),
            side_effecting = exec.is_side_effecting(),
            "Executing tool"
        );
        exec.execute(call.arguments.clone(), workspace).await
    }
}

/// Convert a tool failure into the text result sent back to the model.
#[must_use]
pub fn tool_error_result(call: &ToolCall, err: ToolError) -> ToolResult {
    let content = match err {
        ToolError::UnknownTool { name } => format!("Error: unsupported tool '{name}'"),
        ToolError::NoWorkspace => NO_WORKSPACE_MESSAGE.to_string(),
        ToolError::AccessNotGranted { access } => format!(
            "Error: workspace access is '{access}'. Ask the user to mount a workspace \
             with granted access before using file tools."
        ),
        other => format!("Error executing {}: {other}", call.name),
    };
    ToolResult::error(&call.id, &call.name, content)
}

/// Truncate tool output to the effective maximum length.
#[must_use]
pub fn truncate_output(output: String, effective_max: usize) -> String {
    if output.len() <= effective_max {
        return output;
    }
    let marker = "\n\n... [output truncated]";
    if effective_max <= marker.len() {
        return marker[..effective_max].to_string();
    }
    let max_body = effective_max - marker.len();
    let mut end = max_body;
    while end > 0 && !output.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = output;
    truncated.truncate(end);
    truncated.push_str(marker);
    truncated
}
