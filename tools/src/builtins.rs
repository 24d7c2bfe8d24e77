//! Built-in tool executors.

use serde::Deserialize;
use tokio::io::AsyncReadExt;

use super::{
    ToolError, ToolExecutor, ToolFut, ToolRegistry, ToolSettings, Workspace, parse_args,
    truncate_output,
};

/// Listing result for a directory with no children.
pub const EMPTY_DIRECTORY: &str = "(Empty Directory)";

/// Leading bytes inspected for NUL when deciding a file is binary.
const BINARY_SNIFF_BYTES: usize = 8192;

#[derive(Debug, Default)]
pub struct ListFilesTool;

#[derive(Debug)]
pub struct ReadFileTool {
    max_read_bytes: usize,
}

impl ReadFileTool {
    #[must_use]
    pub fn new(max_read_bytes: usize) -> Self {
        Self { max_read_bytes }
    }
}

#[derive(Debug, Default)]
pub struct WriteFileTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadFileArgs {
    file_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteFileArgs {
    file_name: String,
    content: String,
}

fn io_error(name: &str) -> impl FnOnce(std::io::Error) -> ToolError {
    move |source| ToolError::Io {
        name: name.to_string(),
        source,
    }
}

impl ToolExecutor for ListFilesTool {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn description(&self) -> &'static str {
        "List the files and directories at the root of the mounted workspace"
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    fn is_side_effecting(&self) -> bool {
        false
    }

    fn execute<'a>(&'a self, _args: serde_json::Value, workspace: &'a Workspace) -> ToolFut<'a> {
        Box::pin(async move {
            let root = workspace.root();
            let mut dir = tokio::fs::read_dir(root)
                .await
                .map_err(io_error(workspace.display_path()))?;

            let mut entries: Vec<(String, bool)> = Vec::new();
            while let Some(entry) = dir
                .next_entry()
                .await
                .map_err(io_error(workspace.display_path()))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                let kind = entry.file_type().await.map_err(io_error(&name))?;
                let is_dir = if kind.is_symlink() {
                    // Tag by target; a dangling link lists as a file.
                    tokio::fs::metadata(entry.path())
                        .await
                        .is_ok_and(|meta| meta.is_dir())
                } else {
                    kind.is_dir()
                };
                entries.push((name, is_dir));
            }

            if entries.is_empty() {
                return Ok(EMPTY_DIRECTORY.to_string());
            }
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(entries
                .iter()
                .map(|(name, is_dir)| {
                    let tag = if *is_dir { "[DIR]" } else { "[FILE]" };
                    format!("{tag} {name}")
                })
                .collect::<Vec<_>>()
                .join("\n"))
        })
    }
}

impl ToolExecutor for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read the full text of a file in the mounted workspace"
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "fileName": { "type": "string", "description": "File name relative to the workspace root" }
            },
            "required": ["fileName"]
        })
    }

    fn is_side_effecting(&self) -> bool {
        false
    }

    fn execute<'a>(&'a self, args: serde_json::Value, workspace: &'a Workspace) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: ReadFileArgs = parse_args(&args)?;
            let path = workspace.resolve(&typed.file_name)?;
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(io_error(&typed.file_name))?;
            let total = file
                .metadata()
                .await
                .map_err(io_error(&typed.file_name))?
                .len();

            // One byte past the cap is enough to know truncation is needed.
            let limit = u64::try_from(self.max_read_bytes)
                .unwrap_or(u64::MAX)
                .saturating_add(1);
            let mut bytes = Vec::new();
            file.take(limit)
                .read_to_end(&mut bytes)
                .await
                .map_err(io_error(&typed.file_name))?;

            if bytes.iter().take(BINARY_SNIFF_BYTES).any(|&b| b == 0) {
                return Ok(format!(
                    "Binary file {} ({total} bytes); content not shown",
                    typed.file_name.trim()
                ));
            }
            let text = String::from_utf8_lossy(&bytes).into_owned();
            Ok(truncate_output(text, self.max_read_bytes))
        })
    }
}

impl ToolExecutor for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Create or overwrite a file in the mounted workspace, creating directories as needed"
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "fileName": { "type": "string", "description": "File name relative to the workspace root" },
                "content": { "type": "string", "description": "Full file content to write" }
            },
            "required": ["fileName", "content"],
            "additionalProperties": false
        })
    }

    fn is_side_effecting(&self) -> bool {
        true
    }

    fn execute<'a>(&'a self, args: serde_json::Value, workspace: &'a Workspace) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: WriteFileArgs = parse_args(&args)?;
            let path = workspace.resolve(&typed.file_name)?;
            if let Some(parent) = path.parent()
                && !parent.exists()
            {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(io_error(&typed.file_name))?;
            }

            let byte_len = typed.content.len();
            tokio::fs::write(&path, typed.content.as_bytes())
                .await
                .map_err(io_error(&typed.file_name))?;
            tracing::info!(file = %typed.file_name, bytes = byte_len, "Wrote workspace file");
            Ok(format!(
                "Successfully wrote {byte_len} bytes to {}",
                typed.file_name.trim()
            ))
        })
    }
}

pub fn register_builtins(
    registry: &mut ToolRegistry,
    settings: ToolSettings,
) -> Result<(), ToolError> {
    registry.register(Box::new(ListFilesTool))?;
    registry.register(Box::new(ReadFileTool::new(settings.max_read_bytes)))?;
    registry.register(Box::new(WriteFileTool))?;
    Ok(())
}
