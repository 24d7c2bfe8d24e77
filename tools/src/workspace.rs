//! Mounted workspace handle.
//!
//! A `Workspace` is a capability over one local directory. It is cheap to
//! clone; the session clones it into each tool batch so a remount during a
//! running batch does not affect that batch.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::ToolError;

/// Host-granted access to the mounted directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Granted,
    Denied,
    Prompt,
}

impl AccessLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Granted => "granted",
            AccessLevel::Denied => "denied",
            AccessLevel::Prompt => "prompt",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("cannot open workspace {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("workspace path is not a directory: {0}")]
    NotADirectory(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    display_path: String,
    access: AccessLevel,
}

impl Workspace {
    /// Canonicalize `path` and check what the process may do there.
    ///
    /// Directories the process can create files in are `granted`, other
    /// listable ones `prompt`, and directories whose entries cannot be
    /// listed `denied`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let path = path.as_ref();
        let root = std::fs::canonicalize(path).map_err(|source| WorkspaceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let meta = std::fs::metadata(&root).map_err(|source| WorkspaceError::Open {
            path: root.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(WorkspaceError::NotADirectory(root));
        }

        let access = if std::fs::read_dir(&root).is_err() {
            AccessLevel::Denied
        } else if can_create_files(&root) {
            AccessLevel::Granted
        } else {
            AccessLevel::Prompt
        };
        tracing::info!(root = %root.display(), %access, "Workspace opened");
        Ok(Self::with_access(root, access))
    }

    /// Handle with an access level decided by the host.
    #[must_use]
    pub fn with_access(root: impl Into<PathBuf>, access: AccessLevel) -> Self {
        let root = root.into();
        Self {
            display_path: root.display().to_string(),
            root,
            access,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn display_path(&self) -> &str {
        &self.display_path
    }

    #[must_use]
    pub fn access(&self) -> AccessLevel {
        self.access
    }

    pub fn ensure_granted(&self) -> Result<(), ToolError> {
        match self.access {
            AccessLevel::Granted => Ok(()),
            access => Err(ToolError::AccessNotGranted { access }),
        }
    }

    /// Resolve a model-supplied file name against the root.
    ///
    /// Only plain relative names are accepted: no absolute paths, no `..`.
    /// Every existing component that is a symlink must resolve inside the
    /// root. Dangling symlinks are refused.
    pub fn resolve(&self, file_name: &str) -> Result<PathBuf, ToolError> {
        let trimmed = file_name.trim();
        let invalid = |reason: &str| ToolError::InvalidPath {
            name: file_name.to_string(),
            reason: reason.to_string(),
        };
        if trimmed.is_empty() {
            return Err(invalid("must not be empty"));
        }

        let mut relative = PathBuf::new();
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                Component::ParentDir => return Err(invalid("'..' is not allowed")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("must be relative to the workspace root"));
                }
            }
        }
        if relative.as_os_str().is_empty() {
            return Err(invalid("does not name a file"));
        }

        if !self.confine(&relative) {
            return Err(invalid("resolves outside the workspace"));
        }
        Ok(self.root.join(&relative))
    }

    /// Walk `relative` from the root, following symlinks one at a time.
    fn confine(&self, relative: &Path) -> bool {
        let Ok(root) = std::fs::canonicalize(&self.root) else {
            return false;
        };
        let mut current = root.clone();
        for part in relative.components() {
            current.push(part);
            let meta = match std::fs::symlink_metadata(&current) {
                Ok(meta) => meta,
                // Nothing below a missing component can exist yet.
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return true,
                Err(_) => return false,
            };
            if meta.file_type().is_symlink() {
                match std::fs::canonicalize(&current) {
                    Ok(target) if target.starts_with(&root) => current = target,
                    _ => return false,
                }
            }
        }
        true
    }
}

/// Create and remove a scratch file in `root`.
fn can_create_files(root: &Path) -> bool {
    let scratch = root.join(format!(".arkaios-access-{}", std::process::id()));
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&scratch)
    {
        Ok(file) => {
            drop(file);
            if let Err(err) = std::fs::remove_file(&scratch) {
                tracing::warn!(
                    path = %scratch.display(),
                    error = %err,
                    "Failed to remove access check file"
                );
            }
            true
        }
        Err(_) => false,
    }
}
