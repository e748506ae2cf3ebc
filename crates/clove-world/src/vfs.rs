//! The in-memory virtual filesystem.

use clove_core::{SyscallError, SyscallResult};
use globset::GlobBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::config::{FileMode, VfsConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VirtualFile {
    content: String,
    mode: FileMode,
}

/// An in-memory file tree seeded from world config.
///
/// Write policy, checked in order:
/// 1. an existing read-only file refuses writes;
/// 2. a path matching any readonly pattern refuses writes;
/// 3. a new path must match a writable pattern to be created;
/// 4. everything else goes through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualFs {
    files: BTreeMap<String, VirtualFile>,
    writable_patterns: Vec<String>,
    readonly_patterns: Vec<String>,
}

impl VirtualFs {
    /// Build the tree from config.
    #[must_use]
    pub fn from_config(config: &VfsConfig) -> Self {
        let files = config
            .initial_files
            .iter()
            .map(|(path, seed)| {
                (
                    path.clone(),
                    VirtualFile {
                        content: seed.content.clone(),
                        mode: seed.mode,
                    },
                )
            })
            .collect();
        Self {
            files,
            writable_patterns: config.writable_patterns.clone(),
            readonly_patterns: config.readonly_patterns.clone(),
        }
    }

    /// Read a file's content.
    ///
    /// # Errors
    ///
    /// `NotFound` when the path does not exist in the tree.
    pub fn read(&self, path: &str) -> SyscallResult<&str> {
        self.files
            .get(path)
            .map(|f| f.content.as_str())
            .ok_or_else(|| SyscallError::not_found(format!("no such file: {path}")))
    }

    /// Write or append to a file. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` when the path is read-only by file mode or by
    /// pattern, or when a new path matches no writable pattern.
    pub fn write(&mut self, path: &str, content: &str, append: bool) -> SyscallResult<usize> {
        if let Some(existing) = self.files.get(path)
            && existing.mode == FileMode::ReadOnly
        {
            return Err(SyscallError::PermissionDenied);
        }
        if matches_any(&self.readonly_patterns, path) {
            return Err(SyscallError::PermissionDenied);
        }
        let exists = self.files.contains_key(path);
        if !exists && !matches_any(&self.writable_patterns, path) {
            return Err(SyscallError::PermissionDenied);
        }

        let written = content.len();
        match self.files.get_mut(path) {
            Some(file) if append => file.content.push_str(content),
            Some(file) => file.content = content.to_string(),
            None => {
                self.files.insert(
                    path.to_string(),
                    VirtualFile {
                        content: content.to_string(),
                        mode: FileMode::ReadWrite,
                    },
                );
            },
        }
        Ok(written)
    }

    /// Whether a path exists.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Number of files in the tree.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Paths currently in the tree, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }
}

/// Match `path` against glob patterns in declared order.
fn matches_any(patterns: &[String], path: &str) -> bool {
    patterns.iter().any(|pat| {
        match GlobBuilder::new(pat).literal_separator(true).build() {
            Ok(glob) => glob.compile_matcher().is_match(path),
            Err(e) => {
                warn!(pattern = %pat, error = %e, "Ignoring unparseable vfs pattern");
                path == pat
            },
        }
    })
}
