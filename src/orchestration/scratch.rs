//! Scratch workspace for one publish invocation
//!
//! Layout under the scratch root:
//! - `repo/` - the shallow clone
//! - `pack/` - packaging tool output
//! - `commitMessage.txt` / `tagMessage.txt` - transient message files
//!
//! The workspace is exclusively owned by a single invocation and cleared
//! both before use and during final cleanup.

use crate::core::error::PublishError;
use std::path::{Path, PathBuf};
use tokio::fs;

const REPO_DIR: &str = "repo";
const PACK_DIR: &str = "pack";
const COMMIT_MESSAGE_FILE: &str = "commitMessage.txt";
const TAG_MESSAGE_FILE: &str = "tagMessage.txt";

/// Paths of one invocation's scratch directory tree
#[derive(Debug, Clone)]
pub struct ScratchWorkspace {
    root: PathBuf,
}

impl ScratchWorkspace {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory the target repository is cloned into
    pub fn repo_dir(&self) -> PathBuf {
        self.root.join(REPO_DIR)
    }

    /// Directory the packaging tool writes the tarball into
    pub fn pack_dir(&self) -> PathBuf {
        self.root.join(PACK_DIR)
    }

    pub fn commit_message_path(&self) -> PathBuf {
        self.root.join(COMMIT_MESSAGE_FILE)
    }

    pub fn tag_message_path(&self) -> PathBuf {
        self.root.join(TAG_MESSAGE_FILE)
    }

    /// Remove the whole scratch tree; idempotent when already absent
    pub async fn clear(&self) -> Result<(), PublishError> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PublishError::fs(&self.root, source)),
        }
    }
}

/// Remove every entry in the cloned tree except version-control metadata.
///
/// Dot-prefixed entries are ordinary entries here; only `.git` survives.
pub async fn strip_worktree(repo: &Path) -> Result<(), PublishError> {
    let mut entries = fs::read_dir(repo)
        .await
        .map_err(|source| PublishError::fs(repo, source))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| PublishError::fs(repo, source))?
    {
        if entry.file_name() == ".git" {
            continue;
        }

        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|source| PublishError::fs(&path, source))?;

        let removed = if file_type.is_dir() {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };
        removed.map_err(|source| PublishError::fs(&path, source))?;
    }

    Ok(())
}
